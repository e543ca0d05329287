//! Shared warehouse task shape + state machine.
//!
//! Putaway, pick and pack work all travel through the same task lifecycle, so
//! the state machine lives in one place and the service crates only decide how
//! tasks are generated, grouped and sequenced.

pub mod task;

pub use task::{
    Priority, SourceDocument, TaskId, TaskKind, TaskStatus, WarehouseTask,
};
