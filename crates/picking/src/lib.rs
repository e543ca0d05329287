//! Picking orchestration: waves, grouping strategies, route sequencing.

pub mod orchestrator;
pub mod ports;
pub mod store;
pub mod wave;

pub use orchestrator::{
    PickCompleted, PickCreated, PickingEvent, PickingOrchestrator, WaveCompleted, WaveCreated,
    WaveStrategy, sequence_nearest_neighbor,
};
pub use ports::{InMemoryOrders, OrderId, OrderLine, OrderRepository};
pub use store::{InMemoryTaskStore, InMemoryWaveStore, TaskStore, WaveStore};
pub use wave::{Wave, WaveId, WaveProductivity, WaveStatus};
