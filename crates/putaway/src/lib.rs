//! Putaway planning: assign inbound receipt lines to optimal locations.

pub mod planner;
pub mod ports;

pub use planner::{PutawayEvent, PutawayPlanned, PutawayPlanner, PutawayStrategy};
pub use ports::{InMemoryReceipts, Receipt, ReceiptId, ReceiptLine, ReceiptRepository};
