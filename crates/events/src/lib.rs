//! `stockflow-events` — event contract + pub/sub mechanics.
//!
//! Domain event enums live in their owning crates (picking defines
//! `PickingEvent`, packing defines `PackingEvent`, ...). This crate holds the
//! shared contract: the [`Event`] trait, the [`EventEnvelope`] metadata wrapper
//! and the transport-agnostic [`EventBus`] abstraction.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::InMemoryEventBus;
pub use tenant::TenantScoped;
