//! Packing and shipment compliance: container codes, labels, carrier hand-off.

pub mod carrier;
pub mod package;
pub mod service;
pub mod shipment;
pub mod store;

pub use carrier::{CarrierAdapter, CarrierRegistry, InMemoryCarrier};
pub use package::{
    ContainerCode, LabelKind, Package, PackageDraft, PackageId, PackedItem, PackingTask,
    RequiredQuantity, ShippingLabel,
};
pub use service::{
    PackCompleted, PackCreated, PackingEvent, PackingService, ShipmentCreated, ShipmentShipped,
};
pub use shipment::{Shipment, ShipmentId, ShipmentStatus, TrackingEvent};
pub use store::{InMemoryShipmentStore, ShipmentStore};
