//! Catalog domain module: SKU and Location master data.
//!
//! Pure data plus invariant checks and capability queries (temperature/hazmat
//! compatibility, distance). Planning and orchestration live in the service
//! crates; they reach the catalog through the ports defined here.

pub mod location;
pub mod memory;
pub mod ports;
pub mod sku;

pub use location::{
    CapacityLimits, Coordinates, Dimensions, Location, LocationId, PhysicalType, TemperatureRange,
};
pub use memory::{InMemoryCatalog, InMemoryInventory};
pub use ports::{CatalogRepository, InventoryAdjustment, InventoryRepository, LotQuantity};
pub use sku::{AbcClass, Gtin, ReorderParameters, Sku, SkuId, TemperatureZone, VelocityClass};
