//! Repository ports consumed by the warehouse services.
//!
//! The orchestrators depend only on these interfaces; the surrounding
//! application decides what implements them (a transactional store in
//! production, the in-memory implementations in `memory` for tests/dev).

use serde::{Deserialize, Serialize};

use stockflow_core::DomainResult;

use crate::location::{Location, LocationId};
use crate::sku::{Sku, SkuId};

/// Available stock for one lot/serial at a (SKU, location) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotQuantity {
    pub lot: Option<String>,
    pub serial: Option<String>,
    pub quantity: u32,
}

/// Inventory correction issued by the cycle-count scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAdjustment {
    pub sku: SkuId,
    pub location: LocationId,
    /// Signed correction applied to on-hand quantity.
    pub quantity_delta: i64,
    pub reason: String,
}

/// SKU/location master data lookup + slot assignment.
pub trait CatalogRepository: Send + Sync {
    fn sku(&self, id: SkuId) -> Option<Sku>;

    fn location(&self, id: LocationId) -> Option<Location>;

    fn all_skus(&self) -> Vec<Sku>;

    fn all_locations(&self) -> Vec<Location>;

    fn locations_in_zone(&self, zone: &str) -> Vec<Location>;

    /// Current primary slot of a SKU, if one is assigned.
    fn sku_location(&self, sku: SkuId) -> Option<LocationId>;

    /// Reassign the primary slot of a SKU (slotting moves).
    fn assign_sku_location(&self, sku: SkuId, location: LocationId) -> DomainResult<()>;

    /// Travel distance between two locations.
    fn distance(&self, from: LocationId, to: LocationId) -> DomainResult<f64>;
}

/// Stock-on-hand snapshots + the adjustment sink.
pub trait InventoryRepository: Send + Sync {
    /// Available quantity per lot/serial at a (SKU, location) pair.
    fn available(&self, sku: SkuId, location: LocationId) -> Vec<LotQuantity>;

    /// Expected on-hand quantity (cycle-count snapshot baseline).
    fn expected_quantity(&self, sku: SkuId, location: LocationId) -> u32;

    /// Free capacity (units) remaining at a location.
    fn remaining_capacity(&self, location: LocationId) -> u32;

    /// Book a stock correction. Failures are surfaced, never swallowed.
    fn apply_adjustment(&self, adjustment: InventoryAdjustment) -> DomainResult<()>;
}
