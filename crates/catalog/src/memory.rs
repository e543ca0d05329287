//! In-memory port implementations for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use stockflow_core::{DomainError, DomainResult};

use crate::location::{Location, LocationId};
use crate::ports::{CatalogRepository, InventoryAdjustment, InventoryRepository, LotQuantity};
use crate::sku::{Sku, SkuId};

/// In-memory catalog repository.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    skus: RwLock<HashMap<SkuId, Sku>>,
    locations: RwLock<HashMap<LocationId, Location>>,
    slots: RwLock<HashMap<SkuId, LocationId>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_sku(&self, sku: Sku) {
        self.skus.write().unwrap().insert(sku.id_typed(), sku);
    }

    pub fn insert_location(&self, location: Location) {
        self.locations
            .write()
            .unwrap()
            .insert(location.id_typed(), location);
    }

    pub fn update_location(&self, location: Location) {
        self.insert_location(location);
    }
}

impl CatalogRepository for InMemoryCatalog {
    fn sku(&self, id: SkuId) -> Option<Sku> {
        self.skus.read().unwrap().get(&id).cloned()
    }

    fn location(&self, id: LocationId) -> Option<Location> {
        self.locations.read().unwrap().get(&id).cloned()
    }

    fn all_skus(&self) -> Vec<Sku> {
        let mut skus: Vec<Sku> = self.skus.read().unwrap().values().cloned().collect();
        // Stable iteration order keeps planners deterministic.
        skus.sort_by_key(|s| s.id_typed());
        skus
    }

    fn all_locations(&self) -> Vec<Location> {
        let mut locations: Vec<Location> =
            self.locations.read().unwrap().values().cloned().collect();
        locations.sort_by(|a, b| a.code().cmp(b.code()));
        locations
    }

    fn locations_in_zone(&self, zone: &str) -> Vec<Location> {
        self.all_locations()
            .into_iter()
            .filter(|l| l.zone() == zone)
            .collect()
    }

    fn sku_location(&self, sku: SkuId) -> Option<LocationId> {
        self.slots.read().unwrap().get(&sku).copied()
    }

    fn assign_sku_location(&self, sku: SkuId, location: LocationId) -> DomainResult<()> {
        if !self.skus.read().unwrap().contains_key(&sku) {
            return Err(DomainError::not_found());
        }
        if !self.locations.read().unwrap().contains_key(&location) {
            return Err(DomainError::not_found());
        }
        self.slots.write().unwrap().insert(sku, location);
        Ok(())
    }

    fn distance(&self, from: LocationId, to: LocationId) -> DomainResult<f64> {
        let locations = self.locations.read().unwrap();
        let from = locations.get(&from).ok_or(DomainError::NotFound)?;
        let to = locations.get(&to).ok_or(DomainError::NotFound)?;
        Ok(from.distance_to(to))
    }
}

/// In-memory inventory repository.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    stock: RwLock<HashMap<(SkuId, LocationId), Vec<LotQuantity>>>,
    capacity: RwLock<HashMap<LocationId, u32>>,
    adjustments: RwLock<Vec<InventoryAdjustment>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, sku: SkuId, location: LocationId, lots: Vec<LotQuantity>) {
        self.stock.write().unwrap().insert((sku, location), lots);
    }

    pub fn set_remaining_capacity(&self, location: LocationId, units: u32) {
        self.capacity.write().unwrap().insert(location, units);
    }

    /// Adjustments booked so far (test inspection).
    pub fn adjustments(&self) -> Vec<InventoryAdjustment> {
        self.adjustments.read().unwrap().clone()
    }
}

impl InventoryRepository for InMemoryInventory {
    fn available(&self, sku: SkuId, location: LocationId) -> Vec<LotQuantity> {
        self.stock
            .read()
            .unwrap()
            .get(&(sku, location))
            .cloned()
            .unwrap_or_default()
    }

    fn expected_quantity(&self, sku: SkuId, location: LocationId) -> u32 {
        self.available(sku, location)
            .iter()
            .map(|l| l.quantity)
            .sum()
    }

    fn remaining_capacity(&self, location: LocationId) -> u32 {
        self.capacity
            .read()
            .unwrap()
            .get(&location)
            .copied()
            .unwrap_or(u32::MAX)
    }

    fn apply_adjustment(&self, adjustment: InventoryAdjustment) -> DomainResult<()> {
        self.adjustments.write().unwrap().push(adjustment);
        Ok(())
    }
}
