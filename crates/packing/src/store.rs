//! Shipment persistence port.

use std::collections::HashMap;
use std::sync::RwLock;

use stockflow_core::{AggregateRoot, DomainError, DomainResult, ExpectedVersion};

use crate::shipment::{Shipment, ShipmentId};

pub trait ShipmentStore: Send + Sync {
    fn insert(&self, shipment: Shipment) -> DomainResult<()>;
    fn get(&self, id: ShipmentId) -> Option<Shipment>;
    fn update(&self, shipment: Shipment, expected: ExpectedVersion) -> DomainResult<()>;
}

/// In-memory shipment store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryShipmentStore {
    shipments: RwLock<HashMap<ShipmentId, Shipment>>,
}

impl InMemoryShipmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShipmentStore for InMemoryShipmentStore {
    fn insert(&self, shipment: Shipment) -> DomainResult<()> {
        let mut shipments = self.shipments.write().unwrap();
        if shipments.contains_key(&shipment.id_typed()) {
            return Err(DomainError::conflict(format!(
                "shipment {} already exists",
                shipment.id_typed()
            )));
        }
        shipments.insert(shipment.id_typed(), shipment);
        Ok(())
    }

    fn get(&self, id: ShipmentId) -> Option<Shipment> {
        self.shipments.read().unwrap().get(&id).cloned()
    }

    fn update(&self, shipment: Shipment, expected: ExpectedVersion) -> DomainResult<()> {
        let mut shipments = self.shipments.write().unwrap();
        let current = shipments
            .get(&shipment.id_typed())
            .ok_or(DomainError::NotFound)?;
        expected.check(current.version())?;
        shipments.insert(shipment.id_typed(), shipment);
        Ok(())
    }
}
