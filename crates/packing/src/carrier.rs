//! Carrier integration port.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

use stockflow_core::{DomainError, DomainResult};

use crate::package::{LabelKind, ShippingLabel};
use crate::shipment::{Shipment, TrackingEvent};

/// External carrier integration (label printing, manifesting, tracking).
pub trait CarrierAdapter: Send + Sync {
    /// Produce the carrier's shipping labels for a ready shipment.
    fn create_shipment_labels(&self, shipment: &Shipment) -> DomainResult<Vec<ShippingLabel>>;

    /// Manifest the shipment with the carrier; returns the tracking number.
    fn register_shipment(&self, shipment: &Shipment) -> DomainResult<String>;

    /// Fetch the carrier's tracking history for a tracking number.
    fn tracking_events(&self, tracking_number: &str) -> DomainResult<Vec<TrackingEvent>>;
}

/// Maps carrier ids (e.g. "ups", "dhl") to their adapters.
#[derive(Default)]
pub struct CarrierRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn CarrierAdapter>>>,
}

impl CarrierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, carrier_id: impl Into<String>, adapter: Arc<dyn CarrierAdapter>) {
        self.adapters
            .write()
            .unwrap()
            .insert(carrier_id.into(), adapter);
    }

    pub fn resolve(&self, carrier_id: &str) -> DomainResult<Arc<dyn CarrierAdapter>> {
        self.adapters
            .read()
            .unwrap()
            .get(carrier_id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }
}

/// In-memory carrier for tests/dev.
///
/// Hands out sequential tracking numbers and replays whatever tracking events
/// were seeded via [`InMemoryCarrier::push_tracking_event`].
#[derive(Default)]
pub struct InMemoryCarrier {
    next_tracking: AtomicU64,
    tracking: RwLock<HashMap<String, Vec<TrackingEvent>>>,
}

impl InMemoryCarrier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_tracking_event(&self, tracking_number: &str, event: TrackingEvent) {
        self.tracking
            .write()
            .unwrap()
            .entry(tracking_number.to_string())
            .or_default()
            .push(event);
    }
}

impl CarrierAdapter for InMemoryCarrier {
    fn create_shipment_labels(&self, shipment: &Shipment) -> DomainResult<Vec<ShippingLabel>> {
        Ok(shipment
            .package_ids()
            .iter()
            .map(|id| ShippingLabel {
                kind: LabelKind::Carrier,
                value: format!("{}:{}:{}", shipment.carrier_id(), shipment.service_level(), id),
            })
            .collect())
    }

    fn register_shipment(&self, _shipment: &Shipment) -> DomainResult<String> {
        let n = self.next_tracking.fetch_add(1, Ordering::Relaxed);
        Ok(format!("TRK{n:010}"))
    }

    fn tracking_events(&self, tracking_number: &str) -> DomainResult<Vec<TrackingEvent>> {
        Ok(self
            .tracking
            .read()
            .unwrap()
            .get(tracking_number)
            .cloned()
            .unwrap_or_default())
    }
}
