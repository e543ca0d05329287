use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{AggregateId, AggregateRoot, DomainError, DomainResult};

use crate::package::{PackageId, ShippingLabel};

/// Shipment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentId(pub AggregateId);

impl ShipmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Ready,
    Shipped,
    Delivered,
}

/// Carrier-reported tracking milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    /// Carrier status code (e.g. "in_transit", "delivered").
    pub code: String,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

/// Aggregate root: packages bound for one carrier hand-off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    id: ShipmentId,
    status: ShipmentStatus,
    carrier_id: String,
    service_level: String,
    package_ids: Vec<PackageId>,
    labels: Vec<ShippingLabel>,
    total_weight_kg: f64,
    declared_value: u64,
    tracking_number: Option<String>,
    tracking: Vec<TrackingEvent>,
    created_at: DateTime<Utc>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Shipment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ShipmentId,
        carrier_id: impl Into<String>,
        service_level: impl Into<String>,
        package_ids: Vec<PackageId>,
        total_weight_kg: f64,
        declared_value: u64,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if package_ids.is_empty() {
            return Err(DomainError::validation(
                "a shipment needs at least one package",
            ));
        }
        Ok(Self {
            id,
            status: ShipmentStatus::Ready,
            carrier_id: carrier_id.into(),
            service_level: service_level.into(),
            package_ids,
            labels: Vec::new(),
            total_weight_kg,
            declared_value,
            tracking_number: None,
            tracking: Vec::new(),
            created_at,
            shipped_at: None,
            delivered_at: None,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> ShipmentId {
        self.id
    }

    pub fn status(&self) -> ShipmentStatus {
        self.status
    }

    pub fn carrier_id(&self) -> &str {
        &self.carrier_id
    }

    pub fn service_level(&self) -> &str {
        &self.service_level
    }

    pub fn package_ids(&self) -> &[PackageId] {
        &self.package_ids
    }

    pub fn labels(&self) -> &[ShippingLabel] {
        &self.labels
    }

    pub fn total_weight_kg(&self) -> f64 {
        self.total_weight_kg
    }

    pub fn declared_value(&self) -> u64 {
        self.declared_value
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn tracking(&self) -> &[TrackingEvent] {
        &self.tracking
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn attach_labels(&mut self, labels: Vec<ShippingLabel>) {
        self.labels = labels;
        self.version += 1;
    }

    /// Ready → Shipped, recording the carrier's tracking number.
    pub fn ship(&mut self, tracking_number: impl Into<String>, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != ShipmentStatus::Ready {
            return Err(DomainError::validation(format!(
                "cannot ship a shipment in status {:?}",
                self.status
            )));
        }
        self.status = ShipmentStatus::Shipped;
        self.tracking_number = Some(tracking_number.into());
        self.shipped_at = Some(at);
        self.version += 1;
        Ok(())
    }

    /// Merge carrier events, deduplicating on (code, occurred_at). Observing
    /// a `delivered` event flips the status. Returns how many events were new.
    pub fn merge_tracking(&mut self, events: Vec<TrackingEvent>) -> usize {
        let mut added = 0;
        for event in events {
            let seen = self
                .tracking
                .iter()
                .any(|e| e.code == event.code && e.occurred_at == event.occurred_at);
            if seen {
                continue;
            }
            if event.code == "delivered" && self.status == ShipmentStatus::Shipped {
                self.status = ShipmentStatus::Delivered;
                self.delivered_at = Some(event.occurred_at);
            }
            self.tracking.push(event);
            added += 1;
        }
        if added > 0 {
            self.tracking.sort_by_key(|e| e.occurred_at);
            self.version += 1;
        }
        added
    }
}

impl AggregateRoot for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
