use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use stockflow_catalog::{CatalogRepository, Dimensions, SkuId};
use stockflow_core::{AggregateId, AggregateRoot, DomainError, DomainResult, TenantId};
use stockflow_events::{Event, EventBus, EventEnvelope};
use stockflow_tasks::TaskId;

use crate::carrier::CarrierRegistry;
use crate::package::{
    ContainerCode, LabelKind, Package, PackageDraft, PackageId, PackedItem, PackingTask,
    ShippingLabel,
};
use crate::shipment::{Shipment, ShipmentId};
use crate::store::ShipmentStore;

/// Event: a packing task produced its packages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackCreated {
    pub task_id: TaskId,
    pub items: Vec<PackedItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a packing task is fully reconciled and closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackCompleted {
    pub task_id: TaskId,
    pub total_weight_kg: f64,
    /// Present when the task produced a single package.
    pub dimensions: Option<Dimensions>,
    pub carrier: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a shipment was assembled and labelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentCreated {
    pub shipment_id: ShipmentId,
    pub carrier: String,
    pub packages: Vec<PackageId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a shipment was handed to the carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentShipped {
    pub shipment_id: ShipmentId,
    pub tracking_number: String,
    pub shipped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PackingEvent {
    PackCreated(PackCreated),
    PackCompleted(PackCompleted),
    ShipmentCreated(ShipmentCreated),
    ShipmentShipped(ShipmentShipped),
}

impl Event for PackingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PackingEvent::PackCreated(_) => "pack.created",
            PackingEvent::PackCompleted(_) => "pack.completed",
            PackingEvent::ShipmentCreated(_) => "shipment.created",
            PackingEvent::ShipmentShipped(_) => "shipment.shipped",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PackingEvent::PackCreated(e) => e.occurred_at,
            PackingEvent::PackCompleted(e) => e.occurred_at,
            PackingEvent::ShipmentCreated(e) => e.occurred_at,
            PackingEvent::ShipmentShipped(e) => e.shipped_at,
        }
    }
}

type ItemKey = (SkuId, Option<String>, Option<String>);

/// Packing and shipment service.
pub struct PackingService<B> {
    catalog: Arc<dyn CatalogRepository>,
    carriers: Arc<CarrierRegistry>,
    shipments: Arc<dyn ShipmentStore>,
    bus: B,
    /// Serial reference source for container codes, seeded from wall time.
    next_serial: AtomicU64,
}

impl<B> PackingService<B>
where
    B: EventBus<EventEnvelope<PackingEvent>>,
{
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        carriers: Arc<CarrierRegistry>,
        shipments: Arc<dyn ShipmentStore>,
        bus: B,
    ) -> Self {
        Self {
            catalog,
            carriers,
            shipments,
            bus,
            next_serial: AtomicU64::new(Utc::now().timestamp_millis() as u64),
        }
    }

    /// Finalize a packing task's drafts into labelled packages.
    ///
    /// Fails with `QuantityMismatch` unless, for every (SKU, lot, serial)
    /// triple, quantities summed across drafts exactly equal the task's
    /// required quantity. Nothing is finalized or published on failure.
    pub fn complete_packing_task(
        &self,
        tenant_id: TenantId,
        task: &PackingTask,
        drafts: Vec<PackageDraft>,
    ) -> DomainResult<Vec<Package>> {
        self.check_conservation(task, &drafts)?;

        let now = Utc::now();
        let mut packages = Vec::with_capacity(drafts.len());
        let single_dimensions = match drafts.as_slice() {
            [only] => only.dimensions,
            _ => None,
        };
        for draft in drafts {
            let serial_ref = self.next_serial.fetch_add(1, Ordering::Relaxed);
            let code = ContainerCode::generate(serial_ref);
            let labels = package_labels(&code, &draft.items);
            packages.push(Package::new(
                PackageId::new(AggregateId::new()),
                code,
                draft,
                labels,
                now,
            )?);
        }

        let items: Vec<PackedItem> = packages
            .iter()
            .flat_map(|p| p.items().iter().cloned())
            .collect();
        let total_weight_kg = packages.iter().map(Package::weight_kg).sum();

        self.publish(
            tenant_id,
            task.id.0,
            "package",
            PackingEvent::PackCreated(PackCreated {
                task_id: task.id,
                items,
                occurred_at: now,
            }),
        )?;
        self.publish(
            tenant_id,
            task.id.0,
            "package",
            PackingEvent::PackCompleted(PackCompleted {
                task_id: task.id,
                total_weight_kg,
                dimensions: single_dimensions,
                carrier: task.carrier.clone(),
                occurred_at: now,
            }),
        )?;

        info!(task = %task.id, packages = packages.len(), "packing task completed");
        Ok(packages)
    }

    /// Assemble packages into a ready shipment with carrier labels attached.
    pub fn create_shipment(
        &self,
        tenant_id: TenantId,
        packages: &[Package],
        carrier_id: &str,
        service_level: &str,
    ) -> DomainResult<Shipment> {
        let adapter = self.carriers.resolve(carrier_id)?;

        let total_weight_kg = packages.iter().map(Package::weight_kg).sum();
        let mut declared_value = 0u64;
        for item in packages.iter().flat_map(|p| p.items()) {
            let sku = self.catalog.sku(item.sku).ok_or(DomainError::NotFound)?;
            declared_value += sku.unit_value() * u64::from(item.quantity);
        }

        let now = Utc::now();
        let mut shipment = Shipment::new(
            ShipmentId::new(AggregateId::new()),
            carrier_id,
            service_level,
            packages.iter().map(Package::id_typed).collect(),
            total_weight_kg,
            declared_value,
            now,
        )?;
        shipment.attach_labels(adapter.create_shipment_labels(&shipment)?);
        self.shipments.insert(shipment.clone())?;

        self.publish(
            tenant_id,
            shipment.id_typed().0,
            "shipment",
            PackingEvent::ShipmentCreated(ShipmentCreated {
                shipment_id: shipment.id_typed(),
                carrier: carrier_id.to_string(),
                packages: shipment.package_ids().to_vec(),
                occurred_at: now,
            }),
        )?;
        info!(shipment = %shipment.id_typed(), carrier = carrier_id, "shipment created");
        Ok(shipment)
    }

    /// Manifest a ready shipment with its carrier.
    pub fn ship_shipment(
        &self,
        tenant_id: TenantId,
        shipment_id: ShipmentId,
    ) -> DomainResult<Shipment> {
        let mut shipment = self.shipments.get(shipment_id).ok_or(DomainError::NotFound)?;
        let read_version = shipment.version();
        let adapter = self.carriers.resolve(shipment.carrier_id())?;

        let tracking_number = adapter.register_shipment(&shipment)?;
        let now = Utc::now();
        shipment.ship(tracking_number.clone(), now)?;
        self.shipments
            .update(shipment.clone(), stockflow_core::ExpectedVersion::Exact(read_version))?;

        self.publish(
            tenant_id,
            shipment_id.0,
            "shipment",
            PackingEvent::ShipmentShipped(ShipmentShipped {
                shipment_id,
                tracking_number,
                shipped_at: now,
            }),
        )?;
        info!(shipment = %shipment_id, "shipment shipped");
        Ok(shipment)
    }

    /// Pull the carrier's tracking history into the shipment.
    pub fn refresh_tracking(&self, shipment_id: ShipmentId) -> DomainResult<Shipment> {
        let mut shipment = self.shipments.get(shipment_id).ok_or(DomainError::NotFound)?;
        let read_version = shipment.version();
        let tracking_number = shipment
            .tracking_number()
            .ok_or_else(|| {
                DomainError::validation("shipment has no tracking number yet")
            })?
            .to_string();

        let adapter = self.carriers.resolve(shipment.carrier_id())?;
        let added = shipment.merge_tracking(adapter.tracking_events(&tracking_number)?);
        if added > 0 {
            self.shipments
                .update(shipment.clone(), stockflow_core::ExpectedVersion::Exact(read_version))?;
        }
        Ok(shipment)
    }

    fn check_conservation(&self, task: &PackingTask, drafts: &[PackageDraft]) -> DomainResult<()> {
        let mut required: BTreeMap<ItemKey, u32> = BTreeMap::new();
        for line in &task.required {
            *required
                .entry((line.sku, line.lot.clone(), line.serial.clone()))
                .or_default() += line.quantity;
        }

        let mut packed: BTreeMap<ItemKey, u32> = BTreeMap::new();
        for item in drafts.iter().flat_map(|d| &d.items) {
            let sku = self.catalog.sku(item.sku).ok_or(DomainError::NotFound)?;
            if sku.gtin() != &item.gtin {
                return Err(DomainError::validation(format!(
                    "scanned GTIN {} does not belong to SKU {}",
                    item.gtin, sku.code()
                )));
            }
            *packed
                .entry((item.sku, item.lot.clone(), item.serial.clone()))
                .or_default() += item.quantity;
        }

        for (key, want) in &required {
            let got = packed.get(key).copied().unwrap_or(0);
            if got != *want {
                return Err(DomainError::quantity_mismatch(format!(
                    "sku {} lot {:?} serial {:?}: packed {got}, required {want}",
                    key.0, key.1, key.2
                )));
            }
        }
        for (key, got) in &packed {
            if !required.contains_key(key) {
                return Err(DomainError::quantity_mismatch(format!(
                    "sku {} lot {:?} serial {:?}: packed {got} but not required",
                    key.0, key.1, key.2
                )));
            }
        }
        Ok(())
    }

    fn publish(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        event: PackingEvent,
    ) -> DomainResult<()> {
        self.bus
            .publish(EventEnvelope::wrap(tenant_id, aggregate_id, aggregate_type, event))
            .map_err(|e| DomainError::conflict(format!("event publication failed: {e:?}")))
    }
}

/// One container-code label, one per distinct GTIN, one per distinct lot.
fn package_labels(code: &ContainerCode, items: &[PackedItem]) -> Vec<ShippingLabel> {
    let mut labels = vec![ShippingLabel {
        kind: LabelKind::ContainerCode,
        value: code.to_string(),
    }];

    let gtins: BTreeSet<&str> = items.iter().map(|i| i.gtin.as_str()).collect();
    labels.extend(gtins.into_iter().map(|g| ShippingLabel {
        kind: LabelKind::Gtin,
        value: g.to_string(),
    }));

    let lots: BTreeSet<&str> = items.iter().filter_map(|i| i.lot.as_deref()).collect();
    labels.extend(lots.into_iter().map(|l| ShippingLabel {
        kind: LabelKind::Lot,
        value: l.to_string(),
    }));

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockflow_catalog::{Gtin, InMemoryCatalog, Sku};
    use stockflow_events::InMemoryEventBus;
    use stockflow_tasks::SourceDocument;

    use crate::carrier::InMemoryCarrier;
    use crate::package::RequiredQuantity;
    use crate::shipment::{ShipmentStatus, TrackingEvent};
    use crate::store::InMemoryShipmentStore;

    struct Fixture {
        catalog: Arc<InMemoryCatalog>,
        carriers: Arc<CarrierRegistry>,
        carrier: Arc<InMemoryCarrier>,
        shipments: Arc<InMemoryShipmentStore>,
        bus: Arc<InMemoryEventBus<EventEnvelope<PackingEvent>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let carriers = Arc::new(CarrierRegistry::new());
            let carrier = Arc::new(InMemoryCarrier::new());
            carriers.register("ups", carrier.clone());
            Self {
                catalog: Arc::new(InMemoryCatalog::new()),
                carriers,
                carrier,
                shipments: Arc::new(InMemoryShipmentStore::new()),
                bus: Arc::new(InMemoryEventBus::new()),
            }
        }

        fn service(&self) -> PackingService<Arc<InMemoryEventBus<EventEnvelope<PackingEvent>>>> {
            PackingService::new(
                self.catalog.clone(),
                self.carriers.clone(),
                self.shipments.clone(),
                self.bus.clone(),
            )
        }

        fn add_sku(&self, code: &str, gtin: &str, unit_value: u64) -> (SkuId, Gtin) {
            let gtin = Gtin::new(gtin).unwrap();
            let sku = Sku::new(SkuId::new(AggregateId::new()), code, gtin.clone())
                .unwrap()
                .with_unit_measures(1.0, 0.01, unit_value);
            let id = sku.id_typed();
            self.catalog.insert_sku(sku);
            (id, gtin)
        }
    }

    fn item(sku: SkuId, gtin: &Gtin, quantity: u32, lot: Option<&str>) -> PackedItem {
        PackedItem {
            sku,
            gtin: gtin.clone(),
            quantity,
            lot: lot.map(str::to_string),
            serial: None,
        }
    }

    fn task_for(required: Vec<RequiredQuantity>) -> PackingTask {
        PackingTask {
            id: TaskId::new(AggregateId::new()),
            source: SourceDocument::Wave(AggregateId::new()),
            required,
            carrier: Some("ups".to_string()),
        }
    }

    #[test]
    fn exact_quantities_finalize_into_labelled_packages() {
        let fx = Fixture::new();
        let (sku, gtin) = fx.add_sku("WIDGET", "96385074", 500);
        let task = task_for(vec![RequiredQuantity {
            sku,
            lot: Some("L1".to_string()),
            serial: None,
            quantity: 10,
        }]);

        let drafts = vec![
            PackageDraft {
                items: vec![item(sku, &gtin, 6, Some("L1"))],
                weight_kg: 6.0,
                dimensions: None,
            },
            PackageDraft {
                items: vec![item(sku, &gtin, 4, Some("L1"))],
                weight_kg: 4.0,
                dimensions: None,
            },
        ];

        let packages = fx
            .service()
            .complete_packing_task(TenantId::new(), &task, drafts)
            .unwrap();
        assert_eq!(packages.len(), 2);
        for package in &packages {
            // Container code + one GTIN + one lot.
            assert_eq!(package.labels().len(), 3);
            assert!(ContainerCode::new(package.container_code().as_str()).is_ok());
        }
        assert_ne!(packages[0].container_code(), packages[1].container_code());
    }

    #[test]
    fn label_set_covers_distinct_gtins_and_lots() {
        let fx = Fixture::new();
        let (a, gtin_a) = fx.add_sku("ALPHA", "96385074", 100);
        let (b, gtin_b) = fx.add_sku("BRAVO", "036000291452", 100);
        let task = task_for(vec![
            RequiredQuantity {
                sku: a,
                lot: Some("L1".to_string()),
                serial: None,
                quantity: 2,
            },
            RequiredQuantity {
                sku: a,
                lot: Some("L2".to_string()),
                serial: None,
                quantity: 1,
            },
            RequiredQuantity {
                sku: b,
                lot: None,
                serial: None,
                quantity: 3,
            },
        ]);

        let drafts = vec![PackageDraft {
            items: vec![
                item(a, &gtin_a, 2, Some("L1")),
                item(a, &gtin_a, 1, Some("L2")),
                item(b, &gtin_b, 3, None),
            ],
            weight_kg: 3.2,
            dimensions: None,
        }];

        let packages = fx
            .service()
            .complete_packing_task(TenantId::new(), &task, drafts)
            .unwrap();
        // 1 container code + 2 distinct GTINs + 2 distinct lots.
        assert_eq!(packages[0].labels().len(), 5);
    }

    #[test]
    fn short_packed_quantity_is_a_mismatch_with_no_events() {
        let fx = Fixture::new();
        let (sku, gtin) = fx.add_sku("WIDGET", "96385074", 500);
        let task = task_for(vec![RequiredQuantity {
            sku,
            lot: None,
            serial: None,
            quantity: 10,
        }]);

        let subscription = fx.bus.subscribe();
        let err = fx
            .service()
            .complete_packing_task(
                TenantId::new(),
                &task,
                vec![PackageDraft {
                    items: vec![item(sku, &gtin, 9, None)],
                    weight_kg: 9.0,
                    dimensions: None,
                }],
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::QuantityMismatch(_)));
        assert!(subscription.try_recv().is_err());
    }

    #[test]
    fn unrequested_item_is_a_mismatch() {
        let fx = Fixture::new();
        let (sku, gtin) = fx.add_sku("WIDGET", "96385074", 500);
        let (extra, extra_gtin) = fx.add_sku("EXTRA", "036000291452", 100);
        let task = task_for(vec![RequiredQuantity {
            sku,
            lot: None,
            serial: None,
            quantity: 5,
        }]);

        let err = fx
            .service()
            .complete_packing_task(
                TenantId::new(),
                &task,
                vec![PackageDraft {
                    items: vec![item(sku, &gtin, 5, None), item(extra, &extra_gtin, 1, None)],
                    weight_kg: 6.0,
                    dimensions: None,
                }],
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::QuantityMismatch(_)));
    }

    #[test]
    fn wrong_gtin_for_sku_is_rejected() {
        let fx = Fixture::new();
        let (sku, _) = fx.add_sku("WIDGET", "96385074", 500);
        let wrong = Gtin::new("036000291452").unwrap();
        let task = task_for(vec![RequiredQuantity {
            sku,
            lot: None,
            serial: None,
            quantity: 1,
        }]);

        let err = fx
            .service()
            .complete_packing_task(
                TenantId::new(),
                &task,
                vec![PackageDraft {
                    items: vec![item(sku, &wrong, 1, None)],
                    weight_kg: 1.0,
                    dimensions: None,
                }],
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn shipment_lifecycle_ready_shipped_delivered() {
        let fx = Fixture::new();
        let (sku, gtin) = fx.add_sku("WIDGET", "96385074", 250);
        let task = task_for(vec![RequiredQuantity {
            sku,
            lot: None,
            serial: None,
            quantity: 4,
        }]);
        let service = fx.service();
        let packages = service
            .complete_packing_task(
                TenantId::new(),
                &task,
                vec![PackageDraft {
                    items: vec![item(sku, &gtin, 4, None)],
                    weight_kg: 4.0,
                    dimensions: None,
                }],
            )
            .unwrap();

        let shipment = service
            .create_shipment(TenantId::new(), &packages, "ups", "ground")
            .unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::Ready);
        assert_eq!(shipment.declared_value(), 1_000);
        assert!(!shipment.labels().is_empty());

        let shipped = service
            .ship_shipment(TenantId::new(), shipment.id_typed())
            .unwrap();
        assert_eq!(shipped.status(), ShipmentStatus::Shipped);
        let tracking_number = shipped.tracking_number().unwrap().to_string();

        // Shipping twice is a validation error.
        assert!(service
            .ship_shipment(TenantId::new(), shipment.id_typed())
            .is_err());

        fx.carrier.push_tracking_event(
            &tracking_number,
            TrackingEvent {
                code: "delivered".to_string(),
                description: "left at dock".to_string(),
                occurred_at: Utc::now(),
            },
        );
        let refreshed = service.refresh_tracking(shipment.id_typed()).unwrap();
        assert_eq!(refreshed.status(), ShipmentStatus::Delivered);

        // Polling again adds nothing.
        let again = service.refresh_tracking(shipment.id_typed()).unwrap();
        assert_eq!(again.tracking().len(), 1);
    }

    #[test]
    fn unknown_carrier_is_not_found() {
        let fx = Fixture::new();
        let (sku, gtin) = fx.add_sku("WIDGET", "96385074", 250);
        let task = task_for(vec![RequiredQuantity {
            sku,
            lot: None,
            serial: None,
            quantity: 1,
        }]);
        let service = fx.service();
        let packages = service
            .complete_packing_task(
                TenantId::new(),
                &task,
                vec![PackageDraft {
                    items: vec![item(sku, &gtin, 1, None)],
                    weight_kg: 1.0,
                    dimensions: None,
                }],
            )
            .unwrap();

        let err = service
            .create_shipment(TenantId::new(), &packages, "fedex", "ground")
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 200,
                ..ProptestConfig::default()
            })]

            /// Property: any split of the required quantity across drafts
            /// conserves totals and passes; shifting one unit breaks it.
            #[test]
            fn conservation_accepts_exact_splits_only(
                required in 2u32..200,
                cuts in proptest::collection::vec(1u32..200, 0..3)
            ) {
                let fx = Fixture::new();
                let (sku, gtin) = fx.add_sku("WIDGET", "96385074", 10);
                let task = task_for(vec![RequiredQuantity {
                    sku,
                    lot: None,
                    serial: None,
                    quantity: required,
                }]);

                // Split `required` into 1..=4 positive parts.
                let mut parts = Vec::new();
                let mut remaining = required;
                for cut in cuts {
                    if remaining <= 1 {
                        break;
                    }
                    let take = 1 + cut % (remaining - 1);
                    parts.push(take);
                    remaining -= take;
                }
                parts.push(remaining);

                let drafts: Vec<PackageDraft> = parts
                    .iter()
                    .map(|&q| PackageDraft {
                        items: vec![item(sku, &gtin, q, None)],
                        weight_kg: f64::from(q),
                        dimensions: None,
                    })
                    .collect();

                prop_assert!(fx
                    .service()
                    .complete_packing_task(TenantId::new(), &task, drafts.clone())
                    .is_ok());

                // One extra unit in the first draft must fail.
                let mut off_by_one = drafts;
                off_by_one[0].items[0].quantity += 1;
                let err = fx
                    .service()
                    .complete_packing_task(TenantId::new(), &task, off_by_one)
                    .unwrap_err();
                prop_assert!(matches!(err, DomainError::QuantityMismatch(_)));
            }
        }
    }
}
