use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use stockflow_catalog::{
    CatalogRepository, InventoryAdjustment, InventoryRepository, LocationId, SkuId,
};
use stockflow_core::{AggregateId, DomainError, DomainResult, TenantId};
use stockflow_events::{Event, EventBus, EventEnvelope};

use crate::count::{CountId, CountItem, CountItemStatus, CountResult, CycleCount, CycleCountStatus};
use crate::policy::PolicyId;
use crate::schedule::{CountPair, CycleCountSchedule, ScheduleId};
use crate::store::{CountStore, PolicyStore, ScheduleStore};

/// Event: a count was opened with its expected snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleCountCreated {
    pub count_id: CountId,
    pub locations: Vec<LocationId>,
    pub scheduled_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// One tolerance-breaching line of a completed count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub sku: SkuId,
    pub location: LocationId,
    pub variance_quantity: i64,
    pub variance_value: i64,
}

/// Event: a count closed with its aggregate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleCountCompleted {
    pub count_id: CountId,
    pub discrepancies: Vec<Discrepancy>,
    pub accuracy_pct: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CycleCountEvent {
    Created(CycleCountCreated),
    Completed(CycleCountCompleted),
}

impl Event for CycleCountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CycleCountEvent::Created(_) => "cyclecount.created",
            CycleCountEvent::Completed(_) => "cyclecount.completed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CycleCountEvent::Created(e) => e.occurred_at,
            CycleCountEvent::Completed(e) => e.occurred_at,
        }
    }
}

/// Cycle-count orchestration: schedule generation, execution, reconciliation.
pub struct CycleCountScheduler<B> {
    catalog: Arc<dyn CatalogRepository>,
    inventory: Arc<dyn InventoryRepository>,
    policies: Arc<dyn PolicyStore>,
    schedules: Arc<dyn ScheduleStore>,
    counts: Arc<dyn CountStore>,
    bus: B,
}

impl<B> CycleCountScheduler<B>
where
    B: EventBus<EventEnvelope<CycleCountEvent>>,
{
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        inventory: Arc<dyn InventoryRepository>,
        policies: Arc<dyn PolicyStore>,
        schedules: Arc<dyn ScheduleStore>,
        counts: Arc<dyn CountStore>,
        bus: B,
    ) -> Self {
        Self {
            catalog,
            inventory,
            policies,
            schedules,
            counts,
            bus,
        }
    }

    /// Walk `[from, to]` at the policy's frequency, sampling the policy's
    /// coverage share of due (SKU, location) pairs per occurrence.
    ///
    /// Pairs are ordered by how stale their location's last count is (never
    /// counted first), then by SKU id; successive occurrences rotate through
    /// that order so repeated runs spread coverage instead of re-picking the
    /// same pairs.
    pub fn generate_schedule(
        &self,
        policy_id: PolicyId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<CycleCountSchedule>> {
        let policy = self.policies.get(policy_id).ok_or(DomainError::NotFound)?;
        if to < from {
            return Err(DomainError::validation("schedule range end precedes start"));
        }

        let pairs = self.due_pairs();
        if pairs.is_empty() {
            return Err(DomainError::validation(
                "no SKU slot assignments available to count",
            ));
        }
        let take = ((pairs.len() as f64 * policy.coverage_pct() / 100.0).ceil() as usize)
            .clamp(1, pairs.len());

        let now = Utc::now();
        let mut schedules = Vec::new();
        let mut occurrence = 0usize;
        let mut at = from;
        while at <= to {
            let start = (occurrence * take) % pairs.len();
            let selected: Vec<CountPair> = pairs
                .iter()
                .cycle()
                .skip(start)
                .take(take)
                .copied()
                .collect();

            let schedule = CycleCountSchedule::new(
                ScheduleId::new(AggregateId::new()),
                policy_id,
                at,
                selected,
                now,
            )?;
            self.schedules.insert(schedule.clone())?;
            schedules.push(schedule);

            occurrence += 1;
            at += Duration::days(i64::from(policy.frequency_days()));
        }

        info!(
            policy = %policy_id,
            occurrences = schedules.len(),
            pairs_per_occurrence = take,
            "cycle count schedule generated"
        );
        Ok(schedules)
    }

    /// Open a count for a pending schedule, snapshotting expected stock.
    pub fn create_count(
        &self,
        tenant_id: TenantId,
        schedule_id: ScheduleId,
    ) -> DomainResult<CycleCount> {
        let mut schedule = self.schedules.get(schedule_id).ok_or(DomainError::NotFound)?;
        schedule.begin_execution()?;

        let mut items = Vec::with_capacity(schedule.pairs().len());
        for pair in schedule.pairs() {
            let sku = self.catalog.sku(pair.sku).ok_or(DomainError::NotFound)?;
            let expected = self.inventory.expected_quantity(pair.sku, pair.location);
            items.push(CountItem::new(
                pair.sku,
                pair.location,
                expected,
                sku.unit_value(),
            ));
        }

        let now = Utc::now();
        let count = CycleCount::new(
            CountId::new(AggregateId::new()),
            schedule_id,
            schedule.policy_id(),
            items,
            now,
        )?;
        self.counts.insert(count.clone())?;
        self.schedules.update(schedule.clone())?;

        let mut locations: Vec<LocationId> =
            count.items().iter().map(|i| i.location).collect();
        locations.sort();
        locations.dedup();
        self.publish(
            tenant_id,
            count.id_typed().0,
            CycleCountEvent::Created(CycleCountCreated {
                count_id: count.id_typed(),
                locations,
                scheduled_date: schedule.scheduled_for(),
                occurred_at: now,
            }),
        )?;

        info!(count = %count.id_typed(), items = count.items().len(), "cycle count created");
        Ok(count)
    }

    /// Record one physical count line and derive its variance.
    pub fn record_count_result(
        &self,
        count_id: CountId,
        sku: SkuId,
        location: LocationId,
        counted_quantity: u32,
    ) -> DomainResult<CountItemStatus> {
        let mut count = self.counts.get(count_id).ok_or(DomainError::NotFound)?;
        if count.status() == CycleCountStatus::Completed {
            return Err(DomainError::validation(
                "cannot record results on a completed count",
            ));
        }

        let policy = self
            .policies
            .get(count.policy_id())
            .ok_or(DomainError::NotFound)?;
        let unit_value = self
            .catalog
            .sku(sku)
            .ok_or(DomainError::NotFound)?
            .unit_value();

        let item = count
            .item_mut(sku, location)
            .ok_or(DomainError::NotFound)?;
        item.record(counted_quantity, unit_value, policy.tolerance());
        let status = item.status;

        self.counts.update(count)?;
        debug!(count = %count_id, %sku, ?status, "count line recorded");
        Ok(status)
    }

    /// Close a fully recorded count, auto-adjusting when the policy says so.
    ///
    /// Completing an already completed count is a no-op that returns the
    /// stored result (no adjustments, no second event).
    pub fn complete_cycle_count(
        &self,
        tenant_id: TenantId,
        count_id: CountId,
    ) -> DomainResult<CountResult> {
        let mut count = self.counts.get(count_id).ok_or(DomainError::NotFound)?;
        if count.status() == CycleCountStatus::Completed {
            return count
                .result()
                .ok_or_else(|| DomainError::invariant("completed count must carry a result"));
        }
        if !count.all_recorded() {
            return Err(DomainError::validation(
                "cannot complete a count with unrecorded items",
            ));
        }

        let policy = self
            .policies
            .get(count.policy_id())
            .ok_or(DomainError::NotFound)?;

        let mut adjustments_made = 0u32;
        if policy.auto_adjust() {
            for item in count.variant_items() {
                self.inventory.apply_adjustment(InventoryAdjustment {
                    sku: item.sku,
                    location: item.location,
                    quantity_delta: item.variance_quantity,
                    reason: format!("cycle count {count_id} variance"),
                })?;
                adjustments_made += 1;
            }
        }

        let discrepancies: Vec<Discrepancy> = count
            .variant_items()
            .map(|i| Discrepancy {
                sku: i.sku,
                location: i.location,
                variance_quantity: i.variance_quantity,
                variance_value: i.variance_value,
            })
            .collect();

        let now = Utc::now();
        let result = count.complete(adjustments_made, now)?;

        let mut schedule = self
            .schedules
            .get(count.schedule_id())
            .ok_or(DomainError::NotFound)?;
        schedule.complete()?;
        self.schedules.update(schedule)?;
        self.counts.update(count)?;

        self.publish(
            tenant_id,
            count_id.0,
            CycleCountEvent::Completed(CycleCountCompleted {
                count_id,
                discrepancies,
                accuracy_pct: result.accuracy_pct,
                occurred_at: now,
            }),
        )?;

        info!(
            count = %count_id,
            accuracy = result.accuracy_pct,
            variances = result.variances_found,
            adjustments = result.adjustments_made,
            "cycle count completed"
        );
        Ok(result)
    }

    /// Every SKU with an assigned slot, stalest location first.
    fn due_pairs(&self) -> Vec<CountPair> {
        let mut pairs: Vec<(Option<DateTime<Utc>>, CountPair)> = self
            .catalog
            .all_skus()
            .into_iter()
            .filter_map(|sku| {
                let location = self.catalog.sku_location(sku.id_typed())?;
                let last_counted = self
                    .catalog
                    .location(location)
                    .and_then(|l| l.last_counted_at());
                Some((
                    last_counted,
                    CountPair {
                        sku: sku.id_typed(),
                        location,
                    },
                ))
            })
            .collect();
        // `None` sorts first: never-counted locations are the most due.
        pairs.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.sku.cmp(&b.1.sku)));
        pairs.into_iter().map(|(_, pair)| pair).collect()
    }

    fn publish(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        event: CycleCountEvent,
    ) -> DomainResult<()> {
        self.bus
            .publish(EventEnvelope::wrap(tenant_id, aggregate_id, "cyclecount", event))
            .map_err(|e| DomainError::conflict(format!("event publication failed: {e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use stockflow_catalog::{
        CapacityLimits, Gtin, InMemoryCatalog, InMemoryInventory, Location, LotQuantity,
        PhysicalType, Sku,
    };
    use stockflow_events::InMemoryEventBus;

    use crate::policy::{CountPolicy, Tolerance};
    use crate::store::{InMemoryCountStore, InMemoryPolicyStore, InMemoryScheduleStore};

    struct Fixture {
        catalog: Arc<InMemoryCatalog>,
        inventory: Arc<InMemoryInventory>,
        policies: Arc<InMemoryPolicyStore>,
        schedules: Arc<InMemoryScheduleStore>,
        counts: Arc<InMemoryCountStore>,
        bus: Arc<InMemoryEventBus<EventEnvelope<CycleCountEvent>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                catalog: Arc::new(InMemoryCatalog::new()),
                inventory: Arc::new(InMemoryInventory::new()),
                policies: Arc::new(InMemoryPolicyStore::new()),
                schedules: Arc::new(InMemoryScheduleStore::new()),
                counts: Arc::new(InMemoryCountStore::new()),
                bus: Arc::new(InMemoryEventBus::new()),
            }
        }

        fn scheduler(
            &self,
        ) -> CycleCountScheduler<Arc<InMemoryEventBus<EventEnvelope<CycleCountEvent>>>> {
            CycleCountScheduler::new(
                self.catalog.clone(),
                self.inventory.clone(),
                self.policies.clone(),
                self.schedules.clone(),
                self.counts.clone(),
                self.bus.clone(),
            )
        }

        fn add_policy(&self, coverage_pct: f64, auto_adjust: bool) -> PolicyId {
            let policy = CountPolicy::new(
                PolicyId::new(AggregateId::new()),
                "standard",
                7,
                coverage_pct,
                Tolerance {
                    quantity_pct: 5.0,
                    value_pct: 5.0,
                },
                auto_adjust,
            )
            .unwrap();
            let id = policy.id_typed();
            self.policies.insert(policy).unwrap();
            id
        }

        fn add_slotted_sku(&self, code: &str, unit_value: u64, stock: u32) -> (SkuId, LocationId) {
            let location = Location::new(
                LocationId::new(AggregateId::new()),
                format!("A-{code}"),
                PhysicalType::Pick,
                "A",
                CapacityLimits {
                    max_quantity: 1000,
                    max_weight_kg: 1000.0,
                    max_volume_m3: 10.0,
                    unit: "ea".to_string(),
                },
            )
            .unwrap();
            let location_id = location.id_typed();
            self.catalog.insert_location(location);

            let sku = Sku::new(
                SkuId::new(AggregateId::new()),
                code,
                Gtin::new("96385074").unwrap(),
            )
            .unwrap()
            .with_unit_measures(1.0, 0.01, unit_value);
            let sku_id = sku.id_typed();
            self.catalog.insert_sku(sku);
            self.catalog.assign_sku_location(sku_id, location_id).unwrap();

            self.inventory.set_available(
                sku_id,
                location_id,
                vec![LotQuantity {
                    lot: None,
                    serial: None,
                    quantity: stock,
                }],
            );
            (sku_id, location_id)
        }
    }

    fn tenant() -> TenantId {
        TenantId::new()
    }

    #[test]
    fn unknown_policy_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .scheduler()
            .generate_schedule(PolicyId::new(AggregateId::new()), Utc::now(), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn schedule_walks_range_at_policy_frequency() {
        let fx = Fixture::new();
        for i in 0..4 {
            fx.add_slotted_sku(&format!("SKU-{i}"), 100, 10);
        }
        let policy = fx.add_policy(50.0, false);

        let from = Utc::now();
        let to = from + Duration::days(21);
        let schedules = fx.scheduler().generate_schedule(policy, from, to).unwrap();

        // Days 0, 7, 14, 21.
        assert_eq!(schedules.len(), 4);
        assert_eq!(schedules[0].scheduled_for(), from);
        assert_eq!(schedules[3].scheduled_for(), from + Duration::days(21));
        for schedule in &schedules {
            // 50% of 4 pairs.
            assert_eq!(schedule.pairs().len(), 2);
        }

        // Rotation: the first two occurrences together cover all four pairs.
        let covered: BTreeSet<CountPair> = schedules[0]
            .pairs()
            .iter()
            .chain(schedules[1].pairs())
            .copied()
            .collect();
        assert_eq!(covered.len(), 4);
    }

    #[test]
    fn count_flow_snapshots_records_and_adjusts() {
        let fx = Fixture::new();
        let (fine_sku, fine_loc) = fx.add_slotted_sku("FINE", 100, 50);
        let (off_sku, off_loc) = fx.add_slotted_sku("OFF", 100, 100);
        let policy = fx.add_policy(100.0, true);

        let scheduler = fx.scheduler();
        let subscription = fx.bus.subscribe();
        let from = Utc::now();
        let schedules = scheduler.generate_schedule(policy, from, from).unwrap();
        assert_eq!(schedules.len(), 1);

        let count = scheduler
            .create_count(tenant(), schedules[0].id_typed())
            .unwrap();
        assert_eq!(count.items().len(), 2);
        assert!(count.items().iter().any(|i| i.expected_quantity == 50));

        // Within tolerance.
        let status = scheduler
            .record_count_result(count.id_typed(), fine_sku, fine_loc, 49)
            .unwrap();
        assert_eq!(status, CountItemStatus::Counted);

        // 94/100 breaches the 5% tolerance.
        let status = scheduler
            .record_count_result(count.id_typed(), off_sku, off_loc, 94)
            .unwrap();
        assert_eq!(status, CountItemStatus::Variance);

        let result = scheduler
            .complete_cycle_count(tenant(), count.id_typed())
            .unwrap();
        assert_eq!(result.total_items, 2);
        assert_eq!(result.variances_found, 1);
        assert_eq!(result.accuracy_pct, 50.0);
        assert_eq!(result.adjustments_made, 1);

        let adjustments = fx.inventory.adjustments();
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].sku, off_sku);
        assert_eq!(adjustments[0].quantity_delta, -6);

        // Completing again is a no-op returning the stored result.
        let again = scheduler
            .complete_cycle_count(tenant(), count.id_typed())
            .unwrap();
        assert_eq!(again, result);
        assert_eq!(fx.inventory.adjustments().len(), 1);

        let mut created = 0;
        let mut completed = 0;
        while let Ok(envelope) = subscription.try_recv() {
            match envelope.payload() {
                CycleCountEvent::Created(_) => created += 1,
                CycleCountEvent::Completed(e) => {
                    completed += 1;
                    assert_eq!(e.discrepancies.len(), 1);
                    assert_eq!(e.discrepancies[0].sku, off_sku);
                }
            }
        }
        assert_eq!(created, 1);
        assert_eq!(completed, 1);
    }

    #[test]
    fn completion_requires_all_lines_recorded() {
        let fx = Fixture::new();
        fx.add_slotted_sku("ONE", 10, 5);
        fx.add_slotted_sku("TWO", 10, 5);
        let policy = fx.add_policy(100.0, false);

        let scheduler = fx.scheduler();
        let from = Utc::now();
        let schedules = scheduler.generate_schedule(policy, from, from).unwrap();
        let count = scheduler
            .create_count(tenant(), schedules[0].id_typed())
            .unwrap();

        let err = scheduler
            .complete_cycle_count(tenant(), count.id_typed())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn recording_on_a_completed_count_is_rejected() {
        let fx = Fixture::new();
        let (sku, location) = fx.add_slotted_sku("ONLY", 10, 5);
        let policy = fx.add_policy(100.0, false);

        let scheduler = fx.scheduler();
        let from = Utc::now();
        let schedules = scheduler.generate_schedule(policy, from, from).unwrap();
        let count = scheduler
            .create_count(tenant(), schedules[0].id_typed())
            .unwrap();
        scheduler
            .record_count_result(count.id_typed(), sku, location, 5)
            .unwrap();
        scheduler
            .complete_cycle_count(tenant(), count.id_typed())
            .unwrap();

        let err = scheduler
            .record_count_result(count.id_typed(), sku, location, 4)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn double_count_on_same_schedule_is_rejected() {
        let fx = Fixture::new();
        fx.add_slotted_sku("ONLY", 10, 5);
        let policy = fx.add_policy(100.0, false);

        let scheduler = fx.scheduler();
        let from = Utc::now();
        let schedules = scheduler.generate_schedule(policy, from, from).unwrap();
        scheduler
            .create_count(tenant(), schedules[0].id_typed())
            .unwrap();

        let err = scheduler
            .create_count(tenant(), schedules[0].id_typed())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 200,
                ..ProptestConfig::default()
            })]

            /// Property: a count where every line matches its snapshot always
            /// completes at 100% accuracy with zero adjustments.
            #[test]
            fn perfect_counts_are_perfectly_accurate(
                stocks in proptest::collection::vec(0u32..500, 1..6)
            ) {
                let fx = Fixture::new();
                let mut pairs = Vec::new();
                for (i, stock) in stocks.iter().enumerate() {
                    pairs.push((fx.add_slotted_sku(&format!("SKU-{i}"), 10, *stock), *stock));
                }
                let policy = fx.add_policy(100.0, true);

                let scheduler = fx.scheduler();
                let from = Utc::now();
                let schedules = scheduler.generate_schedule(policy, from, from).unwrap();
                let count = scheduler
                    .create_count(tenant(), schedules[0].id_typed())
                    .unwrap();

                for ((sku, location), stock) in pairs {
                    scheduler
                        .record_count_result(count.id_typed(), sku, location, stock)
                        .unwrap();
                }

                let result = scheduler
                    .complete_cycle_count(tenant(), count.id_typed())
                    .unwrap();
                prop_assert_eq!(result.accuracy_pct, 100.0);
                prop_assert_eq!(result.variances_found, 0);
                prop_assert_eq!(result.adjustments_made, 0);
                prop_assert!(fx.inventory.adjustments().is_empty());
            }
        }
    }
}
