use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_catalog::{LocationId, SkuId};
use stockflow_core::{AggregateId, DomainError, DomainResult, Entity};

use crate::policy::{PolicyId, Tolerance};
use crate::schedule::ScheduleId;

/// Count identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountId(pub AggregateId);

impl CountId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Per-item count state.
///
/// `Variance` is a business outcome, not an error: the item was counted and
/// the difference breached the policy's tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountItemStatus {
    Pending,
    Counted,
    Variance,
}

/// One (SKU, location) line of a cycle count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountItem {
    pub sku: SkuId,
    pub location: LocationId,
    pub expected_quantity: u32,
    /// Expected quantity valued at the SKU's unit value, minor currency units.
    pub expected_value: u64,
    pub counted_quantity: Option<u32>,
    pub variance_quantity: i64,
    pub variance_value: i64,
    pub quantity_variance_pct: f64,
    pub value_variance_pct: f64,
    pub status: CountItemStatus,
}

impl CountItem {
    pub fn new(sku: SkuId, location: LocationId, expected_quantity: u32, unit_value: u64) -> Self {
        Self {
            sku,
            location,
            expected_quantity,
            expected_value: u64::from(expected_quantity) * unit_value,
            counted_quantity: None,
            variance_quantity: 0,
            variance_value: 0,
            quantity_variance_pct: 0.0,
            value_variance_pct: 0.0,
            status: CountItemStatus::Pending,
        }
    }

    /// Record the physical count and derive variances against the tolerance.
    ///
    /// A zero-expected line counted as nonzero is treated as a full 100%
    /// variance (the percent formula would otherwise divide by zero).
    pub fn record(&mut self, counted: u32, unit_value: u64, tolerance: Tolerance) {
        let counted_value = u64::from(counted) * unit_value;
        self.counted_quantity = Some(counted);
        self.variance_quantity = i64::from(counted) - i64::from(self.expected_quantity);
        self.variance_value = counted_value as i64 - self.expected_value as i64;
        self.quantity_variance_pct =
            variance_pct(self.variance_quantity, u64::from(self.expected_quantity));
        self.value_variance_pct = variance_pct(self.variance_value, self.expected_value);

        self.status = if self.quantity_variance_pct.abs() > tolerance.quantity_pct
            || self.value_variance_pct.abs() > tolerance.value_pct
        {
            CountItemStatus::Variance
        } else {
            CountItemStatus::Counted
        };
    }

    pub fn is_recorded(&self) -> bool {
        self.status != CountItemStatus::Pending
    }
}

fn variance_pct(variance: i64, expected: u64) -> f64 {
    if expected == 0 {
        if variance == 0 { 0.0 } else { 100.0 }
    } else {
        variance as f64 / expected as f64 * 100.0
    }
}

/// Aggregate results derived when a count completes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountResult {
    pub total_items: u32,
    pub variances_found: u32,
    /// (total − variances) / total × 100.
    pub accuracy_pct: f64,
    pub total_variance_value: i64,
    pub adjustments_made: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleCountStatus {
    Open,
    Completed,
}

/// An executing cycle count: expected snapshots awaiting physical counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleCount {
    id: CountId,
    schedule_id: ScheduleId,
    policy_id: PolicyId,
    items: Vec<CountItem>,
    status: CycleCountStatus,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<CountResult>,
}

impl CycleCount {
    pub fn new(
        id: CountId,
        schedule_id: ScheduleId,
        policy_id: PolicyId,
        items: Vec<CountItem>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("a count needs at least one item"));
        }
        Ok(Self {
            id,
            schedule_id,
            policy_id,
            items,
            status: CycleCountStatus::Open,
            created_at,
            completed_at: None,
            result: None,
        })
    }

    pub fn id_typed(&self) -> CountId {
        self.id
    }

    pub fn schedule_id(&self) -> ScheduleId {
        self.schedule_id
    }

    pub fn policy_id(&self) -> PolicyId {
        self.policy_id
    }

    pub fn items(&self) -> &[CountItem] {
        &self.items
    }

    pub fn status(&self) -> CycleCountStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn result(&self) -> Option<CountResult> {
        self.result
    }

    pub fn item_mut(&mut self, sku: SkuId, location: LocationId) -> Option<&mut CountItem> {
        self.items
            .iter_mut()
            .find(|i| i.sku == sku && i.location == location)
    }

    pub fn all_recorded(&self) -> bool {
        self.items.iter().all(CountItem::is_recorded)
    }

    pub fn variant_items(&self) -> impl Iterator<Item = &CountItem> {
        self.items
            .iter()
            .filter(|i| i.status == CountItemStatus::Variance)
    }

    /// Derive the aggregate result and close the count.
    pub fn complete(&mut self, adjustments_made: u32, at: DateTime<Utc>) -> DomainResult<CountResult> {
        if self.status == CycleCountStatus::Completed {
            return Err(DomainError::validation("count is already completed"));
        }
        if !self.all_recorded() {
            return Err(DomainError::validation(
                "cannot complete a count with unrecorded items",
            ));
        }

        let total = self.items.len() as u32;
        let variances = self.variant_items().count() as u32;
        let result = CountResult {
            total_items: total,
            variances_found: variances,
            accuracy_pct: f64::from(total - variances) / f64::from(total) * 100.0,
            total_variance_value: self.items.iter().map(|i| i.variance_value).sum(),
            adjustments_made,
        };
        self.status = CycleCountStatus::Completed;
        self.completed_at = Some(at);
        self.result = Some(result);
        Ok(result)
    }
}

impl Entity for CycleCount {
    type Id = CountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tolerance() -> Tolerance {
        Tolerance {
            quantity_pct: 5.0,
            value_pct: 5.0,
        }
    }

    fn item(expected: u32) -> CountItem {
        CountItem::new(
            SkuId::new(AggregateId::new()),
            LocationId::new(AggregateId::new()),
            expected,
            10,
        )
    }

    #[test]
    fn variance_flags_only_beyond_tolerance() {
        // 94/100 is a -6% variance, outside the 5% tolerance.
        let mut breached = item(100);
        breached.record(94, 10, tolerance());
        assert_eq!(breached.status, CountItemStatus::Variance);
        assert_eq!(breached.variance_quantity, -6);
        assert_eq!(breached.quantity_variance_pct, -6.0);

        // 97/100 is within tolerance.
        let mut fine = item(100);
        fine.record(97, 10, tolerance());
        assert_eq!(fine.status, CountItemStatus::Counted);
    }

    #[test]
    fn zero_expected_with_stock_found_is_a_full_variance() {
        let mut surprise = item(0);
        surprise.record(3, 10, tolerance());
        assert_eq!(surprise.status, CountItemStatus::Variance);
        assert_eq!(surprise.quantity_variance_pct, 100.0);

        let mut empty = item(0);
        empty.record(0, 10, tolerance());
        assert_eq!(empty.status, CountItemStatus::Counted);
    }

    #[test]
    fn completion_requires_every_item_recorded() {
        let mut count = CycleCount::new(
            CountId::new(AggregateId::new()),
            ScheduleId::new(AggregateId::new()),
            PolicyId::new(AggregateId::new()),
            vec![item(10), item(20)],
            Utc::now(),
        )
        .unwrap();

        assert!(count.complete(0, Utc::now()).is_err());

        let (sku, location) = (count.items()[0].sku, count.items()[0].location);
        count.item_mut(sku, location).unwrap().record(10, 10, tolerance());
        assert!(count.complete(0, Utc::now()).is_err());

        let (sku, location) = (count.items()[1].sku, count.items()[1].location);
        count.item_mut(sku, location).unwrap().record(5, 10, tolerance());
        let result = count.complete(1, Utc::now()).unwrap();

        assert_eq!(result.total_items, 2);
        assert_eq!(result.variances_found, 1);
        assert_eq!(result.accuracy_pct, 50.0);
        assert_eq!(result.total_variance_value, -150);
    }
}
