use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_catalog::{LocationId, SkuId};
use stockflow_core::{AggregateId, DomainError, DomainResult, Entity};

use crate::policy::PolicyId;

/// Schedule identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(pub AggregateId);

impl ScheduleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Executing,
    Completed,
}

/// One (SKU, location) pair selected for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CountPair {
    pub sku: SkuId,
    pub location: LocationId,
}

/// One scheduled count occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleCountSchedule {
    id: ScheduleId,
    policy_id: PolicyId,
    scheduled_for: DateTime<Utc>,
    pairs: Vec<CountPair>,
    status: ScheduleStatus,
    created_at: DateTime<Utc>,
}

impl CycleCountSchedule {
    pub fn new(
        id: ScheduleId,
        policy_id: PolicyId,
        scheduled_for: DateTime<Utc>,
        pairs: Vec<CountPair>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if pairs.is_empty() {
            return Err(DomainError::validation(
                "a schedule needs at least one pair to count",
            ));
        }
        Ok(Self {
            id,
            policy_id,
            scheduled_for,
            pairs,
            status: ScheduleStatus::Pending,
            created_at,
        })
    }

    pub fn id_typed(&self) -> ScheduleId {
        self.id
    }

    pub fn policy_id(&self) -> PolicyId {
        self.policy_id
    }

    pub fn scheduled_for(&self) -> DateTime<Utc> {
        self.scheduled_for
    }

    pub fn pairs(&self) -> &[CountPair] {
        &self.pairs
    }

    pub fn status(&self) -> ScheduleStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Pending → Executing (a count was opened for this occurrence).
    pub fn begin_execution(&mut self) -> DomainResult<()> {
        if self.status != ScheduleStatus::Pending {
            return Err(DomainError::validation(format!(
                "cannot execute a schedule in status {:?}",
                self.status
            )));
        }
        self.status = ScheduleStatus::Executing;
        Ok(())
    }

    /// Executing → Completed.
    pub fn complete(&mut self) -> DomainResult<()> {
        if self.status != ScheduleStatus::Executing {
            return Err(DomainError::validation(format!(
                "cannot complete a schedule in status {:?}",
                self.status
            )));
        }
        self.status = ScheduleStatus::Completed;
        Ok(())
    }
}

impl Entity for CycleCountSchedule {
    type Id = ScheduleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_schedule() -> CycleCountSchedule {
        CycleCountSchedule::new(
            ScheduleId::new(AggregateId::new()),
            PolicyId::new(AggregateId::new()),
            Utc::now(),
            vec![CountPair {
                sku: SkuId::new(AggregateId::new()),
                location: LocationId::new(AggregateId::new()),
            }],
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn lifecycle_is_pending_executing_completed() {
        let mut schedule = test_schedule();
        assert_eq!(schedule.status(), ScheduleStatus::Pending);
        assert!(schedule.complete().is_err());

        schedule.begin_execution().unwrap();
        assert!(schedule.begin_execution().is_err());

        schedule.complete().unwrap();
        assert_eq!(schedule.status(), ScheduleStatus::Completed);
    }
}
