//! Persistence ports for policies, schedules and counts.

use std::collections::HashMap;
use std::sync::RwLock;

use stockflow_core::{DomainError, DomainResult};

use crate::count::{CountId, CycleCount};
use crate::policy::{CountPolicy, PolicyId};
use crate::schedule::{CycleCountSchedule, ScheduleId};

pub trait PolicyStore: Send + Sync {
    fn insert(&self, policy: CountPolicy) -> DomainResult<()>;
    fn get(&self, id: PolicyId) -> Option<CountPolicy>;
}

pub trait ScheduleStore: Send + Sync {
    fn insert(&self, schedule: CycleCountSchedule) -> DomainResult<()>;
    fn get(&self, id: ScheduleId) -> Option<CycleCountSchedule>;
    fn update(&self, schedule: CycleCountSchedule) -> DomainResult<()>;
}

pub trait CountStore: Send + Sync {
    fn insert(&self, count: CycleCount) -> DomainResult<()>;
    fn get(&self, id: CountId) -> Option<CycleCount>;
    fn update(&self, count: CycleCount) -> DomainResult<()>;
}

/// In-memory policy store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    policies: RwLock<HashMap<PolicyId, CountPolicy>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn insert(&self, policy: CountPolicy) -> DomainResult<()> {
        let mut policies = self.policies.write().unwrap();
        if policies.contains_key(&policy.id_typed()) {
            return Err(DomainError::conflict(format!(
                "policy {} already exists",
                policy.id_typed()
            )));
        }
        policies.insert(policy.id_typed(), policy);
        Ok(())
    }

    fn get(&self, id: PolicyId) -> Option<CountPolicy> {
        self.policies.read().unwrap().get(&id).cloned()
    }
}

/// In-memory schedule store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    schedules: RwLock<HashMap<ScheduleId, CycleCountSchedule>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleStore for InMemoryScheduleStore {
    fn insert(&self, schedule: CycleCountSchedule) -> DomainResult<()> {
        let mut schedules = self.schedules.write().unwrap();
        if schedules.contains_key(&schedule.id_typed()) {
            return Err(DomainError::conflict(format!(
                "schedule {} already exists",
                schedule.id_typed()
            )));
        }
        schedules.insert(schedule.id_typed(), schedule);
        Ok(())
    }

    fn get(&self, id: ScheduleId) -> Option<CycleCountSchedule> {
        self.schedules.read().unwrap().get(&id).cloned()
    }

    fn update(&self, schedule: CycleCountSchedule) -> DomainResult<()> {
        let mut schedules = self.schedules.write().unwrap();
        if !schedules.contains_key(&schedule.id_typed()) {
            return Err(DomainError::NotFound);
        }
        schedules.insert(schedule.id_typed(), schedule);
        Ok(())
    }
}

/// In-memory count store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCountStore {
    counts: RwLock<HashMap<CountId, CycleCount>>,
}

impl InMemoryCountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CountStore for InMemoryCountStore {
    fn insert(&self, count: CycleCount) -> DomainResult<()> {
        let mut counts = self.counts.write().unwrap();
        if counts.contains_key(&count.id_typed()) {
            return Err(DomainError::conflict(format!(
                "count {} already exists",
                count.id_typed()
            )));
        }
        counts.insert(count.id_typed(), count);
        Ok(())
    }

    fn get(&self, id: CountId) -> Option<CycleCount> {
        self.counts.read().unwrap().get(&id).cloned()
    }

    fn update(&self, count: CycleCount) -> DomainResult<()> {
        let mut counts = self.counts.write().unwrap();
        if !counts.contains_key(&count.id_typed()) {
            return Err(DomainError::NotFound);
        }
        counts.insert(count.id_typed(), count);
        Ok(())
    }
}
