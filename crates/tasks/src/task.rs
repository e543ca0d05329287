use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_catalog::{LocationId, SkuId};
use stockflow_core::{AggregateId, DomainError, DomainResult, Entity};

/// Task identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub AggregateId);

impl TaskId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// What kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Putaway,
    Pick,
    Pack,
}

/// Source document a task was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum SourceDocument {
    /// Advance Shipment Notice (inbound receipt).
    Asn(AggregateId),
    /// Outbound customer order.
    Order(AggregateId),
    /// Pick wave (pack tasks reference the wave they drain).
    Wave(AggregateId),
}

/// Task priority, clamped to 0..=20.
///
/// Strategy bonuses stack; the cap keeps runaway stacking from starving the
/// rest of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    pub const MAX: u8 = 20;

    /// Saturating constructor: anything above the cap becomes the cap.
    pub fn new(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Saturating add, still capped.
    pub fn plus(&self, bonus: u8) -> Self {
        Self::new(self.0.saturating_add(bonus))
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self(5)
    }
}

/// Task lifecycle.
///
/// `Short` and `Damaged` are business outcomes, not errors: callers branch on
/// status. `Cancelled` freezes the task without reverting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Short,
    Damaged,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Short | TaskStatus::Damaged | TaskStatus::Cancelled
        )
    }
}

/// Entity: a unit of warehouse work (putaway / pick / pack).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseTask {
    id: TaskId,
    kind: TaskKind,
    source: SourceDocument,
    sku: SkuId,
    quantity_requested: u32,
    quantity_fulfilled: u32,
    from_location: Option<LocationId>,
    to_location: Option<LocationId>,
    priority: Priority,
    /// Strategy tag (e.g. "velocity", "cluster") for reporting.
    strategy: String,
    status: TaskStatus,
    assigned_to: Option<String>,
    /// Visit order within a wave (cluster sequencing).
    sequence: Option<u32>,
    /// Planner estimate, minutes.
    estimated_minutes: Option<u32>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl WarehouseTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TaskId,
        kind: TaskKind,
        source: SourceDocument,
        sku: SkuId,
        quantity_requested: u32,
        priority: Priority,
        strategy: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity_requested == 0 {
            return Err(DomainError::validation("quantity_requested must be positive"));
        }
        Ok(Self {
            id,
            kind,
            source,
            sku,
            quantity_requested,
            quantity_fulfilled: 0,
            from_location: None,
            to_location: None,
            priority,
            strategy: strategy.into(),
            status: TaskStatus::Pending,
            assigned_to: None,
            sequence: None,
            estimated_minutes: None,
            created_at,
            started_at: None,
            completed_at: None,
        })
    }

    pub fn with_route(mut self, from: Option<LocationId>, to: Option<LocationId>) -> Self {
        self.from_location = from;
        self.to_location = to;
        self
    }

    pub fn with_estimated_minutes(mut self, minutes: u32) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }

    pub fn id_typed(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn source(&self) -> SourceDocument {
        self.source
    }

    pub fn sku(&self) -> SkuId {
        self.sku
    }

    pub fn quantity_requested(&self) -> u32 {
        self.quantity_requested
    }

    pub fn quantity_fulfilled(&self) -> u32 {
        self.quantity_fulfilled
    }

    pub fn from_location(&self) -> Option<LocationId> {
        self.from_location
    }

    pub fn to_location(&self) -> Option<LocationId> {
        self.to_location
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn assigned_to(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }

    pub fn sequence(&self) -> Option<u32> {
        self.sequence
    }

    pub fn estimated_minutes(&self) -> Option<u32> {
        self.estimated_minutes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fulfilled / requested, in [0, 1].
    pub fn accuracy(&self) -> f64 {
        f64::from(self.quantity_fulfilled) / f64::from(self.quantity_requested)
    }

    /// Wall time from start to completion.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn assign(&mut self, worker: impl Into<String>) {
        self.assigned_to = Some(worker.into());
    }

    pub fn set_sequence(&mut self, sequence: u32) {
        self.sequence = Some(sequence);
    }

    /// Merge another task for the same (SKU, location) pair into this one
    /// (batch grouping): quantities add up, the higher priority wins.
    pub fn absorb(&mut self, other: &WarehouseTask) -> DomainResult<()> {
        if self.sku != other.sku || self.from_location != other.from_location {
            return Err(DomainError::invariant(
                "only tasks for the same SKU and location can be merged",
            ));
        }
        if self.status != TaskStatus::Pending || other.status != TaskStatus::Pending {
            return Err(DomainError::validation("only pending tasks can be merged"));
        }
        self.quantity_requested += other.quantity_requested;
        self.priority = self.priority.max(other.priority);
        Ok(())
    }

    /// Pending → InProgress.
    pub fn start(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != TaskStatus::Pending {
            return Err(DomainError::validation(format!(
                "cannot start task in status {:?}",
                self.status
            )));
        }
        self.status = TaskStatus::InProgress;
        self.started_at = Some(at);
        Ok(())
    }

    /// InProgress → Completed | Short | Damaged.
    ///
    /// `fulfilled > requested` is a validation error with no side effects. A
    /// failed quality check wins over a short pick.
    pub fn complete(
        &mut self,
        fulfilled: u32,
        quality_ok: bool,
        at: DateTime<Utc>,
    ) -> DomainResult<TaskStatus> {
        if self.status != TaskStatus::InProgress {
            return Err(DomainError::validation(format!(
                "cannot complete task in status {:?}",
                self.status
            )));
        }
        if fulfilled > self.quantity_requested {
            return Err(DomainError::validation(format!(
                "fulfilled quantity {fulfilled} exceeds requested {}",
                self.quantity_requested
            )));
        }

        self.status = if !quality_ok {
            TaskStatus::Damaged
        } else if fulfilled < self.quantity_requested {
            TaskStatus::Short
        } else {
            TaskStatus::Completed
        };
        self.quantity_fulfilled = fulfilled;
        self.completed_at = Some(at);
        Ok(self.status)
    }

    /// Pending | InProgress → Cancelled. Freezes state, reverts nothing.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::validation(format!(
                "cannot cancel task in status {:?}",
                self.status
            )));
        }
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(at);
        Ok(())
    }
}

impl Entity for WarehouseTask {
    type Id = TaskId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
