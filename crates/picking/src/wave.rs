use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{AggregateId, AggregateRoot, DomainError, DomainResult};
use stockflow_tasks::{Priority, TaskId};

/// Wave identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaveId(pub AggregateId);

impl WaveId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for WaveId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Wave lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveStatus {
    Planned,
    Released,
    InProgress,
    Completed,
}

/// Productivity metrics derived when a wave completes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveProductivity {
    /// Units picked per hour.
    pub picks_per_hour: f64,
    /// Task lines worked per hour.
    pub lines_per_hour: f64,
    /// Picked / requested quantity, percent.
    pub accuracy_pct: f64,
    pub avg_seconds_per_pick: f64,
}

/// Aggregate root: a batch of pick tasks released together.
///
/// The version counter bumps on every mutation so stores can run optimistic
/// concurrency checks (two pickers racing on wave bookkeeping).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    id: WaveId,
    status: WaveStatus,
    strategy: String,
    zone: Option<String>,
    priority: Priority,
    task_ids: Vec<TaskId>,
    total_tasks: u32,
    completed_tasks: u32,
    total_quantity: u32,
    picked_quantity: u32,
    created_at: DateTime<Utc>,
    released_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    productivity: Option<WaveProductivity>,
    version: u64,
}

impl Wave {
    pub fn new(
        id: WaveId,
        strategy: impl Into<String>,
        zone: Option<String>,
        priority: Priority,
        task_ids: Vec<TaskId>,
        total_quantity: u32,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if task_ids.is_empty() {
            return Err(DomainError::validation("a wave needs at least one task"));
        }
        let total_tasks = task_ids.len() as u32;
        Ok(Self {
            id,
            status: WaveStatus::Planned,
            strategy: strategy.into(),
            zone,
            priority,
            task_ids,
            total_tasks,
            completed_tasks: 0,
            total_quantity,
            picked_quantity: 0,
            created_at,
            released_at: None,
            completed_at: None,
            productivity: None,
            version: 0,
        })
    }

    pub fn id_typed(&self) -> WaveId {
        self.id
    }

    pub fn status(&self) -> WaveStatus {
        self.status
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn task_ids(&self) -> &[TaskId] {
        &self.task_ids
    }

    pub fn total_tasks(&self) -> u32 {
        self.total_tasks
    }

    pub fn completed_tasks(&self) -> u32 {
        self.completed_tasks
    }

    pub fn total_quantity(&self) -> u32 {
        self.total_quantity
    }

    pub fn picked_quantity(&self) -> u32 {
        self.picked_quantity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn released_at(&self) -> Option<DateTime<Utc>> {
        self.released_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn productivity(&self) -> Option<&WaveProductivity> {
        self.productivity.as_ref()
    }

    /// Planned → Released.
    pub fn release(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != WaveStatus::Planned {
            return Err(DomainError::validation(format!(
                "cannot release wave in status {:?}",
                self.status
            )));
        }
        self.status = WaveStatus::Released;
        self.released_at = Some(at);
        self.version += 1;
        Ok(())
    }

    /// Released → InProgress (first task started). No-op once in progress.
    pub fn note_started(&mut self) -> DomainResult<()> {
        match self.status {
            WaveStatus::Released => {
                self.status = WaveStatus::InProgress;
                self.version += 1;
                Ok(())
            }
            WaveStatus::InProgress => Ok(()),
            _ => Err(DomainError::validation(format!(
                "cannot start picking a wave in status {:?}",
                self.status
            ))),
        }
    }

    /// Refresh progress counters from the task set.
    pub fn record_progress(&mut self, completed_tasks: u32, picked_quantity: u32) {
        self.completed_tasks = completed_tasks;
        self.picked_quantity = picked_quantity;
        self.version += 1;
    }

    /// Complete the wave exactly once, precisely when every task is terminal.
    ///
    /// Returns `true` when this call performed the transition. Re-invoking on a
    /// completed wave is a no-op returning `false`.
    pub fn try_complete(&mut self, at: DateTime<Utc>) -> bool {
        if self.status == WaveStatus::Completed {
            return false;
        }
        if self.completed_tasks != self.total_tasks {
            return false;
        }
        self.status = WaveStatus::Completed;
        self.completed_at = Some(at);
        self.productivity = Some(self.compute_productivity(at));
        self.version += 1;
        true
    }

    /// Release-to-completion wall time.
    pub fn actual_duration(&self) -> Option<chrono::Duration> {
        match (self.released_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    fn compute_productivity(&self, completed_at: DateTime<Utc>) -> WaveProductivity {
        let seconds = self
            .released_at
            .map(|r| (completed_at - r).num_milliseconds() as f64 / 1_000.0)
            .unwrap_or(0.0)
            .max(f64::EPSILON);
        let hours = seconds / 3_600.0;

        WaveProductivity {
            picks_per_hour: f64::from(self.picked_quantity) / hours,
            lines_per_hour: f64::from(self.total_tasks) / hours,
            accuracy_pct: if self.total_quantity == 0 {
                100.0
            } else {
                f64::from(self.picked_quantity) / f64::from(self.total_quantity) * 100.0
            },
            avg_seconds_per_pick: if self.picked_quantity == 0 {
                0.0
            } else {
                seconds / f64::from(self.picked_quantity)
            },
        }
    }
}

impl AggregateRoot for Wave {
    type Id = WaveId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockflow_tasks::TaskId;

    fn test_wave(tasks: usize, total_quantity: u32) -> Wave {
        let task_ids = (0..tasks)
            .map(|_| TaskId::new(AggregateId::new()))
            .collect();
        Wave::new(
            WaveId::new(AggregateId::new()),
            "batch",
            Some("A".to_string()),
            Priority::new(7),
            task_ids,
            total_quantity,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn empty_wave_is_rejected() {
        let err = Wave::new(
            WaveId::new(AggregateId::new()),
            "batch",
            None,
            Priority::default(),
            vec![],
            0,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn release_only_from_planned() {
        let mut wave = test_wave(2, 10);
        wave.release(Utc::now()).unwrap();
        assert_eq!(wave.status(), WaveStatus::Released);
        assert!(wave.release(Utc::now()).is_err());
    }

    #[test]
    fn completion_requires_all_tasks_terminal() {
        let mut wave = test_wave(2, 10);
        wave.release(Utc::now()).unwrap();
        wave.note_started().unwrap();

        wave.record_progress(1, 5);
        assert!(!wave.try_complete(Utc::now()));
        assert_eq!(wave.status(), WaveStatus::InProgress);

        wave.record_progress(2, 10);
        assert!(wave.try_complete(Utc::now()));
        assert_eq!(wave.status(), WaveStatus::Completed);
        assert!(wave.productivity().is_some());
        assert!(wave.actual_duration().is_some());
    }

    #[test]
    fn completion_is_idempotent() {
        let mut wave = test_wave(1, 4);
        wave.release(Utc::now()).unwrap();
        wave.note_started().unwrap();
        wave.record_progress(1, 4);

        assert!(wave.try_complete(Utc::now()));
        let completed_at = wave.completed_at();
        let version = wave.version();

        // Re-invoking completion after completion is a no-op.
        assert!(!wave.try_complete(Utc::now()));
        assert_eq!(wave.completed_at(), completed_at);
        assert_eq!(wave.version(), version);
    }

    #[test]
    fn productivity_reflects_picked_quantity() {
        let mut wave = test_wave(2, 10);
        let start = Utc::now();
        wave.release(start).unwrap();
        wave.note_started().unwrap();
        wave.record_progress(2, 9);
        assert!(wave.try_complete(start + chrono::Duration::minutes(30)));

        let p = wave.productivity().unwrap();
        assert!((p.accuracy_pct - 90.0).abs() < 1e-9);
        assert!((p.picks_per_hour - 18.0).abs() < 1e-6);
        assert!((p.lines_per_hour - 4.0).abs() < 1e-6);
        assert!((p.avg_seconds_per_pick - 200.0).abs() < 1e-6);
    }

    #[test]
    fn version_bumps_on_every_mutation() {
        let mut wave = test_wave(1, 1);
        assert_eq!(wave.version(), 0);
        wave.release(Utc::now()).unwrap();
        assert_eq!(wave.version(), 1);
        wave.note_started().unwrap();
        assert_eq!(wave.version(), 2);
        wave.record_progress(1, 1);
        assert_eq!(wave.version(), 3);
        assert!(wave.try_complete(Utc::now()));
        assert_eq!(wave.version(), 4);
    }
}
