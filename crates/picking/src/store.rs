//! Keyed stores for waves and tasks.
//!
//! Orchestrators never hold global maps; they go through these traits so a
//! transactional backend can be swapped in. The in-memory implementations are
//! for tests/dev.
//!
//! Concurrency: wave updates carry an [`ExpectedVersion`] (optimistic check);
//! task transitions run inside `with_task_mut` under the store's write lock,
//! which linearizes them per task — two racing `complete` calls cannot both
//! succeed.

use std::collections::HashMap;
use std::sync::RwLock;

use stockflow_core::{AggregateRoot, DomainError, DomainResult, ExpectedVersion};
use stockflow_tasks::{TaskId, WarehouseTask};

use crate::wave::{Wave, WaveId};

/// Wave persistence port.
pub trait WaveStore: Send + Sync {
    fn insert(&self, wave: Wave) -> DomainResult<()>;

    fn get(&self, id: WaveId) -> Option<Wave>;

    /// Write back a mutated wave; `expected` is the version read before the
    /// mutation.
    fn update(&self, wave: Wave, expected: ExpectedVersion) -> DomainResult<()>;

    /// The wave owning a task.
    fn find_by_task(&self, task: TaskId) -> Option<Wave>;
}

/// Task persistence port.
pub trait TaskStore: Send + Sync {
    fn insert(&self, task: WarehouseTask) -> DomainResult<()>;

    fn get(&self, id: TaskId) -> Option<WarehouseTask>;

    /// Run a transition on a task while holding the store's write lock.
    fn with_task_mut(
        &self,
        id: TaskId,
        f: &mut dyn FnMut(&mut WarehouseTask) -> DomainResult<()>,
    ) -> DomainResult<WarehouseTask>;
}

/// In-memory wave store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryWaveStore {
    waves: RwLock<HashMap<WaveId, Wave>>,
}

impl InMemoryWaveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaveStore for InMemoryWaveStore {
    fn insert(&self, wave: Wave) -> DomainResult<()> {
        let mut waves = self.waves.write().unwrap();
        if waves.contains_key(&wave.id_typed()) {
            return Err(DomainError::conflict(format!(
                "wave {} already exists",
                wave.id_typed()
            )));
        }
        waves.insert(wave.id_typed(), wave);
        Ok(())
    }

    fn get(&self, id: WaveId) -> Option<Wave> {
        self.waves.read().unwrap().get(&id).cloned()
    }

    fn update(&self, wave: Wave, expected: ExpectedVersion) -> DomainResult<()> {
        let mut waves = self.waves.write().unwrap();
        let current = waves.get(&wave.id_typed()).ok_or(DomainError::NotFound)?;
        expected.check(current.version())?;
        waves.insert(wave.id_typed(), wave);
        Ok(())
    }

    fn find_by_task(&self, task: TaskId) -> Option<Wave> {
        self.waves
            .read()
            .unwrap()
            .values()
            .find(|w| w.task_ids().contains(&task))
            .cloned()
    }
}

/// In-memory task store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, WarehouseTask>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn insert(&self, task: WarehouseTask) -> DomainResult<()> {
        let mut tasks = self.tasks.write().unwrap();
        if tasks.contains_key(&task.id_typed()) {
            return Err(DomainError::conflict(format!(
                "task {} already exists",
                task.id_typed()
            )));
        }
        tasks.insert(task.id_typed(), task);
        Ok(())
    }

    fn get(&self, id: TaskId) -> Option<WarehouseTask> {
        self.tasks.read().unwrap().get(&id).cloned()
    }

    fn with_task_mut(
        &self,
        id: TaskId,
        f: &mut dyn FnMut(&mut WarehouseTask) -> DomainResult<()>,
    ) -> DomainResult<WarehouseTask> {
        let mut tasks = self.tasks.write().unwrap();
        let task = tasks.get_mut(&id).ok_or(DomainError::NotFound)?;
        f(task)?;
        Ok(task.clone())
    }
}
