use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use stockflow_catalog::{
    CatalogRepository, InventoryRepository, Location, LocationId, SkuId,
};
use stockflow_core::{
    AggregateId, AggregateRoot, DomainError, DomainResult, ExpectedVersion, TenantId,
};
use stockflow_events::{Event, EventBus, EventEnvelope};
use stockflow_tasks::{Priority, SourceDocument, TaskId, TaskKind, TaskStatus, WarehouseTask};

use crate::ports::{OrderId, OrderRepository};
use crate::store::{TaskStore, WaveStore};
use crate::wave::{Wave, WaveId, WaveProductivity, WaveStatus};

/// How pick tasks are grouped and ordered within a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveStrategy {
    /// Consolidate tasks sharing a (SKU, location) pair.
    Batch,
    /// Sort tasks by zone, then by distance from the zone's start point.
    Zone,
    /// Nearest-neighbor route construction (greedy TSP approximation).
    Cluster,
}

impl WaveStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaveStrategy::Batch => "batch",
            WaveStrategy::Zone => "zone",
            WaveStrategy::Cluster => "cluster",
        }
    }
}

/// Event: a wave was planned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveCreated {
    pub wave_id: WaveId,
    pub strategy: WaveStrategy,
    pub total_tasks: u32,
    pub total_quantity: u32,
    pub zone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a pick task was released to a picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickCreated {
    pub task_id: TaskId,
    pub wave_id: WaveId,
    pub sku: SkuId,
    pub quantity: u32,
    pub from_location: Option<LocationId>,
    pub assigned_to: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a pick task reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickCompleted {
    pub task_id: TaskId,
    pub wave_id: WaveId,
    pub quantity: u32,
    pub accuracy: f64,
    pub duration_seconds: i64,
    pub status: TaskStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: every task of a wave is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveCompleted {
    pub wave_id: WaveId,
    pub duration_seconds: i64,
    pub productivity: WaveProductivity,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PickingEvent {
    WaveCreated(WaveCreated),
    PickCreated(PickCreated),
    PickCompleted(PickCompleted),
    WaveCompleted(WaveCompleted),
}

impl Event for PickingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PickingEvent::WaveCreated(_) => "wave.created",
            PickingEvent::PickCreated(_) => "pick.created",
            PickingEvent::PickCompleted(_) => "pick.completed",
            PickingEvent::WaveCompleted(_) => "wave.completed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PickingEvent::WaveCreated(e) => e.occurred_at,
            PickingEvent::PickCreated(e) => e.occurred_at,
            PickingEvent::PickCompleted(e) => e.occurred_at,
            PickingEvent::WaveCompleted(e) => e.occurred_at,
        }
    }
}

/// Nearest-neighbor route construction over pick tasks.
///
/// Seeds on the first task, then repeatedly appends the remaining task whose
/// location is closest to the current position. Ties keep the earlier task in
/// list order, so the route is fully deterministic. Sequence numbers are
/// assigned in visitation order, starting at 1.
pub fn sequence_nearest_neighbor(
    mut tasks: Vec<WarehouseTask>,
    distance: &dyn Fn(LocationId, LocationId) -> f64,
) -> Vec<WarehouseTask> {
    if tasks.is_empty() {
        return tasks;
    }

    let mut route = Vec::with_capacity(tasks.len());
    let mut current = tasks.remove(0);
    let mut position = current.from_location();
    current.set_sequence(1);
    route.push(current);

    while !tasks.is_empty() {
        let mut best_index = 0;
        let mut best_distance = f64::INFINITY;
        for (i, task) in tasks.iter().enumerate() {
            let d = match (position, task.from_location()) {
                (Some(from), Some(to)) => distance(from, to),
                _ => f64::INFINITY,
            };
            // Strictly-less keeps the earlier task on ties.
            if d < best_distance {
                best_distance = d;
                best_index = i;
            }
        }
        let mut next = tasks.remove(best_index);
        position = next.from_location();
        next.set_sequence(route.len() as u32 + 1);
        route.push(next);
    }

    route
}

/// Round-robin picker assignment state for a zone.
#[derive(Debug, Default)]
struct PickerPool {
    pickers: Vec<String>,
    next: usize,
}

/// Picking orchestrator: orders in, waves and pick events out.
pub struct PickingOrchestrator<B> {
    catalog: Arc<dyn CatalogRepository>,
    inventory: Arc<dyn InventoryRepository>,
    orders: Arc<dyn OrderRepository>,
    waves: Arc<dyn WaveStore>,
    tasks: Arc<dyn TaskStore>,
    bus: B,
    /// Zone pools are read-then-written; the mutex scopes the whole assignment.
    pools: Mutex<HashMap<String, PickerPool>>,
    max_concurrent_pickers: usize,
}

impl<B> PickingOrchestrator<B>
where
    B: EventBus<EventEnvelope<PickingEvent>>,
{
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        inventory: Arc<dyn InventoryRepository>,
        orders: Arc<dyn OrderRepository>,
        waves: Arc<dyn WaveStore>,
        tasks: Arc<dyn TaskStore>,
        bus: B,
    ) -> Self {
        Self {
            catalog,
            inventory,
            orders,
            waves,
            tasks,
            bus,
            pools: Mutex::new(HashMap::new()),
            max_concurrent_pickers: 5,
        }
    }

    pub fn with_max_concurrent_pickers(mut self, max: usize) -> Self {
        self.max_concurrent_pickers = max.max(1);
        self
    }

    /// Register the picker pool for a zone (replaces any previous pool).
    pub fn register_pickers(&self, zone: impl Into<String>, pickers: Vec<String>) {
        let mut pools = self.pools.lock().unwrap();
        pools.insert(
            zone.into(),
            PickerPool {
                pickers,
                next: 0,
            },
        );
    }

    /// Build a wave from order lines and available inventory.
    ///
    /// Lines are expanded against stock at storage locations (zone-filtered
    /// when `zone` is given), splitting across locations as needed. A line
    /// with no available stock at all fails the wave with
    /// `NoSuitableLocation`.
    pub fn create_wave(
        &self,
        tenant_id: TenantId,
        order_ids: &[OrderId],
        strategy: WaveStrategy,
        zone: Option<&str>,
    ) -> DomainResult<Wave> {
        if order_ids.is_empty() {
            return Err(DomainError::validation("a wave needs at least one order"));
        }

        let locations: Vec<Location> = match zone {
            Some(z) => self.catalog.locations_in_zone(z),
            None => self.catalog.all_locations(),
        };
        let candidates: Vec<&Location> = locations
            .iter()
            .filter(|l| l.physical_type().is_storage() && l.can_accept_assignments())
            .collect();
        let location_index: HashMap<LocationId, &Location> =
            candidates.iter().map(|l| (l.id_typed(), *l)).collect();

        let now = Utc::now();
        let mut tasks: Vec<WarehouseTask> = Vec::new();
        for order_id in order_ids {
            let lines = self
                .orders
                .order_lines(*order_id)
                .ok_or(DomainError::NotFound)?;

            for line in &lines {
                let sku = self.catalog.sku(line.sku).ok_or(DomainError::NotFound)?;
                let mut remaining = line.quantity;

                for location in &candidates {
                    if remaining == 0 {
                        break;
                    }
                    let on_hand: u32 = self
                        .inventory
                        .available(line.sku, location.id_typed())
                        .iter()
                        .map(|l| l.quantity)
                        .sum();
                    let take = remaining.min(on_hand);
                    if take == 0 {
                        continue;
                    }

                    let priority = Priority::default().plus(match sku.abc_class() {
                        stockflow_catalog::AbcClass::A => 3,
                        stockflow_catalog::AbcClass::B => 1,
                        stockflow_catalog::AbcClass::C => 0,
                    });
                    let task = WarehouseTask::new(
                        TaskId::new(AggregateId::new()),
                        TaskKind::Pick,
                        SourceDocument::Order(order_id.0),
                        line.sku,
                        take,
                        priority,
                        strategy.as_str(),
                        now,
                    )?
                    .with_route(Some(location.id_typed()), None);
                    tasks.push(task);
                    remaining -= take;
                }

                if remaining == line.quantity {
                    return Err(DomainError::no_suitable_location(format!(
                        "no available inventory for {} x{}",
                        sku.code(),
                        line.quantity
                    )));
                }
                if remaining > 0 {
                    debug!(sku = sku.code(), short = remaining, "line only partially covered");
                }
            }
        }

        let tasks = self.group_tasks(tasks, strategy, &location_index);

        let total_quantity: u32 = tasks.iter().map(WarehouseTask::quantity_requested).sum();
        let priority = mean_priority(&tasks);
        let wave_zone = majority_zone(&tasks, &location_index);
        let wave = Wave::new(
            WaveId::new(AggregateId::new()),
            strategy.as_str(),
            wave_zone,
            priority,
            tasks.iter().map(WarehouseTask::id_typed).collect(),
            total_quantity,
            now,
        )?;

        for task in tasks {
            self.tasks.insert(task)?;
        }
        self.waves.insert(wave.clone())?;

        self.publish(
            tenant_id,
            wave.id_typed().0,
            PickingEvent::WaveCreated(WaveCreated {
                wave_id: wave.id_typed(),
                strategy,
                total_tasks: wave.total_tasks(),
                total_quantity,
                zone: wave.zone().map(str::to_string),
                occurred_at: now,
            }),
        )?;

        info!(
            wave = %wave.id_typed(),
            strategy = strategy.as_str(),
            tasks = wave.total_tasks(),
            "wave created"
        );
        Ok(wave)
    }

    /// Release a planned wave: assign pickers round-robin and announce tasks.
    pub fn release_wave(&self, tenant_id: TenantId, wave_id: WaveId) -> DomainResult<Wave> {
        let mut wave = self.waves.get(wave_id).ok_or(DomainError::NotFound)?;
        let read_version = wave.version();
        let now = Utc::now();
        wave.release(now)?;

        let assignments = self.assign_pickers(wave.zone(), wave.task_ids().len());

        for (i, task_id) in wave.task_ids().to_vec().into_iter().enumerate() {
            let picker = assignments.get(i).cloned();
            let task = self.tasks.with_task_mut(task_id, &mut |t| {
                if let Some(p) = &picker {
                    t.assign(p.clone());
                }
                Ok(())
            })?;

            self.publish(
                tenant_id,
                wave_id.0,
                PickingEvent::PickCreated(PickCreated {
                    task_id,
                    wave_id,
                    sku: task.sku(),
                    quantity: task.quantity_requested(),
                    from_location: task.from_location(),
                    assigned_to: task.assigned_to().map(str::to_string),
                    occurred_at: now,
                }),
            )?;
        }

        self.waves
            .update(wave.clone(), ExpectedVersion::Exact(read_version))?;
        info!(wave = %wave_id, "wave released");
        Ok(wave)
    }

    /// Start a pick task (wave moves to in-progress on the first start).
    pub fn start_task(&self, task_id: TaskId) -> DomainResult<WarehouseTask> {
        let now = Utc::now();
        let task = self
            .tasks
            .with_task_mut(task_id, &mut |t| t.start(now))?;

        let mut wave = self
            .waves
            .find_by_task(task_id)
            .ok_or(DomainError::NotFound)?;
        let read_version = wave.version();
        wave.note_started()?;
        self.waves
            .update(wave, ExpectedVersion::Exact(read_version))?;
        Ok(task)
    }

    /// Complete a pick task and roll progress up into the wave.
    ///
    /// Outcome statuses (`Short`, `Damaged`) are returned, not raised. When
    /// the last task goes terminal the wave completes exactly once and the
    /// completion event carries the derived productivity.
    pub fn complete_task(
        &self,
        tenant_id: TenantId,
        task_id: TaskId,
        picked_quantity: u32,
        quality_ok: bool,
    ) -> DomainResult<WarehouseTask> {
        let now = Utc::now();
        let task = self.tasks.with_task_mut(task_id, &mut |t| {
            t.complete(picked_quantity, quality_ok, now).map(|_| ())
        })?;

        let wave = self
            .waves
            .find_by_task(task_id)
            .ok_or(DomainError::NotFound)?;

        self.publish(
            tenant_id,
            wave.id_typed().0,
            PickingEvent::PickCompleted(PickCompleted {
                task_id,
                wave_id: wave.id_typed(),
                quantity: task.quantity_fulfilled(),
                accuracy: task.accuracy(),
                duration_seconds: task.duration().map_or(0, |d| d.num_seconds()),
                status: task.status(),
                occurred_at: now,
            }),
        )?;

        self.roll_up_wave(tenant_id, wave, now)?;
        Ok(task)
    }

    /// Cancel a pick task: frozen, not reverted; counts as terminal for wave
    /// progress so the wave can still finish.
    pub fn cancel_task(&self, tenant_id: TenantId, task_id: TaskId) -> DomainResult<WarehouseTask> {
        let now = Utc::now();
        let task = self
            .tasks
            .with_task_mut(task_id, &mut |t| t.cancel(now))?;

        let wave = self
            .waves
            .find_by_task(task_id)
            .ok_or(DomainError::NotFound)?;
        self.roll_up_wave(tenant_id, wave, now)?;
        Ok(task)
    }

    fn roll_up_wave(
        &self,
        tenant_id: TenantId,
        mut wave: Wave,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let read_version = wave.version();

        let mut terminal = 0u32;
        let mut picked = 0u32;
        for id in wave.task_ids() {
            let task = self.tasks.get(*id).ok_or(DomainError::NotFound)?;
            if task.is_terminal() {
                terminal += 1;
                picked += task.quantity_fulfilled();
            }
        }
        wave.record_progress(terminal, picked);

        if wave.try_complete(now) {
            let productivity = *wave.productivity().ok_or_else(|| {
                DomainError::invariant("completed wave must carry productivity")
            })?;
            self.publish(
                tenant_id,
                wave.id_typed().0,
                PickingEvent::WaveCompleted(WaveCompleted {
                    wave_id: wave.id_typed(),
                    duration_seconds: wave.actual_duration().map_or(0, |d| d.num_seconds()),
                    productivity,
                    occurred_at: now,
                }),
            )?;
            info!(wave = %wave.id_typed(), "wave completed");
        }

        self.waves
            .update(wave, ExpectedVersion::Exact(read_version))
    }

    fn group_tasks(
        &self,
        tasks: Vec<WarehouseTask>,
        strategy: WaveStrategy,
        locations: &HashMap<LocationId, &Location>,
    ) -> Vec<WarehouseTask> {
        match strategy {
            WaveStrategy::Batch => batch_tasks(tasks),
            WaveStrategy::Zone => zone_sort(tasks, locations),
            WaveStrategy::Cluster => {
                let catalog = Arc::clone(&self.catalog);
                sequence_nearest_neighbor(tasks, &move |from, to| {
                    catalog.distance(from, to).unwrap_or(f64::INFINITY)
                })
            }
        }
    }

    fn assign_pickers(&self, zone: Option<&str>, task_count: usize) -> Vec<String> {
        let mut pools = self.pools.lock().unwrap();
        let Some(pool) = pools.get_mut(zone.unwrap_or("default")) else {
            return Vec::new();
        };
        if pool.pickers.is_empty() {
            return Vec::new();
        }

        let active = pool.pickers.len().min(self.max_concurrent_pickers);
        let mut assignments = Vec::with_capacity(task_count);
        for i in 0..task_count {
            assignments.push(pool.pickers[(pool.next + i) % active].clone());
        }
        pool.next = (pool.next + task_count) % active;
        assignments
    }

    fn publish(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        event: PickingEvent,
    ) -> DomainResult<()> {
        self.bus
            .publish(EventEnvelope::wrap(tenant_id, aggregate_id, "wave", event))
            .map_err(|e| DomainError::conflict(format!("event publication failed: {e:?}")))
    }
}

/// Merge pending tasks sharing a (SKU, location) pair, summing quantities.
fn batch_tasks(tasks: Vec<WarehouseTask>) -> Vec<WarehouseTask> {
    let mut merged: Vec<WarehouseTask> = Vec::with_capacity(tasks.len());
    for task in tasks {
        let slot = merged
            .iter()
            .position(|t| t.sku() == task.sku() && t.from_location() == task.from_location());
        let absorbed = match slot {
            Some(i) => merged[i].absorb(&task).is_ok(),
            None => false,
        };
        if !absorbed {
            merged.push(task);
        }
    }
    merged
}

/// Sort tasks by zone, then by distance from the zone's start point (the
/// lowest-coded location in the zone stands in for the conceptual start).
fn zone_sort(
    mut tasks: Vec<WarehouseTask>,
    locations: &HashMap<LocationId, &Location>,
) -> Vec<WarehouseTask> {
    let mut zone_starts: HashMap<String, &Location> = HashMap::new();
    for loc in locations.values().copied() {
        zone_starts
            .entry(loc.zone().to_string())
            .and_modify(|start| {
                if loc.code() < start.code() {
                    *start = loc;
                }
            })
            .or_insert(loc);
    }

    let sort_key = |task: &WarehouseTask| -> (String, f64) {
        let Some(loc) = task
            .from_location()
            .and_then(|id| locations.get(&id).copied())
        else {
            return (String::from("~"), f64::INFINITY);
        };
        let distance = zone_starts
            .get(loc.zone())
            .map_or(0.0, |start| start.distance_to(loc));
        (loc.zone().to_string(), distance)
    };

    tasks.sort_by(|a, b| {
        let (za, da) = sort_key(a);
        let (zb, db) = sort_key(b);
        za.cmp(&zb)
            .then(da.partial_cmp(&db).unwrap_or(core::cmp::Ordering::Equal))
    });
    for (i, task) in tasks.iter_mut().enumerate() {
        task.set_sequence(i as u32 + 1);
    }
    tasks
}

/// Rounded mean priority across tasks.
fn mean_priority(tasks: &[WarehouseTask]) -> Priority {
    if tasks.is_empty() {
        return Priority::default();
    }
    let sum: u32 = tasks.iter().map(|t| u32::from(t.priority().value())).sum();
    let mean = (sum as f64 / tasks.len() as f64).round() as u8;
    Priority::new(mean)
}

/// Majority zone among task source locations (lexical tie-break).
fn majority_zone(
    tasks: &[WarehouseTask],
    locations: &HashMap<LocationId, &Location>,
) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for task in tasks {
        if let Some(loc) = task.from_location().and_then(|id| locations.get(&id)) {
            *counts.entry(loc.zone()).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|(za, ca), (zb, cb)| ca.cmp(cb).then(zb.cmp(za)))
        .map(|(zone, _)| zone.to_string())
}
