use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use stockflow_catalog::{
    CatalogRepository, InventoryRepository, Location, PhysicalType, Sku, VelocityClass,
};
use stockflow_core::{AggregateId, DomainError, DomainResult, TenantId};
use stockflow_events::{Event, EventBus, EventEnvelope};
use stockflow_tasks::{Priority, SourceDocument, TaskId, TaskKind, WarehouseTask};

use crate::ports::{ReceiptId, ReceiptRepository};

/// Placement strategy for inbound stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PutawayStrategy {
    /// Fast movers near the pick face, penalized by dock distance.
    Velocity,
    /// Zone matched to the SKU's ABC class.
    Abc,
    /// Temperature-compatible locations ranked by dock distance.
    TempZone,
    /// Hazmat-allowed locations ranked by staging distance.
    Hazmat,
}

impl PutawayStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PutawayStrategy::Velocity => "velocity",
            PutawayStrategy::Abc => "abc",
            PutawayStrategy::TempZone => "temp_zone",
            PutawayStrategy::Hazmat => "hazmat",
        }
    }
}

/// Event: a putaway plan was produced for a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutawayPlanned {
    pub asn_id: ReceiptId,
    pub tasks: Vec<TaskId>,
    pub strategy: PutawayStrategy,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PutawayEvent {
    Planned(PutawayPlanned),
}

impl Event for PutawayEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PutawayEvent::Planned(_) => "putaway.planned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PutawayEvent::Planned(e) => e.occurred_at,
        }
    }
}

/// Linear distance penalty applied per distance unit when ranking candidates.
const DISTANCE_PENALTY_PER_UNIT: f64 = 0.1;

/// Putaway planner service.
///
/// Dependencies are injected as ports; the planner owns no state of its own and
/// every plan is a pure function of catalog + inventory + receipt, so repeated
/// planning over unchanged data is deterministic.
pub struct PutawayPlanner<B> {
    catalog: Arc<dyn CatalogRepository>,
    inventory: Arc<dyn InventoryRepository>,
    receipts: Arc<dyn ReceiptRepository>,
    bus: B,
}

impl<B> PutawayPlanner<B>
where
    B: EventBus<EventEnvelope<PutawayEvent>>,
{
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        inventory: Arc<dyn InventoryRepository>,
        receipts: Arc<dyn ReceiptRepository>,
        bus: B,
    ) -> Self {
        Self {
            catalog,
            inventory,
            receipts,
            bus,
        }
    }

    /// Plan putaway for every line of a receipt.
    ///
    /// Fails with `NotFound` for an unknown receipt and `NoSuitableLocation`
    /// when any line cannot be placed. Tasks come back priority-descending.
    pub fn plan_putaway(
        &self,
        tenant_id: TenantId,
        receipt_id: ReceiptId,
        strategy: PutawayStrategy,
    ) -> DomainResult<Vec<WarehouseTask>> {
        let receipt = self
            .receipts
            .receipt(receipt_id)
            .ok_or(DomainError::NotFound)?;

        let locations = self.catalog.all_locations();
        let dock = reference_location(&locations, PhysicalType::Dock);
        let staging = reference_location(&locations, PhysicalType::Staging);
        let now = Utc::now();

        let mut tasks = Vec::with_capacity(receipt.lines.len());
        for line in &receipt.lines {
            let sku = self.catalog.sku(line.sku).ok_or(DomainError::NotFound)?;

            let best = locations
                .iter()
                .filter(|loc| loc.physical_type().is_storage())
                .filter(|loc| loc.can_accept_assignments())
                .filter(|loc| sku.can_store_at(loc))
                .filter(|loc| match strategy {
                    PutawayStrategy::Hazmat => loc.hazmat_allowed(),
                    _ => true,
                })
                .filter(|loc| self.inventory.remaining_capacity(loc.id_typed()) >= line.quantity)
                .fold(None::<(&Location, f64)>, |best, loc| {
                    let score = strategy_score(strategy, &sku, loc, dock, staging);
                    match best {
                        // Strictly-greater keeps ties on the earlier candidate.
                        Some((_, best_score)) if score <= best_score => best,
                        _ => Some((loc, score)),
                    }
                });

            let Some((target, score)) = best else {
                return Err(DomainError::no_suitable_location(format!(
                    "no location can take {} x{} under the {} strategy",
                    sku.code(),
                    line.quantity,
                    strategy.as_str()
                )));
            };

            debug!(
                sku = sku.code(),
                location = target.code(),
                score,
                "putaway candidate selected"
            );

            let task = WarehouseTask::new(
                TaskId::new(AggregateId::new()),
                TaskKind::Putaway,
                SourceDocument::Asn(receipt_id.0),
                sku.id_typed(),
                line.quantity,
                task_priority(strategy, &sku),
                strategy.as_str(),
                now,
            )?
            .with_route(dock.map(Location::id_typed), Some(target.id_typed()))
            .with_estimated_minutes(estimated_minutes(line.quantity, sku.is_hazmat()));

            tasks.push(task);
        }

        tasks.sort_by(|a, b| b.priority().cmp(&a.priority()));

        let event = PutawayEvent::Planned(PutawayPlanned {
            asn_id: receipt_id,
            tasks: tasks.iter().map(WarehouseTask::id_typed).collect(),
            strategy,
            occurred_at: now,
        });
        self.bus
            .publish(EventEnvelope::wrap(tenant_id, receipt_id.0, "receipt", event))
            .map_err(|e| DomainError::conflict(format!("event publication failed: {e:?}")))?;

        info!(
            receipt = %receipt_id,
            strategy = strategy.as_str(),
            tasks = tasks.len(),
            "putaway planned"
        );

        Ok(tasks)
    }
}

/// First active location of the given type, by code order.
fn reference_location(locations: &[Location], physical_type: PhysicalType) -> Option<&Location> {
    locations
        .iter()
        .find(|l| l.physical_type() == physical_type && l.is_active())
}

fn dock_distance(loc: &Location, dock: Option<&Location>) -> f64 {
    dock.map_or(0.0, |d| loc.distance_to(d))
}

fn strategy_score(
    strategy: PutawayStrategy,
    sku: &Sku,
    loc: &Location,
    dock: Option<&Location>,
    staging: Option<&Location>,
) -> f64 {
    match strategy {
        PutawayStrategy::Velocity => {
            let mut score = 0.0;
            if sku.velocity_class() == VelocityClass::X {
                if loc.physical_type() == PhysicalType::Pick {
                    score += 50.0;
                }
                if loc.zone() == "A" {
                    score += 25.0;
                }
            }
            score - DISTANCE_PENALTY_PER_UNIT * dock_distance(loc, dock)
        }
        PutawayStrategy::Abc => {
            let zone_score = match (sku.abc_class(), loc.zone()) {
                (stockflow_catalog::AbcClass::A, "A") => 100.0,
                (stockflow_catalog::AbcClass::B, "B") => 75.0,
                (stockflow_catalog::AbcClass::C, "C") => 50.0,
                _ => 0.0,
            };
            zone_score - DISTANCE_PENALTY_PER_UNIT * dock_distance(loc, dock)
        }
        // Compatibility is a hard filter; rank by travel only.
        PutawayStrategy::TempZone => -dock_distance(loc, dock),
        PutawayStrategy::Hazmat => -staging.map_or(0.0, |s| loc.distance_to(s)),
    }
}

fn task_priority(strategy: PutawayStrategy, sku: &Sku) -> Priority {
    let base = Priority::default();
    let bonus = match strategy {
        PutawayStrategy::Velocity if sku.velocity_class() == VelocityClass::X => 3,
        PutawayStrategy::Velocity => 0,
        PutawayStrategy::Abc => match sku.abc_class() {
            stockflow_catalog::AbcClass::A => 3,
            stockflow_catalog::AbcClass::B => 1,
            stockflow_catalog::AbcClass::C => 0,
        },
        PutawayStrategy::TempZone => {
            if sku.temperature_zone() == stockflow_catalog::TemperatureZone::Ambient {
                0
            } else {
                2
            }
        }
        PutawayStrategy::Hazmat => 5,
    };
    base.plus(bonus)
}

/// Base 2 minutes + 1 minute per started block of 10 units, ×1.5 for hazmat.
fn estimated_minutes(quantity: u32, hazmat: bool) -> u32 {
    let minutes = 2 + quantity.div_ceil(10);
    if hazmat { (minutes * 3).div_ceil(2) } else { minutes }
}
