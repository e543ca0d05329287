use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{AggregateId, DomainError, DomainResult, Entity, ValueObject};

/// Location identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub AggregateId);

impl LocationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LocationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Physical role of a location in the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicalType {
    Pick,
    Reserve,
    Bulk,
    Qc,
    Dock,
    Yard,
    Staging,
    Returns,
}

impl PhysicalType {
    /// Whether stock can be put away here (docks, yards, staging and QC/returns
    /// lanes hold stock only transiently).
    pub fn is_storage(&self) -> bool {
        matches!(self, PhysicalType::Pick | PhysicalType::Reserve | PhysicalType::Bulk)
    }
}

/// Capacity limits for a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityLimits {
    pub max_quantity: u32,
    pub max_weight_kg: f64,
    pub max_volume_m3: f64,
    /// Unit label for `max_quantity` (e.g. "ea", "case", "pallet").
    pub unit: String,
}

impl ValueObject for CapacityLimits {}

/// Physical dimensions (meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_m: f64,
    pub width_m: f64,
    pub height_m: f64,
}

impl ValueObject for Dimensions {}

/// Position on the warehouse floor plan (meters from origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinates {
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl ValueObject for Coordinates {}

/// Temperature band a controlled location can hold (°C).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRange {
    pub min_c: f64,
    pub max_c: f64,
}

impl TemperatureRange {
    /// Whether this range fully covers `[min_c, max_c]`.
    pub fn covers(&self, min_c: f64, max_c: f64) -> bool {
        self.min_c <= min_c && self.max_c >= max_c
    }
}

impl ValueObject for TemperatureRange {}

/// Conventional distance when one side has no surveyed coordinates.
///
/// Large enough to lose every ranking against a surveyed location, finite so
/// scores stay comparable.
pub const UNSURVEYED_DISTANCE: f64 = 1_000.0;

/// Entity: warehouse Location.
///
/// Created at warehouse setup; mutated by block/unblock, capacity updates and
/// count timestamps; never hard-deleted (deactivated instead).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
    code: String,
    physical_type: PhysicalType,
    zone: String,
    capacity: CapacityLimits,
    dimensions: Option<Dimensions>,
    coordinates: Option<Coordinates>,
    temperature_controlled: bool,
    temperature_range: Option<TemperatureRange>,
    hazmat_allowed: bool,
    active: bool,
    blocked: bool,
    block_reason: Option<String>,
    last_counted_at: Option<DateTime<Utc>>,
}

impl Location {
    pub fn new(
        id: LocationId,
        code: impl Into<String>,
        physical_type: PhysicalType,
        zone: impl Into<String>,
        capacity: CapacityLimits,
    ) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("location code cannot be empty"));
        }
        Ok(Self {
            id,
            code,
            physical_type,
            zone: zone.into(),
            capacity,
            dimensions: None,
            coordinates: None,
            temperature_controlled: false,
            temperature_range: None,
            hazmat_allowed: false,
            active: true,
            blocked: false,
            block_reason: None,
            last_counted_at: None,
        })
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_coordinates(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_temperature_range(mut self, range: TemperatureRange) -> Self {
        self.temperature_controlled = true;
        self.temperature_range = Some(range);
        self
    }

    pub fn with_hazmat_allowed(mut self, allowed: bool) -> Self {
        self.hazmat_allowed = allowed;
        self
    }

    pub fn id_typed(&self) -> LocationId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.physical_type
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn capacity(&self) -> &CapacityLimits {
        &self.capacity
    }

    pub fn dimensions(&self) -> Option<&Dimensions> {
        self.dimensions.as_ref()
    }

    pub fn coordinates(&self) -> Option<&Coordinates> {
        self.coordinates.as_ref()
    }

    pub fn is_temperature_controlled(&self) -> bool {
        self.temperature_controlled
    }

    pub fn temperature_range(&self) -> Option<&TemperatureRange> {
        self.temperature_range.as_ref()
    }

    pub fn hazmat_allowed(&self) -> bool {
        self.hazmat_allowed
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn block_reason(&self) -> Option<&str> {
        self.block_reason.as_deref()
    }

    pub fn last_counted_at(&self) -> Option<DateTime<Utc>> {
        self.last_counted_at
    }

    /// A blocked or inactive location may not receive new assignments.
    pub fn can_accept_assignments(&self) -> bool {
        self.active && !self.blocked
    }

    pub fn block(&mut self, reason: impl Into<String>) {
        self.blocked = true;
        self.block_reason = Some(reason.into());
    }

    pub fn unblock(&mut self) {
        self.blocked = false;
        self.block_reason = None;
    }

    /// Soft delete: the location stays in the catalog for history.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn update_capacity(&mut self, capacity: CapacityLimits) -> DomainResult<()> {
        if capacity.max_quantity == 0 {
            return Err(DomainError::validation("max_quantity must be positive"));
        }
        self.capacity = capacity;
        Ok(())
    }

    pub fn record_count(&mut self, at: DateTime<Utc>) {
        self.last_counted_at = Some(at);
    }

    /// Euclidean travel distance between two locations.
    ///
    /// Locations without surveyed coordinates sit at [`UNSURVEYED_DISTANCE`].
    pub fn distance_to(&self, other: &Location) -> f64 {
        match (&self.coordinates, &other.coordinates) {
            (Some(a), Some(b)) => a.distance_to(b),
            _ => UNSURVEYED_DISTANCE,
        }
    }
}

impl Entity for Location {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_capacity() -> CapacityLimits {
        CapacityLimits {
            max_quantity: 100,
            max_weight_kg: 500.0,
            max_volume_m3: 2.0,
            unit: "ea".to_string(),
        }
    }

    fn test_location(code: &str) -> Location {
        Location::new(
            LocationId::new(AggregateId::new()),
            code,
            PhysicalType::Pick,
            "A",
            test_capacity(),
        )
        .unwrap()
    }

    #[test]
    fn empty_code_is_rejected() {
        let err = Location::new(
            LocationId::new(AggregateId::new()),
            "  ",
            PhysicalType::Pick,
            "A",
            test_capacity(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn blocked_location_cannot_accept_assignments() {
        let mut loc = test_location("A-01-01");
        assert!(loc.can_accept_assignments());

        loc.block("damaged racking");
        assert!(!loc.can_accept_assignments());
        assert_eq!(loc.block_reason(), Some("damaged racking"));

        loc.unblock();
        assert!(loc.can_accept_assignments());
    }

    #[test]
    fn deactivated_location_cannot_accept_assignments() {
        let mut loc = test_location("A-01-02");
        loc.deactivate();
        assert!(!loc.can_accept_assignments());
        assert!(!loc.is_active());
    }

    #[test]
    fn distance_uses_coordinates_when_both_surveyed() {
        let a = test_location("A-01-01").with_coordinates(Coordinates { x: 0.0, y: 0.0, z: 0.0 });
        let b = test_location("A-01-02").with_coordinates(Coordinates { x: 3.0, y: 4.0, z: 0.0 });
        assert_eq!(a.distance_to(&b), 5.0);
    }

    #[test]
    fn distance_falls_back_for_unsurveyed_locations() {
        let a = test_location("A-01-01").with_coordinates(Coordinates { x: 0.0, y: 0.0, z: 0.0 });
        let b = test_location("YARD-1");
        assert_eq!(a.distance_to(&b), UNSURVEYED_DISTANCE);
    }

    #[test]
    fn capacity_update_rejects_zero_quantity() {
        let mut loc = test_location("A-01-01");
        let err = loc
            .update_capacity(CapacityLimits {
                max_quantity: 0,
                max_weight_kg: 1.0,
                max_volume_m3: 1.0,
                unit: "ea".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
