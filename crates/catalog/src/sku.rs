use serde::{Deserialize, Serialize};

use stockflow_core::{AggregateId, DomainError, DomainResult, Entity, ValueObject};

use crate::location::Location;

/// SKU identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkuId(pub AggregateId);

impl SkuId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SkuId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Validated GTIN (Global Trade Item Number).
///
/// Accepts GTIN-8/12/13/14; the trailing digit must be a valid GS1 mod-10 check
/// digit (weights 3/1 alternating from the right).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gtin(String);

impl Gtin {
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if !matches!(value.len(), 8 | 12 | 13 | 14) {
            return Err(DomainError::validation(format!(
                "GTIN must be 8, 12, 13 or 14 digits, got {} characters",
                value.len()
            )));
        }
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::validation("GTIN must be numeric"));
        }

        let digits: Vec<u32> = value.bytes().map(|b| u32::from(b - b'0')).collect();
        let (data, check) = digits.split_at(digits.len() - 1);
        if Self::check_digit(data) != check[0] {
            return Err(DomainError::validation(format!(
                "GTIN {value} has an invalid check digit"
            )));
        }

        Ok(Self(value))
    }

    /// GS1 mod-10 check digit over the data digits (check digit excluded).
    pub fn check_digit(data: &[u32]) -> u32 {
        let sum: u32 = data
            .iter()
            .rev()
            .enumerate()
            .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
            .sum();
        (10 - sum % 10) % 10
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Gtin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ValueObject for Gtin {}

/// Storage temperature zone for a SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureZone {
    Ambient,
    Chilled,
    Frozen,
}

impl TemperatureZone {
    /// Storage band (°C) that a controlled location must cover.
    pub fn band(&self) -> (f64, f64) {
        match self {
            TemperatureZone::Ambient => (10.0, 30.0),
            TemperatureZone::Chilled => (0.0, 8.0),
            TemperatureZone::Frozen => (-30.0, -18.0),
        }
    }
}

/// Value-based inventory segmentation (Pareto 80/95/100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AbcClass {
    A,
    B,
    C,
}

impl AbcClass {
    /// Cycle counts per year for this class.
    pub fn count_frequency_per_year(&self) -> u32 {
        match self {
            AbcClass::A => 12,
            AbcClass::B => 6,
            AbcClass::C => 2,
        }
    }
}

/// Demand-variability segmentation (X stable → Z erratic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VelocityClass {
    X,
    Y,
    Z,
}

impl VelocityClass {
    /// Cycle counts per year for this class.
    pub fn count_frequency_per_year(&self) -> u32 {
        match self {
            VelocityClass::X => 4,
            VelocityClass::Y => 6,
            VelocityClass::Z => 12,
        }
    }
}

/// Replenishment parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderParameters {
    pub reorder_point: u32,
    pub reorder_quantity: u32,
}

impl ValueObject for ReorderParameters {}

/// Entity: stock keeping unit.
///
/// Created/updated by catalog maintenance; `abc_class`/`velocity_class` are
/// mutated by the cycle-count classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sku {
    id: SkuId,
    code: String,
    gtin: Gtin,
    temperature_zone: TemperatureZone,
    hazmat: bool,
    hazmat_class: Option<String>,
    abc_class: AbcClass,
    velocity_class: VelocityClass,
    serial_tracked: bool,
    lot_tracked: bool,
    reorder: ReorderParameters,
    unit_weight_kg: f64,
    unit_volume_m3: f64,
    /// Unit value in the smallest currency unit (e.g. cents).
    unit_value: u64,
}

impl Sku {
    pub fn new(id: SkuId, code: impl Into<String>, gtin: Gtin) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("SKU code cannot be empty"));
        }
        Ok(Self {
            id,
            code,
            gtin,
            temperature_zone: TemperatureZone::Ambient,
            hazmat: false,
            hazmat_class: None,
            abc_class: AbcClass::C,
            velocity_class: VelocityClass::Z,
            serial_tracked: false,
            lot_tracked: false,
            reorder: ReorderParameters {
                reorder_point: 0,
                reorder_quantity: 0,
            },
            unit_weight_kg: 0.0,
            unit_volume_m3: 0.0,
            unit_value: 0,
        })
    }

    pub fn with_temperature_zone(mut self, zone: TemperatureZone) -> Self {
        self.temperature_zone = zone;
        self
    }

    pub fn with_hazmat(mut self, class: impl Into<String>) -> Self {
        self.hazmat = true;
        self.hazmat_class = Some(class.into());
        self
    }

    pub fn with_classes(mut self, abc: AbcClass, velocity: VelocityClass) -> Self {
        self.abc_class = abc;
        self.velocity_class = velocity;
        self
    }

    pub fn with_tracking(mut self, serial: bool, lot: bool) -> Self {
        self.serial_tracked = serial;
        self.lot_tracked = lot;
        self
    }

    pub fn with_reorder(mut self, reorder: ReorderParameters) -> Self {
        self.reorder = reorder;
        self
    }

    pub fn with_unit_measures(mut self, weight_kg: f64, volume_m3: f64, value: u64) -> Self {
        self.unit_weight_kg = weight_kg;
        self.unit_volume_m3 = volume_m3;
        self.unit_value = value;
        self
    }

    pub fn id_typed(&self) -> SkuId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn gtin(&self) -> &Gtin {
        &self.gtin
    }

    pub fn temperature_zone(&self) -> TemperatureZone {
        self.temperature_zone
    }

    pub fn is_hazmat(&self) -> bool {
        self.hazmat
    }

    pub fn hazmat_class(&self) -> Option<&str> {
        self.hazmat_class.as_deref()
    }

    pub fn abc_class(&self) -> AbcClass {
        self.abc_class
    }

    pub fn velocity_class(&self) -> VelocityClass {
        self.velocity_class
    }

    pub fn is_serial_tracked(&self) -> bool {
        self.serial_tracked
    }

    pub fn is_lot_tracked(&self) -> bool {
        self.lot_tracked
    }

    pub fn reorder(&self) -> ReorderParameters {
        self.reorder
    }

    pub fn unit_weight_kg(&self) -> f64 {
        self.unit_weight_kg
    }

    pub fn unit_volume_m3(&self) -> f64 {
        self.unit_volume_m3
    }

    pub fn unit_value(&self) -> u64 {
        self.unit_value
    }

    pub fn set_abc_class(&mut self, class: AbcClass) {
        self.abc_class = class;
    }

    pub fn set_velocity_class(&mut self, class: VelocityClass) {
        self.velocity_class = class;
    }

    /// Whether this SKU may be stored at `location`.
    ///
    /// Requires temperature-zone compatibility and, for hazmat SKUs, an
    /// explicitly hazmat-allowed location. Blocked/inactive filtering is a
    /// separate concern ([`Location::can_accept_assignments`]).
    pub fn can_store_at(&self, location: &Location) -> bool {
        if self.hazmat && !location.hazmat_allowed() {
            return false;
        }
        self.temperature_compatible(location)
    }

    fn temperature_compatible(&self, location: &Location) -> bool {
        match self.temperature_zone {
            // Ambient goods go anywhere whose range covers the ambient band,
            // including plain uncontrolled locations.
            TemperatureZone::Ambient => {
                if !location.is_temperature_controlled() {
                    return true;
                }
                let (min, max) = self.temperature_zone.band();
                location
                    .temperature_range()
                    .is_some_and(|r| r.covers(min, max))
            }
            TemperatureZone::Chilled | TemperatureZone::Frozen => {
                let (min, max) = self.temperature_zone.band();
                location.is_temperature_controlled()
                    && location
                        .temperature_range()
                        .is_some_and(|r| r.covers(min, max))
            }
        }
    }
}

impl Entity for Sku {
    type Id = SkuId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{CapacityLimits, LocationId, PhysicalType, TemperatureRange};
    use proptest::prelude::*;

    fn test_sku(code: &str) -> Sku {
        Sku::new(
            SkuId::new(AggregateId::new()),
            code,
            Gtin::new("00012345600012").unwrap(),
        )
        .unwrap()
    }

    fn test_location() -> Location {
        Location::new(
            LocationId::new(AggregateId::new()),
            "A-01-01",
            PhysicalType::Pick,
            "A",
            CapacityLimits {
                max_quantity: 100,
                max_weight_kg: 500.0,
                max_volume_m3: 2.0,
                unit: "ea".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn valid_gtins_are_accepted() {
        // Known-good GS1 examples across lengths.
        for gtin in ["96385074", "036000291452", "4006381333931", "00012345600012"] {
            assert!(Gtin::new(gtin).is_ok(), "expected {gtin} to be valid");
        }
    }

    #[test]
    fn bad_check_digit_is_rejected() {
        let err = Gtin::new("4006381333932").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn non_numeric_and_bad_length_are_rejected() {
        assert!(Gtin::new("40063813339").is_err());
        assert!(Gtin::new("40063813339AB").is_err());
    }

    #[test]
    fn hazmat_sku_requires_hazmat_location() {
        let sku = test_sku("FLAM-01").with_hazmat("3");
        let plain = test_location();
        let hazmat_ok = test_location().with_hazmat_allowed(true);

        assert!(!sku.can_store_at(&plain));
        assert!(sku.can_store_at(&hazmat_ok));
    }

    #[test]
    fn frozen_sku_requires_covering_temperature_range() {
        let sku = test_sku("ICE-01").with_temperature_zone(TemperatureZone::Frozen);

        let uncontrolled = test_location();
        assert!(!sku.can_store_at(&uncontrolled));

        let freezer = test_location().with_temperature_range(TemperatureRange {
            min_c: -35.0,
            max_c: -15.0,
        });
        assert!(sku.can_store_at(&freezer));

        let chiller = test_location().with_temperature_range(TemperatureRange {
            min_c: 0.0,
            max_c: 8.0,
        });
        assert!(!sku.can_store_at(&chiller));
    }

    #[test]
    fn ambient_sku_rejects_freezer() {
        let sku = test_sku("DRY-01");
        let freezer = test_location().with_temperature_range(TemperatureRange {
            min_c: -35.0,
            max_c: -15.0,
        });
        assert!(!sku.can_store_at(&freezer));
        assert!(sku.can_store_at(&test_location()));
    }

    #[test]
    fn count_frequencies_follow_classes() {
        assert_eq!(AbcClass::A.count_frequency_per_year(), 12);
        assert_eq!(AbcClass::B.count_frequency_per_year(), 6);
        assert_eq!(AbcClass::C.count_frequency_per_year(), 2);
        assert_eq!(VelocityClass::X.count_frequency_per_year(), 4);
        assert_eq!(VelocityClass::Y.count_frequency_per_year(), 6);
        assert_eq!(VelocityClass::Z.count_frequency_per_year(), 12);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: a GTIN completed with its computed check digit validates.
        #[test]
        fn computed_check_digit_round_trips(data in proptest::collection::vec(0u32..10, 13)) {
            let check = Gtin::check_digit(&data);
            let full: String = data
                .iter()
                .chain(core::iter::once(&check))
                .map(|d| char::from_digit(*d, 10).unwrap())
                .collect();
            prop_assert!(Gtin::new(full).is_ok());
        }
    }
}
