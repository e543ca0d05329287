use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_catalog::{Dimensions, Gtin, SkuId};
use stockflow_core::{AggregateId, DomainError, DomainResult, Entity, ValueObject};
use stockflow_tasks::{SourceDocument, TaskId};

/// Package identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(pub AggregateId);

impl PackageId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PackageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// GS1 company prefix used for all generated container codes.
const COMPANY_PREFIX: &str = "0614141";

/// SSCC-style container code: extension digit + company prefix + serial
/// reference + check digit, 18 digits total.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerCode(String);

impl ContainerCode {
    /// Build a code from a serial reference (truncated to 9 digits).
    pub fn generate(serial_ref: u64) -> Self {
        let body = format!("0{COMPANY_PREFIX}{:09}", serial_ref % 1_000_000_000);
        let check = Self::check_digit(&body);
        Self(format!("{body}{check}"))
    }

    /// Parse and validate an existing 18-digit code.
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.len() != 18 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::validation(
                "container code must be exactly 18 digits",
            ));
        }
        let body = &value[..17];
        let check = u32::from(value.as_bytes()[17] - b'0');
        if Self::check_digit(body) != check {
            return Err(DomainError::validation(format!(
                "container code {value} has an invalid check digit"
            )));
        }
        Ok(Self(value))
    }

    /// Weighted mod-10 check digit over the 17-digit body.
    ///
    /// Digits are walked from last to first; a digit is weighted 3 when its
    /// absolute string index is even, else 1. Keyed off the absolute index
    /// rather than the position from the right, which only coincides with the
    /// conventional GS1 weighting for odd-length bodies like this one.
    fn check_digit(body: &str) -> u32 {
        let sum: u32 = body
            .bytes()
            .enumerate()
            .rev()
            .map(|(i, b)| {
                let digit = u32::from(b - b'0');
                if i % 2 == 0 { digit * 3 } else { digit }
            })
            .sum();
        (10 - sum % 10) % 10
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for ContainerCode {}

impl core::fmt::Display for ContainerCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quantity a packing task requires for one (SKU, lot, serial) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredQuantity {
    pub sku: SkuId,
    pub lot: Option<String>,
    pub serial: Option<String>,
    pub quantity: u32,
}

/// Packing work derived from the completed pick tasks of a wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingTask {
    pub id: TaskId,
    pub source: SourceDocument,
    pub required: Vec<RequiredQuantity>,
    /// Preferred carrier, when the order dictates one.
    pub carrier: Option<String>,
}

/// One item line inside a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedItem {
    pub sku: SkuId,
    pub gtin: Gtin,
    pub quantity: u32,
    pub lot: Option<String>,
    pub serial: Option<String>,
}

/// Operator input: contents and physicals of one box, before finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDraft {
    pub items: Vec<PackedItem>,
    pub weight_kg: f64,
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    ContainerCode,
    Gtin,
    Lot,
    Carrier,
}

/// Printable label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingLabel {
    pub kind: LabelKind,
    pub value: String,
}

impl ValueObject for ShippingLabel {}

/// Finalized package: contents plus container code and label set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    id: PackageId,
    container_code: ContainerCode,
    items: Vec<PackedItem>,
    weight_kg: f64,
    dimensions: Option<Dimensions>,
    labels: Vec<ShippingLabel>,
    packed_at: DateTime<Utc>,
}

impl Package {
    pub fn new(
        id: PackageId,
        container_code: ContainerCode,
        draft: PackageDraft,
        labels: Vec<ShippingLabel>,
        packed_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if draft.items.is_empty() {
            return Err(DomainError::validation("a package cannot be empty"));
        }
        Ok(Self {
            id,
            container_code,
            items: draft.items,
            weight_kg: draft.weight_kg,
            dimensions: draft.dimensions,
            labels,
            packed_at,
        })
    }

    pub fn id_typed(&self) -> PackageId {
        self.id
    }

    pub fn container_code(&self) -> &ContainerCode {
        &self.container_code
    }

    pub fn items(&self) -> &[PackedItem] {
        &self.items
    }

    pub fn weight_kg(&self) -> f64 {
        self.weight_kg
    }

    pub fn dimensions(&self) -> Option<&Dimensions> {
        self.dimensions.as_ref()
    }

    pub fn labels(&self) -> &[ShippingLabel] {
        &self.labels
    }

    pub fn packed_at(&self) -> DateTime<Utc> {
        self.packed_at
    }
}

impl Entity for Package {
    type Id = PackageId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_is_eighteen_digits_with_valid_check() {
        let code = ContainerCode::generate(1);
        assert_eq!(code.as_str(), "061414100000000014");
        assert!(ContainerCode::new(code.as_str()).is_ok());
    }

    #[test]
    fn serial_reference_is_truncated_to_nine_digits() {
        let a = ContainerCode::generate(42);
        let b = ContainerCode::generate(42 + 1_000_000_000);
        assert_eq!(a, b);
    }

    #[test]
    fn tampered_check_digit_is_rejected() {
        let code = ContainerCode::generate(7);
        let mut tampered = code.as_str().to_string();
        let last = tampered.pop().unwrap();
        let flipped = char::from_digit((last.to_digit(10).unwrap() + 1) % 10, 10).unwrap();
        tampered.push(flipped);

        let err = ContainerCode::new(tampered).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn malformed_codes_are_rejected() {
        assert!(ContainerCode::new("12345").is_err());
        assert!(ContainerCode::new("06141410000000001X").is_err());
    }

    #[test]
    fn distinct_serials_yield_distinct_codes() {
        assert_ne!(ContainerCode::generate(1), ContainerCode::generate(2));
    }
}
