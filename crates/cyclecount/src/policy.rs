use serde::{Deserialize, Serialize};

use stockflow_core::{AggregateId, DomainError, DomainResult, Entity, ValueObject};

/// Count policy identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(pub AggregateId);

impl PolicyId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Allowed variance before a count item is flagged, percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub quantity_pct: f64,
    pub value_pct: f64,
}

impl ValueObject for Tolerance {}

/// How often and how thoroughly a warehouse counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountPolicy {
    id: PolicyId,
    name: String,
    /// Days between count occurrences.
    frequency_days: u32,
    /// Share of due pairs sampled per occurrence, in (0, 100].
    coverage_pct: f64,
    tolerance: Tolerance,
    /// Issue inventory adjustments for variances automatically.
    auto_adjust: bool,
}

impl CountPolicy {
    pub fn new(
        id: PolicyId,
        name: impl Into<String>,
        frequency_days: u32,
        coverage_pct: f64,
        tolerance: Tolerance,
        auto_adjust: bool,
    ) -> DomainResult<Self> {
        if frequency_days == 0 {
            return Err(DomainError::validation("frequency_days must be positive"));
        }
        if !(coverage_pct > 0.0 && coverage_pct <= 100.0) {
            return Err(DomainError::validation(format!(
                "coverage_pct must be in (0, 100], got {coverage_pct}"
            )));
        }
        if tolerance.quantity_pct < 0.0 || tolerance.value_pct < 0.0 {
            return Err(DomainError::validation("tolerance cannot be negative"));
        }
        Ok(Self {
            id,
            name: name.into(),
            frequency_days,
            coverage_pct,
            tolerance,
            auto_adjust,
        })
    }

    pub fn id_typed(&self) -> PolicyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frequency_days(&self) -> u32 {
        self.frequency_days
    }

    pub fn coverage_pct(&self) -> f64 {
        self.coverage_pct
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    pub fn auto_adjust(&self) -> bool {
        self.auto_adjust
    }
}

impl Entity for CountPolicy {
    type Id = PolicyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
