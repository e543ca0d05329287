//! ABC (value) and XYZ (demand variability) classification.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use stockflow_catalog::{AbcClass, SkuId, VelocityClass};

/// Input: one SKU's trailing-twelve-month usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualUsage {
    pub sku: SkuId,
    pub annual_units: u32,
    /// Annual consumption value in minor currency units.
    pub annual_value: u64,
}

/// Output of [`classify_abc`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbcRecord {
    pub sku: SkuId,
    pub class: AbcClass,
    pub annual_value: u64,
    /// Cumulative share of total annual value, percent.
    pub cumulative_pct: f64,
    pub count_frequency_per_year: u32,
    pub next_due: DateTime<Utc>,
}

/// Input: one SKU's trailing-period demand series plus forecast accuracy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandHistory {
    pub sku: SkuId,
    /// Demand per trailing period (e.g. weekly buckets).
    pub demand: Vec<f64>,
    /// Forecast accuracy in [0, 1].
    pub forecast_accuracy: f64,
}

/// Output of [`classify_xyz`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XyzRecord {
    pub sku: SkuId,
    pub class: VelocityClass,
    /// Coefficient of variation of the demand series.
    pub coefficient_of_variation: f64,
    pub count_frequency_per_year: u32,
}

/// Pareto classification by annual value.
///
/// SKUs are sorted by descending annual value; class A while the cumulative
/// share of total value stays at or below 80%, B up to 95%, C beyond. The
/// next-due date offsets `now` by a full year divided by the class frequency.
pub fn classify_abc(items: &[AnnualUsage], now: DateTime<Utc>) -> Vec<AbcRecord> {
    let mut sorted: Vec<&AnnualUsage> = items.iter().collect();
    sorted.sort_by(|a, b| b.annual_value.cmp(&a.annual_value).then(a.sku.cmp(&b.sku)));

    let total: u64 = sorted.iter().map(|i| i.annual_value).sum();
    let mut cumulative = 0u64;
    let mut records = Vec::with_capacity(sorted.len());
    for item in sorted {
        cumulative += item.annual_value;
        let cumulative_pct = if total == 0 {
            100.0
        } else {
            cumulative as f64 / total as f64 * 100.0
        };
        let class = if cumulative_pct <= 80.0 {
            AbcClass::A
        } else if cumulative_pct <= 95.0 {
            AbcClass::B
        } else {
            AbcClass::C
        };
        let frequency = class.count_frequency_per_year();
        records.push(AbcRecord {
            sku: item.sku,
            class,
            annual_value: item.annual_value,
            cumulative_pct,
            count_frequency_per_year: frequency,
            next_due: now + Duration::days(i64::from(365 / frequency)),
        });
    }
    records
}

/// Demand-variability classification.
///
/// The coefficient of variation is the population standard deviation of the
/// demand series over its mean. Zero-mean demand is treated as infinitely
/// variable and lands in class Z regardless of forecast accuracy.
pub fn classify_xyz(items: &[DemandHistory]) -> Vec<XyzRecord> {
    items
        .iter()
        .map(|item| {
            let m = mean(&item.demand);
            let cv = if m <= f64::EPSILON {
                f64::INFINITY
            } else {
                stddev_population(&item.demand, m) / m
            };
            let class = if cv <= 0.5 && item.forecast_accuracy >= 0.8 {
                VelocityClass::X
            } else if cv <= 1.0 && item.forecast_accuracy >= 0.6 {
                VelocityClass::Y
            } else {
                VelocityClass::Z
            };
            XyzRecord {
                sku: item.sku,
                class,
                coefficient_of_variation: cv,
                count_frequency_per_year: class.count_frequency_per_year(),
            }
        })
        .collect()
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / (xs.len() as f64)
}

/// Population standard deviation (n), deterministic.
fn stddev_population(xs: &[f64], mean: f64) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let var = xs
        .iter()
        .map(|x| {
            let d = x - mean;
            d * d
        })
        .sum::<f64>()
        / (xs.len() as f64);
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockflow_core::AggregateId;

    fn usage(annual_value: u64) -> AnnualUsage {
        AnnualUsage {
            sku: SkuId::new(AggregateId::new()),
            annual_units: 100,
            annual_value,
        }
    }

    #[test]
    fn abc_pareto_boundaries() {
        // Cumulative shares: 60%, 90%, 100%.
        let items = vec![usage(600), usage(300), usage(100)];
        let records = classify_abc(&items, Utc::now());

        let classes: Vec<AbcClass> = records.iter().map(|r| r.class).collect();
        assert_eq!(classes, vec![AbcClass::A, AbcClass::B, AbcClass::C]);
        assert_eq!(records[0].count_frequency_per_year, 12);
        assert_eq!(records[2].count_frequency_per_year, 2);
    }

    #[test]
    fn abc_exactly_eighty_percent_is_still_class_a() {
        let items = vec![usage(800), usage(150), usage(50)];
        let records = classify_abc(&items, Utc::now());
        assert_eq!(records[0].class, AbcClass::A);
        assert_eq!(records[1].class, AbcClass::B);
        assert_eq!(records[2].class, AbcClass::C);
    }

    #[test]
    fn abc_next_due_tracks_class_frequency() {
        let now = Utc::now();
        let records = classify_abc(&[usage(1000)], now);
        // Single SKU holds 100% of value: class C, twice a year.
        assert_eq!(records[0].class, AbcClass::C);
        assert_eq!(records[0].next_due, now + Duration::days(182));
    }

    #[test]
    fn xyz_thresholds() {
        let steady = DemandHistory {
            sku: SkuId::new(AggregateId::new()),
            demand: vec![10.0, 10.0, 10.0, 10.0],
            forecast_accuracy: 0.9,
        };
        let moderate = DemandHistory {
            sku: SkuId::new(AggregateId::new()),
            demand: vec![2.0, 10.0, 4.0, 12.0],
            forecast_accuracy: 0.7,
        };
        let erratic = DemandHistory {
            sku: SkuId::new(AggregateId::new()),
            demand: vec![0.0, 40.0, 0.0, 1.0],
            forecast_accuracy: 0.9,
        };

        let records = classify_xyz(&[steady, moderate, erratic]);
        assert_eq!(records[0].class, VelocityClass::X);
        assert_eq!(records[1].class, VelocityClass::Y);
        assert_eq!(records[2].class, VelocityClass::Z);
    }

    #[test]
    fn steady_demand_with_poor_forecast_is_not_x() {
        let records = classify_xyz(&[DemandHistory {
            sku: SkuId::new(AggregateId::new()),
            demand: vec![10.0, 10.0, 10.0],
            forecast_accuracy: 0.7,
        }]);
        assert_eq!(records[0].class, VelocityClass::Y);
    }

    #[test]
    fn zero_mean_demand_is_class_z() {
        let records = classify_xyz(&[DemandHistory {
            sku: SkuId::new(AggregateId::new()),
            demand: vec![0.0, 0.0, 0.0],
            forecast_accuracy: 1.0,
        }]);
        assert_eq!(records[0].class, VelocityClass::Z);
        assert!(records[0].coefficient_of_variation.is_infinite());
    }
}
