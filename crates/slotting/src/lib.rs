//! Slotting optimization: scored, expiring relocation recommendations.

pub mod optimizer;

pub use optimizer::{SlottingEvent, SlottingOptimizer, SlottingRecommendation, SlottingUpdated};
