//! Cycle counting: ABC/XYZ classification, schedules, counts, variances.

pub mod classification;
pub mod count;
pub mod policy;
pub mod schedule;
pub mod scheduler;
pub mod store;

pub use classification::{
    AbcRecord, AnnualUsage, DemandHistory, XyzRecord, classify_abc, classify_xyz,
};
pub use count::{
    CountId, CountItem, CountItemStatus, CountResult, CycleCount, CycleCountStatus,
};
pub use policy::{CountPolicy, PolicyId, Tolerance};
pub use schedule::{CountPair, CycleCountSchedule, ScheduleId, ScheduleStatus};
pub use scheduler::{
    CycleCountCompleted, CycleCountCreated, CycleCountEvent, CycleCountScheduler, Discrepancy,
};
pub use store::{
    CountStore, InMemoryCountStore, InMemoryPolicyStore, InMemoryScheduleStore, PolicyStore,
    ScheduleStore,
};
