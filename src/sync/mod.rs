//! One-way mirroring engine.
//!
//! The comparator classifies every path under both trees, the reconciler
//! applies the classification, a cycle wraps both with precondition checks,
//! and the scheduler repeats cycles on an interval.

pub mod compare;
pub mod cycle;
pub mod reconcile;
pub mod scheduler;

pub use compare::{Classification, CommonEntry, EntryStatus, TreeComparator};
pub use cycle::SyncCycle;
pub use reconcile::{Reconciler, SyncResult};
pub use scheduler::{Scheduler, SchedulerState};
