//! Reconciliation of local records against the remote system
//!
//! A run has four phases. Fetch reads the remote state, compute evaluates
//! every record, apply writes the differences, and cleanup deletes hosts the
//! account owns but no longer exports.

mod apply;
mod batch;
mod cleanup;
mod compute;
mod engine;
mod fetch;
mod plan;
mod report;

pub use apply::{Applied, Applier};
pub use batch::chunks;
pub use cleanup::{candidates, cleanup};
pub use compute::compute;
pub use engine::{Reconciler, RunOptions};
pub use fetch::{RemoteState, fetch};
pub use plan::{ClusterPlan, HostDiff, HostPlan, SyncPlan};
pub use report::{Detail, DetailLevel, SyncCounts, SyncReport};
