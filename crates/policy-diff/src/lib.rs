//! Change detection and field-level diff reporting for cluster network policies.
//!
//! Each resource kind runs through the same chain:
//! [`classify`](classify::classify) drops re-synced objects whose revision did not move,
//! [`diff`](differ::diff) compares the tracked fields of the kind,
//! and [`Reporter`](report::Reporter) writes the result to a [`LogSink`](report::LogSink).
//! [`Pipeline`](pipeline::Pipeline) wires the three together for one kind.

pub mod classify;
pub mod differ;
pub mod kinds;
pub mod pipeline;
pub mod report;
pub mod snapshot;

pub use classify::{classify, ChangeEvent};
pub use differ::{diff, evaluate, FieldDiff, Layout, TrackedField};
pub use kinds::{
	EgressDestination, EgressPolicyRule, EgressPolicySpec, EgressRuleType, NetworkPolicySpec,
	PodSelector, PolicySpec, PolicyType, ResourceEvent,
};
pub use pipeline::{LifecycleEvent, Pipeline, Pipelines};
pub use report::{LogSink, ReportRecord, Reporter, TracingSink};
pub use snapshot::{ResourceSnapshot, Revision, SnapshotError, REASON_FOR_CHANGE};
