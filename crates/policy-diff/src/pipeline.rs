//! Classifier → differ → reporter chain for one resource kind.

use std::marker::PhantomData;

use tracing::trace;

use crate::{
	classify::classify,
	differ::diff,
	kinds::{EgressPolicySpec, NetworkPolicySpec, PolicySpec, ResourceEvent},
	report::{LogSink, Reporter},
	snapshot::ResourceSnapshot,
};

/// A notification delivered by the resource stream source.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent<S> {
	Added(ResourceSnapshot<S>),
	Updated {
		old: ResourceSnapshot<S>,
		new: ResourceSnapshot<S>,
	},
	Deleted(ResourceSnapshot<S>),
}

impl<S> LifecycleEvent<S> {
	/// The most recent snapshot carried by the event.
	pub fn snapshot(&self) -> &ResourceSnapshot<S> {
		match self {
			LifecycleEvent::Added(s) | LifecycleEvent::Deleted(s) => s,
			LifecycleEvent::Updated { new, .. } => new,
		}
	}
}

/// Handles the events of one resource kind, one at a time.
///
/// Holds no state besides its sink, so two pipelines never need to coordinate.
pub struct Pipeline<S, L> {
	reporter: Reporter<L>,
	_spec: PhantomData<fn() -> S>,
}

impl<S: PolicySpec, L: LogSink> Pipeline<S, L> {
	pub fn new(sink: L) -> Self {
		Self {
			reporter: Reporter::new(sink),
			_spec: PhantomData,
		}
	}

	pub fn handle(&mut self, event: LifecycleEvent<S>) {
		match event {
			LifecycleEvent::Added(snapshot) => self.reporter.added(&snapshot),
			LifecycleEvent::Deleted(snapshot) => self.reporter.deleted(&snapshot),
			LifecycleEvent::Updated { old, new } => {
				trace!(
					kind = S::KIND,
					namespace = %new.namespace,
					name = %new.name,
					old_revision = %old.revision,
					new_revision = %new.revision,
					"update observed"
				);
				if let Some(change) = classify(old, new) {
					let diffs = diff(&change);
					self.reporter.report(&change, &diffs);
				}
			}
		}
	}

	pub fn sink(&self) -> &L {
		self.reporter.sink()
	}

	pub fn into_sink(self) -> L {
		self.reporter.into_sink()
	}
}

/// Both policy pipelines side by side, for callers that receive tagged events
/// on a single task.
pub struct Pipelines<L> {
	pub network: Pipeline<NetworkPolicySpec, L>,
	pub egress: Pipeline<EgressPolicySpec, L>,
}

impl<L: LogSink> Pipelines<L> {
	pub fn new(network_sink: L, egress_sink: L) -> Self {
		Self {
			network: Pipeline::new(network_sink),
			egress: Pipeline::new(egress_sink),
		}
	}

	pub fn handle(&mut self, event: ResourceEvent) {
		match event {
			ResourceEvent::NetworkPolicy(event) => self.network.handle(event),
			ResourceEvent::EgressPolicy(event) => self.egress.handle(event),
		}
	}
}
