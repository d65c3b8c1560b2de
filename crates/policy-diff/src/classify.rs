//! Decides whether an update notification carries a real content change.

use crate::snapshot::ResourceSnapshot;

/// An update whose revision moved, ready to be diffed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<S> {
	pub namespace: String,
	pub name: String,
	pub old: ResourceSnapshot<S>,
	pub new: ResourceSnapshot<S>,
}

/// Classify an update notification.
///
/// Returns `None` when both snapshots carry the same revision: the stream
/// source re-delivers unchanged objects whenever it re-lists, and those must
/// not be reported again.
///
/// Revisions are only compared for inequality. If the source ever delivers an
/// older snapshot after a newer one, the step back is reported as a change.
pub fn classify<S>(old: ResourceSnapshot<S>, new: ResourceSnapshot<S>) -> Option<ChangeEvent<S>> {
	if old.revision == new.revision {
		return None;
	}

	Some(ChangeEvent {
		namespace: new.namespace.clone(),
		name: new.name.clone(),
		old,
		new,
	})
}
