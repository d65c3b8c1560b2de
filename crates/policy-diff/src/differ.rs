//! Field-level comparison of two snapshots of the same object.

use std::fmt;

use serde::Serialize;

use crate::{
	classify::ChangeEvent,
	kinds::PolicySpec,
	snapshot::{ResourceSnapshot, REASON_FOR_CHANGE},
};

/// How a field's renderings are laid out in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
	/// The old and new values each render as a single block.
	Inline,

	/// The old and new values each render as a list, one entry per line.
	Lines,
}

/// Describes one field the differ knows how to compare and render.
pub struct TrackedField<S> {
	label: &'static str,
	layout: Layout,
	changed: fn(&ResourceSnapshot<S>, &ResourceSnapshot<S>) -> bool,
	render: fn(&ResourceSnapshot<S>) -> String,
}

impl<S> TrackedField<S> {
	pub const fn new(
		label: &'static str,
		layout: Layout,
		changed: fn(&ResourceSnapshot<S>, &ResourceSnapshot<S>) -> bool,
		render: fn(&ResourceSnapshot<S>) -> String,
	) -> Self {
		Self {
			label,
			layout,
			changed,
			render,
		}
	}

	/// The `ReasonForChange` annotation, shared by every policy kind.
	pub const fn reason_for_change() -> Self {
		Self::new(
			REASON_FOR_CHANGE,
			Layout::Inline,
			reason_for_change_changed::<S>,
			render_reason_for_change::<S>,
		)
	}

	pub fn label(&self) -> &'static str {
		self.label
	}

	/// Compare this field between two snapshots.
	///
	/// Renderings are only produced for fields that changed.
	pub fn compare(&self, old: &ResourceSnapshot<S>, new: &ResourceSnapshot<S>) -> FieldDiff {
		let changed = (self.changed)(old, new);
		let (old_rendering, new_rendering) = if changed {
			((self.render)(old), (self.render)(new))
		} else {
			(String::new(), String::new())
		};

		FieldDiff {
			field: self.label,
			changed,
			old_rendering,
			new_rendering,
			layout: self.layout,
		}
	}
}

impl<S> fmt::Debug for TrackedField<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TrackedField")
			.field("label", &self.label)
			.field("layout", &self.layout)
			.finish_non_exhaustive()
	}
}

/// Result of comparing one tracked field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff {
	/// Human-readable field label.
	pub field: &'static str,
	pub changed: bool,
	pub old_rendering: String,
	pub new_rendering: String,
	pub layout: Layout,
}

/// Compare every tracked field of the kind, in tracked order.
pub fn evaluate<S: PolicySpec>(event: &ChangeEvent<S>) -> Vec<FieldDiff> {
	S::TRACKED_FIELDS
		.iter()
		.map(|field| field.compare(&event.old, &event.new))
		.collect()
}

/// Compare every tracked field and keep only the ones that changed.
pub fn diff<S: PolicySpec>(event: &ChangeEvent<S>) -> Vec<FieldDiff> {
	evaluate(event)
		.into_iter()
		.filter(|field| field.changed)
		.collect()
}

/// Render a structured value as compact JSON.
pub(crate) fn render_json<T: Serialize + ?Sized>(value: &T) -> String {
	serde_json::to_string(value).unwrap_or_else(|e| format!("<unrenderable: {e}>"))
}

/// Render a list one entry per line.
pub(crate) fn render_lines<T: fmt::Display>(items: &[T]) -> String {
	items
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join("\n")
}

fn reason_for_change_changed<S>(old: &ResourceSnapshot<S>, new: &ResourceSnapshot<S>) -> bool {
	old.reason_for_change() != new.reason_for_change()
}

/// Annotation values may span lines; each report record must stay on one.
fn render_reason_for_change<S>(snapshot: &ResourceSnapshot<S>) -> String {
	let value = snapshot.reason_for_change();
	let mut rendered = String::with_capacity(value.len());
	for c in value.chars() {
		if c.is_control() {
			rendered.extend(c.escape_default());
		} else {
			rendered.push(c);
		}
	}
	rendered
}
