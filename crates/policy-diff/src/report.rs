//! Turns lifecycle notices and field diffs into log records.

use std::fmt;

use crate::{
	classify::ChangeEvent,
	differ::{FieldDiff, Layout},
	kinds::PolicySpec,
	snapshot::{ResourceSnapshot, Revision},
};

/// One human-readable report line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
	pub kind: &'static str,
	pub namespace: String,
	pub name: String,
	pub revision: Revision,
	/// Label of the tracked field this line is about, if any.
	pub field: Option<&'static str>,
	pub message: String,
}

impl fmt::Display for ReportRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} {}/{}: {}",
			self.kind, self.namespace, self.name, self.message
		)
	}
}

/// Destination for report records.
pub trait LogSink {
	fn emit(&mut self, record: ReportRecord);
}

/// Collects records in memory.
impl LogSink for Vec<ReportRecord> {
	fn emit(&mut self, record: ReportRecord) {
		self.push(record);
	}
}

/// Writes every record as an INFO `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
	fn emit(&mut self, record: ReportRecord) {
		tracing::info!(
			kind = record.kind,
			namespace = %record.namespace,
			name = %record.name,
			revision = record.revision.as_str(),
			field = record.field,
			"{}",
			record,
		);
	}
}

/// Formats lifecycle notices and field diffs for one sink.
#[derive(Debug, Default)]
pub struct Reporter<L> {
	sink: L,
}

impl<L: LogSink> Reporter<L> {
	pub fn new(sink: L) -> Self {
		Self { sink }
	}

	pub fn sink(&self) -> &L {
		&self.sink
	}

	pub fn into_sink(self) -> L {
		self.sink
	}

	/// Report a newly observed object.
	pub fn added<S: PolicySpec>(&mut self, snapshot: &ResourceSnapshot<S>) {
		self.notice(snapshot, "added");
	}

	/// Report a removed object.
	pub fn deleted<S: PolicySpec>(&mut self, snapshot: &ResourceSnapshot<S>) {
		self.notice(snapshot, "deleted");
	}

	/// Report the diffs computed for a change event.
	///
	/// When no tracked field changed, a single summary line with the new
	/// revision is written instead.
	pub fn report<S: PolicySpec>(&mut self, event: &ChangeEvent<S>, diffs: &[FieldDiff]) {
		let changed: Vec<_> = diffs.iter().filter(|d| d.changed).collect();
		if changed.is_empty() {
			let message = format!(
				"updated to revision {} without tracked field changes",
				event.new.revision
			);
			self.sink.emit(record(event, None, message));
			return;
		}

		for diff in changed {
			match diff.layout {
				Layout::Inline => {
					let message = format!(
						"{} has changed from {} to {}",
						diff.field, diff.old_rendering, diff.new_rendering
					);
					self.sink.emit(record(event, Some(diff.field), message));
				}
				Layout::Lines => {
					self.sink.emit(record(
						event,
						Some(diff.field),
						format!("{} has changed from:", diff.field),
					));
					for line in diff.old_rendering.lines() {
						self.sink
							.emit(record(event, Some(diff.field), line.to_string()));
					}
					self.sink.emit(record(
						event,
						Some(diff.field),
						format!("{} has changed to:", diff.field),
					));
					for line in diff.new_rendering.lines() {
						self.sink
							.emit(record(event, Some(diff.field), line.to_string()));
					}
				}
			}
		}
	}

	fn notice<S: PolicySpec>(&mut self, snapshot: &ResourceSnapshot<S>, what: &str) {
		self.sink.emit(ReportRecord {
			kind: snapshot.kind(),
			namespace: snapshot.namespace.clone(),
			name: snapshot.name.clone(),
			revision: snapshot.revision.clone(),
			field: None,
			message: what.to_string(),
		});
	}
}

fn record<S: PolicySpec>(
	event: &ChangeEvent<S>,
	field: Option<&'static str>,
	message: String,
) -> ReportRecord {
	ReportRecord {
		kind: event.new.kind(),
		namespace: event.namespace.clone(),
		name: event.name.clone(),
		revision: event.new.revision.clone(),
		field,
		message,
	}
}
