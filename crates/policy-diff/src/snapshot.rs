//! Point-in-time views of policy objects.

use std::{collections::BTreeMap, fmt};

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Annotation carrying the operator-supplied reason for a policy change.
pub const REASON_FOR_CHANGE: &str = "ReasonForChange";

/// Errors that can occur when building a snapshot from an API object.
#[derive(Debug, Error)]
pub enum SnapshotError {
	#[error("serializing {kind} object")]
	Serialize {
		kind: &'static str,
		#[source]
		source: serde_json::Error,
	},

	#[error("{kind} object has an unexpected shape")]
	Shape {
		kind: &'static str,
		#[source]
		source: serde_json::Error,
	},
}

/// Opaque per-object revision marker (`metadata.resourceVersion`).
///
/// The API server only guarantees that the value changes whenever the stored
/// object changes, so revisions are compared for equality and never ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Revision {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Revision {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

/// An immutable view of one policy object, as delivered by the stream source.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSnapshot<S> {
	pub name: String,
	pub namespace: String,
	pub revision: Revision,
	pub annotations: BTreeMap<String, String>,
	pub spec: S,
}

/// Subset of the API object layout a snapshot is read from.
#[derive(Deserialize)]
#[serde(bound(deserialize = "S: Deserialize<'de> + Default"))]
struct RawObject<S> {
	#[serde(default, deserialize_with = "nullable")]
	metadata: RawMetadata,
	#[serde(default, deserialize_with = "nullable")]
	spec: S,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
	#[serde(default, deserialize_with = "nullable")]
	name: String,
	#[serde(default, deserialize_with = "nullable")]
	namespace: String,
	#[serde(default, deserialize_with = "nullable")]
	resource_version: Revision,
	#[serde(default, deserialize_with = "nullable")]
	annotations: BTreeMap<String, String>,
}

impl<S> ResourceSnapshot<S>
where
	S: DeserializeOwned + Default,
{
	/// Build a snapshot from any serializable API object (typed or dynamic).
	pub fn from_resource<K: Serialize>(kind: &'static str, object: &K) -> Result<Self, SnapshotError> {
		let value =
			serde_json::to_value(object).map_err(|source| SnapshotError::Serialize { kind, source })?;
		Self::from_value(kind, value)
	}

	/// Build a snapshot from the JSON form of an API object.
	///
	/// Absent or `null` fields are read as empty values.
	pub fn from_value(kind: &'static str, value: serde_json::Value) -> Result<Self, SnapshotError> {
		let raw: RawObject<S> =
			serde_json::from_value(value).map_err(|source| SnapshotError::Shape { kind, source })?;
		Ok(Self {
			name: raw.metadata.name,
			namespace: raw.metadata.namespace,
			revision: raw.metadata.resource_version,
			annotations: raw.metadata.annotations,
			spec: raw.spec,
		})
	}
}

impl<S> ResourceSnapshot<S> {
	/// Value of the `ReasonForChange` annotation, empty when unset.
	pub fn reason_for_change(&self) -> &str {
		self.annotations
			.get(REASON_FOR_CHANGE)
			.map_or("", String::as_str)
	}
}

/// Deserialize a field, reading an explicit `null` as the type's default.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de> + Default,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;
	use crate::kinds::{EgressPolicySpec, NetworkPolicySpec};

	#[test]
	fn test_from_value_reads_metadata() {
		let snapshot = ResourceSnapshot::<NetworkPolicySpec>::from_value(
			"NetworkPolicy",
			json!({
				"apiVersion": "networking.k8s.io/v1",
				"kind": "NetworkPolicy",
				"metadata": {
					"name": "allow-web",
					"namespace": "shop",
					"resourceVersion": "4711",
					"annotations": { "ReasonForChange": "initial" }
				},
				"spec": { "podSelector": { "matchLabels": { "app": "web" } } }
			}),
		)
		.expect("valid snapshot");

		assert_eq!(snapshot.name, "allow-web");
		assert_eq!(snapshot.namespace, "shop");
		assert_eq!(snapshot.revision, Revision::from("4711"));
		assert_eq!(snapshot.reason_for_change(), "initial");
		assert_eq!(
			snapshot.spec.pod_selector.match_labels.get("app").map(String::as_str),
			Some("web")
		);
	}

	#[test]
	fn test_missing_fields_read_as_empty() {
		let snapshot = ResourceSnapshot::<NetworkPolicySpec>::from_value(
			"NetworkPolicy",
			json!({
				"metadata": { "name": "bare", "annotations": null },
				"spec": null
			}),
		)
		.expect("valid snapshot");

		assert_eq!(snapshot.namespace, "");
		assert_eq!(snapshot.revision, Revision::default());
		assert_eq!(snapshot.reason_for_change(), "");
		assert_eq!(snapshot.spec, NetworkPolicySpec::default());
	}

	#[test]
	fn test_wrong_shape_is_an_error() {
		let result = ResourceSnapshot::<EgressPolicySpec>::from_value(
			"EgressNetworkPolicy",
			json!({
				"metadata": { "name": "egress", "namespace": "shop" },
				"spec": { "egress": "not-a-list" }
			}),
		);

		assert_matches!(
			result,
			Err(SnapshotError::Shape {
				kind: "EgressNetworkPolicy",
				..
			})
		);
	}
}
