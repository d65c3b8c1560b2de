//! The two watched policy kinds and the fields tracked for each.

use std::{
	collections::{BTreeMap, BTreeSet},
	fmt,
};

use k8s_openapi::api::networking::v1::{NetworkPolicyEgressRule, NetworkPolicyIngressRule};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
	differ::{render_json, render_lines, Layout, TrackedField},
	pipeline::LifecycleEvent,
	snapshot::{nullable, ResourceSnapshot},
};

/// A policy spec shape the pipeline can diff.
pub trait PolicySpec: DeserializeOwned + Default + 'static {
	/// Kind name used in reports.
	const KIND: &'static str;

	/// Fields compared on every update, in report order.
	const TRACKED_FIELDS: &'static [TrackedField<Self>];
}

/// A lifecycle event tagged with the kind of policy it carries.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
	NetworkPolicy(LifecycleEvent<NetworkPolicySpec>),
	EgressPolicy(LifecycleEvent<EgressPolicySpec>),
}

impl From<LifecycleEvent<NetworkPolicySpec>> for ResourceEvent {
	fn from(event: LifecycleEvent<NetworkPolicySpec>) -> Self {
		ResourceEvent::NetworkPolicy(event)
	}
}

impl From<LifecycleEvent<EgressPolicySpec>> for ResourceEvent {
	fn from(event: LifecycleEvent<EgressPolicySpec>) -> Self {
		ResourceEvent::EgressPolicy(event)
	}
}

/// Spec of a Kubernetes `networking.k8s.io/v1` NetworkPolicy.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicySpec {
	#[serde(default, deserialize_with = "nullable")]
	pub pod_selector: PodSelector,
	#[serde(default, deserialize_with = "nullable")]
	pub ingress: Vec<NetworkPolicyIngressRule>,
	#[serde(default, deserialize_with = "nullable")]
	pub egress: Vec<NetworkPolicyEgressRule>,
	#[serde(default, deserialize_with = "nullable")]
	pub policy_types: BTreeSet<PolicyType>,
}

/// Pods a NetworkPolicy applies to, by exact label match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSelector {
	#[serde(default, deserialize_with = "nullable")]
	pub match_labels: BTreeMap<String, String>,
}

impl<const N: usize> From<[(&str, &str); N]> for PodSelector {
	fn from(labels: [(&str, &str); N]) -> Self {
		Self {
			match_labels: labels
				.into_iter()
				.map(|(k, v)| (k.to_string(), v.to_string()))
				.collect(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum PolicyType {
	Ingress,
	Egress,
}

impl fmt::Display for PolicyType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PolicyType::Ingress => write!(f, "Ingress"),
			PolicyType::Egress => write!(f, "Egress"),
		}
	}
}

impl PolicySpec for NetworkPolicySpec {
	const KIND: &'static str = "NetworkPolicy";

	const TRACKED_FIELDS: &'static [TrackedField<Self>] = &[
		TrackedField::reason_for_change(),
		TrackedField::new(
			"PodSelector",
			Layout::Inline,
			|old, new| old.spec.pod_selector != new.spec.pod_selector,
			|s| render_json(&s.spec.pod_selector.match_labels),
		),
		TrackedField::new(
			"Ingress Rules",
			Layout::Inline,
			|old, new| old.spec.ingress != new.spec.ingress,
			|s| render_json(&s.spec.ingress),
		),
		TrackedField::new(
			"Egress Rules",
			Layout::Inline,
			|old, new| old.spec.egress != new.spec.egress,
			|s| render_json(&s.spec.egress),
		),
		TrackedField::new(
			"PolicyTypes",
			Layout::Inline,
			|old, new| old.spec.policy_types != new.spec.policy_types,
			|s| render_json(&s.spec.policy_types),
		),
	];
}

/// Spec of an OpenShift `network.openshift.io/v1` EgressNetworkPolicy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EgressPolicySpec {
	#[serde(default, deserialize_with = "nullable")]
	pub egress: Vec<EgressPolicyRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EgressPolicyRule {
	#[serde(rename = "type")]
	pub rule_type: EgressRuleType,
	#[serde(default, deserialize_with = "nullable")]
	pub to: EgressDestination,
}

impl fmt::Display for EgressPolicyRule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.to, self.rule_type)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EgressRuleType {
	Allow,
	Deny,
}

impl fmt::Display for EgressRuleType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EgressRuleType::Allow => write!(f, "Allow"),
			EgressRuleType::Deny => write!(f, "Deny"),
		}
	}
}

/// Where an egress rule applies: a CIDR block or a DNS name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EgressDestination {
	#[serde(default, deserialize_with = "nullable")]
	pub cidr_selector: String,
	#[serde(default, deserialize_with = "nullable")]
	pub dns_name: String,
}

impl fmt::Display for EgressDestination {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.cidr_selector.is_empty() {
			f.write_str(&self.dns_name)
		} else {
			f.write_str(&self.cidr_selector)
		}
	}
}

impl PolicySpec for EgressPolicySpec {
	const KIND: &'static str = "EgressNetworkPolicy";

	const TRACKED_FIELDS: &'static [TrackedField<Self>] = &[
		TrackedField::reason_for_change(),
		TrackedField::new(
			"Egress Rules",
			Layout::Lines,
			|old, new| old.spec.egress != new.spec.egress,
			|s| render_lines(&s.spec.egress),
		),
	];
}

/// Convenience for callers holding only a snapshot.
impl<S: PolicySpec> ResourceSnapshot<S> {
	pub fn kind(&self) -> &'static str {
		S::KIND
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	#[rstest]
	#[case::cidr(json!({"type": "Deny", "to": {"cidrSelector": "10.0.0.0/8"}}), "10.0.0.0/8: Deny")]
	#[case::dns(json!({"type": "Allow", "to": {"dnsName": "example.com"}}), "example.com: Allow")]
	#[case::cidr_wins(
		json!({"type": "Allow", "to": {"cidrSelector": "0.0.0.0/0", "dnsName": "example.com"}}),
		"0.0.0.0/0: Allow"
	)]
	#[case::no_destination(json!({"type": "Deny"}), ": Deny")]
	fn test_egress_rule_display(#[case] rule: serde_json::Value, #[case] expected: &str) {
		let rule: EgressPolicyRule = serde_json::from_value(rule).expect("valid rule");
		assert_eq!(rule.to_string(), expected);
	}

	#[test]
	fn test_network_policy_spec_from_api_shape() {
		let spec: NetworkPolicySpec = serde_json::from_value(json!({
			"podSelector": {
				"matchLabels": { "app": "web" },
				"matchExpressions": [{ "key": "tier", "operator": "Exists" }]
			},
			"ingress": [{ "from": [{ "ipBlock": { "cidr": "10.0.0.0/8" } }] }],
			"policyTypes": ["Ingress", "Egress", "Ingress"]
		}))
		.expect("valid spec");

		assert_eq!(spec.pod_selector, PodSelector::from([("app", "web")]));
		assert_eq!(spec.ingress.len(), 1);
		assert!(spec.egress.is_empty());
		assert_eq!(
			spec.policy_types,
			BTreeSet::from([PolicyType::Ingress, PolicyType::Egress])
		);
	}

	#[test]
	fn test_tracked_field_labels() {
		let network: Vec<_> = NetworkPolicySpec::TRACKED_FIELDS
			.iter()
			.map(TrackedField::label)
			.collect();
		assert_eq!(
			network,
			vec![
				"ReasonForChange",
				"PodSelector",
				"Ingress Rules",
				"Egress Rules",
				"PolicyTypes"
			]
		);

		let egress: Vec<_> = EgressPolicySpec::TRACKED_FIELDS
			.iter()
			.map(TrackedField::label)
			.collect();
		assert_eq!(egress, vec!["ReasonForChange", "Egress Rules"]);
	}
}
