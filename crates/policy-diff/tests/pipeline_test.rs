//! End-to-end tests of the classify → diff → report chain, starting from API
//! objects as the cluster returns them.

use policy_diff::{
	EgressPolicySpec, LifecycleEvent, NetworkPolicySpec, Pipeline, PolicySpec, ReportRecord,
	ResourceSnapshot, REASON_FOR_CHANGE,
};
use rstest::rstest;
use serde_json::json;

fn network_policy(revision: &str, reason: &str, spec: serde_json::Value) -> ResourceSnapshot<NetworkPolicySpec> {
	ResourceSnapshot::from_value(
		NetworkPolicySpec::KIND,
		json!({
			"apiVersion": "networking.k8s.io/v1",
			"kind": "NetworkPolicy",
			"metadata": {
				"name": "allow-web",
				"namespace": "shop",
				"resourceVersion": revision,
				"annotations": { "ReasonForChange": reason }
			},
			"spec": spec
		}),
	)
	.expect("valid NetworkPolicy")
}

fn egress_policy(revision: &str, egress: serde_json::Value) -> ResourceSnapshot<EgressPolicySpec> {
	ResourceSnapshot::from_value(
		EgressPolicySpec::KIND,
		json!({
			"apiVersion": "network.openshift.io/v1",
			"kind": "EgressNetworkPolicy",
			"metadata": {
				"name": "default",
				"namespace": "shop",
				"resourceVersion": revision
			},
			"spec": { "egress": egress }
		}),
	)
	.expect("valid EgressNetworkPolicy")
}

fn with_reason<S>(mut snapshot: ResourceSnapshot<S>, reason: &str) -> ResourceSnapshot<S> {
	snapshot
		.annotations
		.insert(REASON_FOR_CHANGE.to_string(), reason.to_string());
	snapshot
}

fn run<S: PolicySpec>(events: Vec<LifecycleEvent<S>>) -> Vec<String> {
	let mut pipeline = Pipeline::<S, _>::new(Vec::<ReportRecord>::new());
	for event in events {
		pipeline.handle(event);
	}
	pipeline
		.into_sink()
		.iter()
		.map(ToString::to_string)
		.collect()
}

#[rstest]
#[case::same_revision("5", vec![])]
#[case::new_revision(
	"6",
	vec!["NetworkPolicy shop/allow-web: ReasonForChange has changed from initial to rollout"]
)]
fn test_reason_for_change_is_revision_gated(#[case] new_revision: &str, #[case] expected: Vec<&str>) {
	let spec = json!({ "podSelector": {} });
	let lines = run(vec![LifecycleEvent::Updated {
		old: network_policy("5", "initial", spec.clone()),
		new: network_policy(new_revision, "rollout", spec),
	}]);

	assert_eq!(lines, expected);
}

#[test]
fn test_pod_selector_change_renders_full_mappings() {
	let lines = run(vec![LifecycleEvent::Updated {
		old: network_policy(
			"5",
			"initial",
			json!({ "podSelector": { "matchLabels": { "app": "web" } } }),
		),
		new: network_policy(
			"6",
			"initial",
			json!({ "podSelector": { "matchLabels": { "app": "web", "tier": "front" } } }),
		),
	}]);

	assert_eq!(
		lines,
		vec![
			r#"NetworkPolicy shop/allow-web: PodSelector has changed from {"app":"web"} to {"app":"web","tier":"front"}"#
		]
	);
}

#[test]
fn test_egress_rule_type_flip() {
	let lines = run(vec![LifecycleEvent::Updated {
		old: egress_policy(
			"40",
			json!([{ "type": "Deny", "to": { "cidrSelector": "10.0.0.0/8" } }]),
		),
		new: egress_policy(
			"41",
			json!([{ "type": "Allow", "to": { "cidrSelector": "10.0.0.0/8" } }]),
		),
	}]);

	assert_eq!(
		lines,
		vec![
			"EgressNetworkPolicy shop/default: Egress Rules has changed from:",
			"EgressNetworkPolicy shop/default: 10.0.0.0/8: Deny",
			"EgressNetworkPolicy shop/default: Egress Rules has changed to:",
			"EgressNetworkPolicy shop/default: 10.0.0.0/8: Allow",
		]
	);
}

#[test]
fn test_egress_reason_for_change_alone() {
	let rules = json!([{ "type": "Allow", "to": { "dnsName": "example.com" } }]);
	let lines = run(vec![LifecycleEvent::Updated {
		old: with_reason(egress_policy("40", rules.clone()), "initial"),
		new: with_reason(egress_policy("41", rules), "rollout"),
	}]);

	assert_eq!(
		lines,
		vec!["EgressNetworkPolicy shop/default: ReasonForChange has changed from initial to rollout"]
	);
}

#[test]
fn test_delete_notice_is_independent_of_prior_updates() {
	let lines = run(vec![
		LifecycleEvent::Updated {
			old: egress_policy("1", json!([])),
			new: egress_policy("2", json!([{ "type": "Deny", "to": { "dnsName": "example.com" } }])),
		},
		LifecycleEvent::Deleted(egress_policy("2", json!([]))),
	]);

	assert_eq!(
		lines.last().map(String::as_str),
		Some("EgressNetworkPolicy shop/default: deleted")
	);
}

#[test]
fn test_ingress_reorder_is_a_change() {
	let a = json!({ "from": [{ "ipBlock": { "cidr": "10.0.0.0/8" } }] });
	let b = json!({ "ports": [{ "protocol": "TCP", "port": 443 }] });
	let lines = run(vec![LifecycleEvent::Updated {
		old: network_policy("1", "", json!({ "ingress": [a.clone(), b.clone()] })),
		new: network_policy("2", "", json!({ "ingress": [b, a] })),
	}]);

	assert_eq!(lines.len(), 1);
	assert!(
		lines[0].starts_with("NetworkPolicy shop/allow-web: Ingress Rules has changed from [{"),
		"unexpected line: {}",
		lines[0]
	);
}

#[test]
fn test_untracked_change_writes_summary() {
	let lines = run(vec![LifecycleEvent::Updated {
		old: network_policy("7", "same", json!({})),
		new: network_policy("8", "same", json!({})),
	}]);

	assert_eq!(
		lines,
		vec!["NetworkPolicy shop/allow-web: updated to revision 8 without tracked field changes"]
	);
}

#[test]
fn test_network_policy_egress_renders_as_block() {
	let lines = run(vec![LifecycleEvent::Updated {
		old: network_policy("1", "", json!({ "policyTypes": ["Egress"] })),
		new: network_policy(
			"2",
			"",
			json!({
				"policyTypes": ["Egress"],
				"egress": [{ "to": [{ "ipBlock": { "cidr": "0.0.0.0/0" } }] }]
			}),
		),
	}]);

	assert_eq!(
		lines,
		vec![
			r#"NetworkPolicy shop/allow-web: Egress Rules has changed from [] to [{"to":[{"ipBlock":{"cidr":"0.0.0.0/0"}}]}]"#
		]
	);
}
