//! Command line configuration.
//!
//! Every flag can also be set through a `POLICY_WATCHER_*` environment
//! variable. The kubeconfig location itself follows the usual `KUBECONFIG`
//! rules unless `--kubeconfig` is given.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use kube::runtime::watcher;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "policy-watcher")]
#[command(about = "Log field-level changes to NetworkPolicy and EgressNetworkPolicy objects", long_about = None)]
#[command(version)]
pub struct Cli {
	/// Path to the kubeconfig file (default: $KUBECONFIG, ~/.kube/config, or in-cluster)
	#[arg(long)]
	pub kubeconfig: Option<PathBuf>,

	/// Kubeconfig context to use instead of the current one
	#[arg(long, env = "POLICY_WATCHER_CONTEXT")]
	pub context: Option<String>,

	/// Only watch policies in this namespace (default: all namespaces)
	#[arg(short = 'n', long, env = "POLICY_WATCHER_NAMESPACE")]
	pub namespace: Option<String>,

	/// Only watch policies matching this label selector
	#[arg(short = 'l', long, env = "POLICY_WATCHER_LABEL_SELECTOR")]
	pub label_selector: Option<String>,

	/// Policy kinds to watch
	#[arg(
		long,
		value_enum,
		value_delimiter = ',',
		env = "POLICY_WATCHER_KINDS",
		default_values_t = [WatchedKind::NetworkPolicy, WatchedKind::EgressNetworkPolicy]
	)]
	pub kinds: Vec<WatchedKind>,

	/// Log level (possible values: error, warn, info, debug, trace). Overrides RUST_LOG
	#[arg(long, env = "POLICY_WATCHER_LOG_LEVEL")]
	pub log_level: Option<Level>,
}

/// A policy resource the watcher can follow.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WatchedKind {
	/// networking.k8s.io/v1 NetworkPolicy
	NetworkPolicy,
	/// network.openshift.io/v1 EgressNetworkPolicy
	EgressNetworkPolicy,
}

impl Cli {
	/// Watched kinds, each at most once, in a stable order.
	pub fn watched_kinds(&self) -> Vec<WatchedKind> {
		let mut kinds = self.kinds.clone();
		kinds.sort();
		kinds.dedup();
		kinds
	}

	/// Watcher settings shared by every watched kind.
	pub fn watcher_config(&self) -> watcher::Config {
		let config = watcher::Config::default();
		match &self.label_selector {
			Some(selector) => config.labels(selector),
			None => config,
		}
	}
}
