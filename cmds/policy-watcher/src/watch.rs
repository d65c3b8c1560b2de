//! Starts one watch task per policy kind.

use kube::Client;
use policy_diff::{EgressPolicySpec, NetworkPolicySpec, Pipeline, TracingSink};
use tokio::{sync::watch, task::JoinSet};
use tracing::info;

use crate::{
	config::{Cli, WatchedKind},
	k8s::source::{self, egress_network_policy_api, network_policy_api},
};

/// Spawn a watch task for every kind selected on the command line.
///
/// The tasks share nothing but the client and the shutdown receiver; each
/// owns its own pipeline and snapshot cache. Returns the number of tasks
/// started.
pub fn spawn_watchers(
	tasks: &mut JoinSet<()>,
	client: &Client,
	cli: &Cli,
	shutdown: &watch::Receiver<bool>,
) -> usize {
	let namespace = cli.namespace.as_deref();
	let kinds = cli.watched_kinds();

	for kind in &kinds {
		info!(kind = ?kind, namespace = namespace.unwrap_or("*"), "starting watcher");
		match kind {
			WatchedKind::NetworkPolicy => {
				tasks.spawn(source::run(
					network_policy_api(client.clone(), namespace),
					cli.watcher_config(),
					Pipeline::<NetworkPolicySpec, _>::new(TracingSink),
					shutdown.clone(),
				));
			}
			WatchedKind::EgressNetworkPolicy => {
				tasks.spawn(source::run(
					egress_network_policy_api(client.clone(), namespace),
					cli.watcher_config(),
					Pipeline::<EgressPolicySpec, _>::new(TracingSink),
					shutdown.clone(),
				));
			}
		}
	}

	kinds.len()
}
