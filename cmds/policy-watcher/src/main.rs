use anyhow::{Context, Result};
use clap::Parser;
use policy_watcher::{config::Cli, k8s::client::ClusterConnection, telemetry, watch::spawn_watchers};
use tokio::{sync::watch, task::JoinSet};
use tracing::{error, info};

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	let _telemetry = telemetry::init(cli.log_level)?;

	let connection = ClusterConnection::connect(cli.kubeconfig.as_deref(), cli.context.as_deref())
		.await
		.context("connecting to the cluster")?;
	info!(
		cluster = %connection.cluster_identifier(),
		server_version = %connection.server_version().git_version,
		"cluster targeted"
	);

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let mut tasks = JoinSet::new();
	let started = spawn_watchers(&mut tasks, connection.client(), &cli, &shutdown_rx);
	info!(watchers = started, "watching for policy changes");

	wait_for_shutdown_signal().await?;

	// Watchers finish the event they are handling, then return.
	shutdown_tx.send_replace(true);
	while let Some(result) = tasks.join_next().await {
		if let Err(e) = result {
			error!(error = %e, "watcher task failed");
		}
	}

	info!("stopped");
	Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() -> Result<()> {
	let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
		.context("failed to register SIGTERM handler")?;

	tokio::select! {
		result = tokio::signal::ctrl_c() => {
			result.context("failed to listen for SIGINT")?;
			info!("Received SIGINT");
		}
		_ = sigterm.recv() => {
			info!("Received SIGTERM");
		}
	}

	info!("Shutting down");
	Ok(())
}
