//! Kubernetes cluster connection management.

use std::{path::Path, time::Duration};

use k8s_openapi::apimachinery::pkg::version::Info;
use kube::{
	config::{InferConfigError, KubeConfigOptions, Kubeconfig, KubeconfigError},
	Client, Config,
};
use thiserror::Error;
use tracing::instrument;

/// Default timeout for Kubernetes API requests.
///
/// Watch requests are long polls; this bounds how long a silent connection
/// is kept before the watcher reconnects.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(295);

/// Errors that can occur when connecting to a Kubernetes cluster.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("no context named `{0}` was found. Please check your $KUBECONFIG")]
	ContextNotFound(String),

	#[error(transparent)]
	Kubeconfig(#[from] KubeconfigError),

	#[error(transparent)]
	Infer(#[from] InferConfigError),

	#[error(transparent)]
	Kube(#[from] kube::Error),
}

/// Represents a connection to a Kubernetes cluster.
#[derive(Clone)]
pub struct ClusterConnection {
	client: Client,
	server_version: Info,
	/// Human-readable identifier for the cluster (context name or API server URL).
	cluster_identifier: String,
}

impl std::fmt::Debug for ClusterConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterConnection")
			.field("cluster_identifier", &self.cluster_identifier)
			.field("server_version", &self.server_version)
			.finish_non_exhaustive()
	}
}

impl ClusterConnection {
	/// Connect to a cluster.
	///
	/// - `kubeconfig`: read this file instead of the default locations
	/// - `context`: use this context instead of the kubeconfig's current one
	///
	/// With neither set, the configuration is inferred: the default
	/// kubeconfig if there is one, otherwise the in-cluster service account.
	#[instrument(skip_all)]
	pub async fn connect(
		kubeconfig: Option<&Path>,
		context: Option<&str>,
	) -> Result<Self, ConnectionError> {
		match (kubeconfig, context) {
			(Some(path), context) => {
				let kubeconfig = Kubeconfig::read_from(path)?;
				Self::from_kubeconfig(kubeconfig, context).await
			}
			(None, Some(context)) => {
				let kubeconfig = Kubeconfig::read()?;
				Self::from_kubeconfig(kubeconfig, Some(context)).await
			}
			(None, None) => {
				let config = Config::infer().await?;
				let identifier = config.cluster_url.to_string();
				Self::from_config(config, identifier).await
			}
		}
	}

	/// Connect using an already loaded kubeconfig.
	#[instrument(skip_all)]
	pub async fn from_kubeconfig(
		kubeconfig: Kubeconfig,
		context: Option<&str>,
	) -> Result<Self, ConnectionError> {
		if let Some(context) = context {
			ensure_context_exists(&kubeconfig, context)?;
		}

		let config = Config::from_custom_kubeconfig(
			kubeconfig,
			&KubeConfigOptions {
				context: context.map(str::to_string),
				..Default::default()
			},
		)
		.await?;

		let identifier = match context {
			Some(context) => format!("{}  (context:{})", config.cluster_url, context),
			None => config.cluster_url.to_string(),
		};
		Self::from_config(config, identifier).await
	}

	async fn from_config(
		mut config: Config,
		cluster_identifier: String,
	) -> Result<Self, ConnectionError> {
		config.read_timeout = Some(DEFAULT_API_TIMEOUT);
		let client = Client::try_from(config)?;

		let server_version = client.apiserver_version().await?;

		Ok(Self {
			client,
			server_version,
			cluster_identifier,
		})
	}

	/// Get a reference to the underlying kube client.
	pub fn client(&self) -> &Client {
		&self.client
	}

	/// Get the server version.
	pub fn server_version(&self) -> &Info {
		&self.server_version
	}

	/// Get the cluster identifier (API server URL, plus context name when one was chosen).
	pub fn cluster_identifier(&self) -> &str {
		&self.cluster_identifier
	}
}

fn ensure_context_exists(kubeconfig: &Kubeconfig, context: &str) -> Result<(), ConnectionError> {
	if kubeconfig.contexts.iter().any(|c| c.name == context) {
		Ok(())
	} else {
		Err(ConnectionError::ContextNotFound(context.to_string()))
	}
}
