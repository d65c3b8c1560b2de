//! Resource stream source built on the kube-runtime watcher.
//!
//! The watcher reports the current state of each object, not transitions.
//! [`SnapshotCache`] remembers the last snapshot of every object so that each
//! watch event can be handed to the pipeline as an add, an update carrying
//! both the old and the new snapshot, or a delete.

use std::{
	collections::{BTreeMap, BTreeSet},
	fmt::Debug,
	pin::pin,
};

use futures::StreamExt;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::{
	api::{Api, ApiResource, DynamicObject},
	core::GroupVersionKind,
	runtime::{watcher, WatchStreamExt},
	Client, Resource, ResourceExt,
};
use policy_diff::{
	LifecycleEvent, LogSink, Pipeline, PolicySpec, ResourceSnapshot, Revision, SnapshotError,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// What the watcher told us about one object, already read into a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<S> {
	/// The object was created or modified.
	Applied(ResourceSnapshot<S>),
	/// The object was removed; carries its last known state.
	Deleted(ResourceSnapshot<S>),
	/// A full re-list is starting.
	RelistStarted,
	/// The object is part of the ongoing re-list.
	Relisted(ResourceSnapshot<S>),
	/// The re-list is complete.
	RelistDone,
}

impl<S: PolicySpec> Observation<S> {
	/// Read a watcher event for any serializable resource type.
	pub fn from_watch_event<K: Serialize>(event: watcher::Event<K>) -> Result<Self, SnapshotError> {
		let read = |object: &K| ResourceSnapshot::<S>::from_resource(S::KIND, object);
		Ok(match event {
			watcher::Event::Apply(object) => Observation::Applied(read(&object)?),
			watcher::Event::Delete(object) => Observation::Deleted(read(&object)?),
			watcher::Event::Init => Observation::RelistStarted,
			watcher::Event::InitApply(object) => Observation::Relisted(read(&object)?),
			watcher::Event::InitDone => Observation::RelistDone,
		})
	}
}

/// A watched object whose spec could not be read.
#[derive(Debug, Clone, PartialEq)]
pub enum Unreadable<S> {
	/// Created, modified or re-listed; its new state is unknown.
	Changed { namespace: String, name: String },
	/// Removed; carries what its metadata still tells.
	Deleted(ResourceSnapshot<S>),
}

impl<S: PolicySpec> Unreadable<S> {
	pub fn from_watch_event<K: Resource>(event: &watcher::Event<K>) -> Option<Self> {
		match event {
			watcher::Event::Apply(object) | watcher::Event::InitApply(object) => {
				Some(Unreadable::Changed {
					namespace: object.namespace().unwrap_or_default(),
					name: object.name_any(),
				})
			}
			watcher::Event::Delete(object) => Some(Unreadable::Deleted(metadata_snapshot(object))),
			watcher::Event::Init | watcher::Event::InitDone => None,
		}
	}

	fn key(&self) -> ObjectKey {
		match self {
			Unreadable::Changed { namespace, name } => (namespace.clone(), name.clone()),
			Unreadable::Deleted(snapshot) => key_of(snapshot),
		}
	}
}

/// Snapshot carrying only an object's metadata and an empty spec.
fn metadata_snapshot<K: Resource, S: PolicySpec>(object: &K) -> ResourceSnapshot<S> {
	ResourceSnapshot {
		name: object.name_any(),
		namespace: object.namespace().unwrap_or_default(),
		revision: object.resource_version().map(Revision::new).unwrap_or_default(),
		annotations: object.annotations().clone(),
		spec: S::default(),
	}
}

type ObjectKey = (String, String);

fn key_of<S>(snapshot: &ResourceSnapshot<S>) -> ObjectKey {
	(snapshot.namespace.clone(), snapshot.name.clone())
}

/// Last known snapshot of every watched object.
#[derive(Debug)]
pub struct SnapshotCache<S> {
	known: BTreeMap<ObjectKey, ResourceSnapshot<S>>,
	relisted: Option<BTreeSet<ObjectKey>>,
}

impl<S> Default for SnapshotCache<S> {
	fn default() -> Self {
		Self {
			known: BTreeMap::new(),
			relisted: None,
		}
	}
}

impl<S: PolicySpec + Clone> SnapshotCache<S> {
	pub fn len(&self) -> usize {
		self.known.len()
	}

	pub fn is_empty(&self) -> bool {
		self.known.is_empty()
	}

	/// Record an observation and return the lifecycle events it implies.
	///
	/// Objects delivered again by a re-list become updates against the cached
	/// copy; objects missing from a completed re-list are reported deleted.
	pub fn observe(&mut self, observation: Observation<S>) -> Vec<LifecycleEvent<S>> {
		match observation {
			Observation::Applied(snapshot) => vec![self.upsert(snapshot)],
			Observation::Relisted(snapshot) => {
				if let Some(seen) = &mut self.relisted {
					seen.insert(key_of(&snapshot));
				}
				vec![self.upsert(snapshot)]
			}
			Observation::Deleted(snapshot) => {
				self.known.remove(&key_of(&snapshot));
				vec![LifecycleEvent::Deleted(snapshot)]
			}
			Observation::RelistStarted => {
				self.relisted = Some(BTreeSet::new());
				Vec::new()
			}
			Observation::RelistDone => {
				let Some(seen) = self.relisted.take() else {
					return Vec::new();
				};
				let gone: Vec<ObjectKey> = self
					.known
					.keys()
					.filter(|key| !seen.contains(*key))
					.cloned()
					.collect();
				gone.iter()
					.filter_map(|key| self.known.remove(key))
					.map(LifecycleEvent::Deleted)
					.collect()
			}
		}
	}

	/// Forget an object that could not be read.
	///
	/// Its next readable sighting is reported as added. A deletion is still
	/// reported, built from the object's metadata.
	pub fn discard(&mut self, unreadable: Unreadable<S>) -> Vec<LifecycleEvent<S>> {
		self.known.remove(&unreadable.key());
		match unreadable {
			Unreadable::Changed { .. } => Vec::new(),
			Unreadable::Deleted(snapshot) => vec![LifecycleEvent::Deleted(snapshot)],
		}
	}

	fn upsert(&mut self, snapshot: ResourceSnapshot<S>) -> LifecycleEvent<S> {
		match self.known.insert(key_of(&snapshot), snapshot.clone()) {
			Some(old) => LifecycleEvent::Updated { old, new: snapshot },
			None => LifecycleEvent::Added(snapshot),
		}
	}
}

/// Group, version and plural of the OpenShift egress firewall resource.
pub fn egress_network_policy_resource() -> ApiResource {
	ApiResource::from_gvk_with_plural(
		&GroupVersionKind::gvk("network.openshift.io", "v1", "EgressNetworkPolicy"),
		"egressnetworkpolicies",
	)
}

pub fn network_policy_api(client: Client, namespace: Option<&str>) -> Api<NetworkPolicy> {
	match namespace {
		Some(ns) => Api::namespaced(client, ns),
		None => Api::all(client),
	}
}

pub fn egress_network_policy_api(client: Client, namespace: Option<&str>) -> Api<DynamicObject> {
	let resource = egress_network_policy_resource();
	match namespace {
		Some(ns) => Api::namespaced_with(client, ns, &resource),
		None => Api::all_with(client, &resource),
	}
}

/// Feed one resource kind through its pipeline until `shutdown` fires.
///
/// Events are handled one at a time; an event that has started is always
/// finished before the shutdown signal is looked at again.
#[instrument(skip_all, fields(kind = S::KIND))]
pub async fn run<K, S, L>(
	api: Api<K>,
	config: watcher::Config,
	mut pipeline: Pipeline<S, L>,
	mut shutdown: watch::Receiver<bool>,
) where
	K: Resource + Clone + DeserializeOwned + Serialize + Debug + Send + 'static,
	S: PolicySpec + Clone,
	L: LogSink,
{
	if *shutdown.borrow() {
		return;
	}

	let mut cache = SnapshotCache::<S>::default();
	let mut stream = pin!(watcher(api, config).default_backoff());
	info!("watch started");

	loop {
		let next = tokio::select! {
			biased;
			_ = shutdown.changed() => break,
			next = stream.next() => next,
		};

		match next {
			Some(Ok(event)) => handle_watch_event(&mut cache, &mut pipeline, event),
			Some(Err(e)) => warn!(error = %e, "watch failed, retrying"),
			None => {
				warn!("watch stream ended");
				break;
			}
		}
	}

	info!(objects = cache.len(), "watch stopped");
}

fn handle_watch_event<K, S, L>(
	cache: &mut SnapshotCache<S>,
	pipeline: &mut Pipeline<S, L>,
	event: watcher::Event<K>,
) where
	K: Resource + Serialize,
	S: PolicySpec + Clone,
	L: LogSink,
{
	let unreadable = Unreadable::from_watch_event(&event);
	let lifecycle = match Observation::from_watch_event(event) {
		Ok(observation) => cache.observe(observation),
		Err(e) => {
			let Some(unreadable) = unreadable else {
				return;
			};
			let (namespace, name) = unreadable.key();
			error!(%namespace, %name, error = ?e, "unreadable object, forgetting cached state");
			cache.discard(unreadable)
		}
	};

	for event in lifecycle {
		pipeline.handle(event);
	}
}
