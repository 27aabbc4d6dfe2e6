//! Listing and mutation calls against the cluster.
//!
//! [`ClusterApi`] is the whole surface the engine uses. [`KubeCluster`] forwards
//! each call to the API server through typed `kube::Api` handles; nothing is
//! cached between calls.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::{
	apps::v1::Deployment,
	core::v1::{ConfigMap, Namespace, Service},
	networking::v1::Ingress,
};
use kube::{
	api::{Api, ListParams, PostParams},
	Client,
};
use thiserror::Error;
use tracing::instrument;

use super::{client::ClusterConnection, BoxError};

/// Errors returned by cluster calls.
#[derive(Debug, Error)]
pub enum FetchError {
	#[error("listing {kind} in {scope}")]
	List {
		kind: &'static str,
		scope: String,
		#[source]
		source: BoxError,
	},

	#[error("reading {kind} {namespace}/{name}")]
	Read {
		kind: &'static str,
		namespace: String,
		name: String,
		#[source]
		source: BoxError,
	},

	#[error("replacing {kind} {namespace}/{name}")]
	Replace {
		kind: &'static str,
		namespace: String,
		name: String,
		#[source]
		source: BoxError,
	},
}

impl FetchError {
	pub(crate) fn list(
		kind: &'static str,
		namespace: Option<&str>,
		source: impl Into<BoxError>,
	) -> Self {
		Self::List {
			kind,
			scope: namespace.map_or_else(|| "all namespaces".to_string(), |ns| format!("namespace {ns}")),
			source: source.into(),
		}
	}

	pub(crate) fn read(
		kind: &'static str,
		namespace: &str,
		name: &str,
		source: impl Into<BoxError>,
	) -> Self {
		Self::Read {
			kind,
			namespace: namespace.to_string(),
			name: name.to_string(),
			source: source.into(),
		}
	}

	pub(crate) fn replace(
		kind: &'static str,
		namespace: &str,
		name: &str,
		source: impl Into<BoxError>,
	) -> Self {
		Self::Replace {
			kind,
			namespace: namespace.to_string(),
			name: name.to_string(),
			source: source.into(),
		}
	}
}

/// Query and mutate operations the engine needs from a cluster.
#[async_trait]
pub trait ClusterApi: Send + Sync {
	async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, FetchError>;

	async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, FetchError>;

	/// Ingresses across all namespaces.
	async fn list_ingresses(&self) -> Result<Vec<Ingress>, FetchError>;

	/// Config maps across all namespaces.
	async fn list_config_maps(&self) -> Result<Vec<ConfigMap>, FetchError>;

	async fn list_namespaces(&self) -> Result<Vec<Namespace>, FetchError>;

	/// Read one config map. `Ok(None)` means it does not exist in `namespace`.
	async fn read_config_map(
		&self,
		name: &str,
		namespace: &str,
	) -> Result<Option<ConfigMap>, FetchError>;

	/// Replace the whole `data` mapping of `current`, as returned by
	/// [`ClusterApi::read_config_map`], and write it back.
	///
	/// Keys absent from `data` are removed. No resource version check is made,
	/// so concurrent edits made between the read and this write are lost.
	async fn replace_config_map(
		&self,
		current: ConfigMap,
		data: &BTreeMap<String, String>,
	) -> Result<ConfigMap, FetchError>;
}

/// [`ClusterApi`] backed by a live API server.
#[derive(Clone)]
pub struct KubeCluster {
	client: Client,
}

impl KubeCluster {
	pub fn new(client: Client) -> Self {
		Self { client }
	}
}

impl From<&ClusterConnection> for KubeCluster {
	fn from(connection: &ClusterConnection) -> Self {
		Self::new(connection.client().clone())
	}
}

#[async_trait]
impl ClusterApi for KubeCluster {
	#[instrument(skip(self))]
	async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, FetchError> {
		let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
		let list = api
			.list(&ListParams::default())
			.await
			.map_err(|e| FetchError::list("deployments", Some(namespace), e))?;
		tracing::debug!(count = list.items.len(), "listed deployments");
		Ok(list.items)
	}

	#[instrument(skip(self))]
	async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, FetchError> {
		let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
		let list = api
			.list(&ListParams::default())
			.await
			.map_err(|e| FetchError::list("services", Some(namespace), e))?;
		tracing::debug!(count = list.items.len(), "listed services");
		Ok(list.items)
	}

	#[instrument(skip(self))]
	async fn list_ingresses(&self) -> Result<Vec<Ingress>, FetchError> {
		let api: Api<Ingress> = Api::all(self.client.clone());
		let list = api
			.list(&ListParams::default())
			.await
			.map_err(|e| FetchError::list("ingresses", None, e))?;
		tracing::debug!(count = list.items.len(), "listed ingresses");
		Ok(list.items)
	}

	#[instrument(skip(self))]
	async fn list_config_maps(&self) -> Result<Vec<ConfigMap>, FetchError> {
		let api: Api<ConfigMap> = Api::all(self.client.clone());
		let list = api
			.list(&ListParams::default())
			.await
			.map_err(|e| FetchError::list("configmaps", None, e))?;
		tracing::debug!(count = list.items.len(), "listed config maps");
		Ok(list.items)
	}

	#[instrument(skip(self))]
	async fn list_namespaces(&self) -> Result<Vec<Namespace>, FetchError> {
		let api: Api<Namespace> = Api::all(self.client.clone());
		let list = api
			.list(&ListParams::default())
			.await
			.map_err(|e| FetchError::list("namespaces", None, e))?;
		tracing::debug!(count = list.items.len(), "listed namespaces");
		Ok(list.items)
	}

	#[instrument(skip(self))]
	async fn read_config_map(
		&self,
		name: &str,
		namespace: &str,
	) -> Result<Option<ConfigMap>, FetchError> {
		let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
		api.get_opt(name)
			.await
			.map_err(|e| FetchError::read("configmap", namespace, name, e))
	}

	#[instrument(
		skip_all,
		fields(
			name = current.metadata.name.as_deref(),
			namespace = current.metadata.namespace.as_deref(),
			keys = data.len(),
		)
	)]
	async fn replace_config_map(
		&self,
		current: ConfigMap,
		data: &BTreeMap<String, String>,
	) -> Result<ConfigMap, FetchError> {
		let mut object = current;
		let name = object.metadata.name.clone().unwrap_or_default();
		let namespace = object.metadata.namespace.clone().unwrap_or_default();
		let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &namespace);

		object.data = Some(data.clone());
		// Without a resourceVersion the API server performs an unconditional update.
		object.metadata.resource_version = None;

		api.replace(&name, &PostParams::default(), &object)
			.await
			.map_err(|e| FetchError::replace("configmap", &namespace, &name, e))
	}}

/// Raw collections feeding one correlation pass.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
	pub namespace: String,
	pub deployments: Vec<Deployment>,
	pub services: Vec<Service>,
	pub ingresses: Vec<Ingress>,
}

impl Snapshot {
	/// Fetch a fresh snapshot of `namespace`. Ingresses are taken cluster-wide.
	#[instrument(skip(api))]
	pub async fn fetch<C: ClusterApi + ?Sized>(
		api: &C,
		namespace: &str,
	) -> Result<Self, FetchError> {
		let deployments = api.list_deployments(namespace).await?;
		let services = api.list_services(namespace).await?;
		let ingresses = api.list_ingresses().await?;

		Ok(Self {
			namespace: namespace.to_string(),
			deployments,
			services,
			ingresses,
		})
	}
}
