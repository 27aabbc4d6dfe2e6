//! Common test utilities.

use std::{
	collections::BTreeMap,
	io::{self, ErrorKind, Write},
	sync::{
		atomic::{AtomicUsize, Ordering},
		Mutex,
	},
};

use async_trait::async_trait;
use k8s_openapi::{
	api::{
		apps::v1::Deployment,
		core::v1::{ConfigMap, Namespace, Service},
		networking::v1::Ingress,
	},
	apimachinery::pkg::apis::meta::v1::ObjectMeta,
};

use crate::k8s::fetch::{ClusterApi, FetchError};

/// A writer that simulates a broken pipe (SIGPIPE scenario).
pub struct BrokenPipeWriter;

impl Write for BrokenPipeWriter {
	fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
		Err(io::Error::new(ErrorKind::BrokenPipe, "broken pipe"))
	}

	fn flush(&mut self) -> io::Result<()> {
		Err(io::Error::new(ErrorKind::BrokenPipe, "broken pipe"))
	}
}

/// Build a config map object.
pub fn config_map(namespace: &str, name: &str, data: Option<&[(&str, &str)]>) -> ConfigMap {
	ConfigMap {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			namespace: Some(namespace.to_string()),
			resource_version: Some("1".to_string()),
			..Default::default()
		},
		data: data.map(|pairs| {
			pairs
				.iter()
				.map(|(k, v)| ((*k).to_string(), (*v).to_string()))
				.collect()
		}),
		..Default::default()
	}
}

fn forbidden(what: &str) -> io::Error {
	io::Error::new(ErrorKind::PermissionDenied, format!("{what} is forbidden"))
}

type ReadHook = Box<dyn Fn(&str) + Send + Sync>;

/// An in-memory cluster for testing.
///
/// Namespaces are listed in insertion order. Config maps are keyed by
/// `(namespace, name)`. Faults can be injected per namespace.
#[derive(Default)]
pub struct MemoryCluster {
	namespaces: Vec<String>,
	deployments: Vec<Deployment>,
	services: Vec<Service>,
	ingresses: Vec<Ingress>,
	config_maps: Mutex<BTreeMap<(String, String), ConfigMap>>,
	fail_namespace_list: bool,
	failing_reads: Vec<String>,
	failing_writes: Vec<String>,
	read_hook: Option<ReadHook>,
	writes: AtomicUsize,
}

impl MemoryCluster {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_namespace(mut self, namespace: &str) -> Self {
		if !self.namespaces.iter().any(|ns| ns == namespace) {
			self.namespaces.push(namespace.to_string());
		}
		self
	}

	/// Add a config map, registering its namespace if needed.
	pub fn with_config_map(mut self, config_map: ConfigMap) -> Self {
		let namespace = config_map.metadata.namespace.clone().unwrap_or_default();
		let name = config_map.metadata.name.clone().unwrap_or_default();
		self = self.with_namespace(&namespace);
		self.config_maps
			.get_mut()
			.unwrap()
			.insert((namespace, name), config_map);
		self
	}

	pub fn with_deployment(mut self, deployment: Deployment) -> Self {
		self.deployments.push(deployment);
		self
	}

	pub fn with_service(mut self, service: Service) -> Self {
		self.services.push(service);
		self
	}

	pub fn with_ingress(mut self, ingress: Ingress) -> Self {
		self.ingresses.push(ingress);
		self
	}

	pub fn failing_namespace_list(mut self) -> Self {
		self.fail_namespace_list = true;
		self
	}

	pub fn failing_read(mut self, namespace: &str) -> Self {
		self.failing_reads.push(namespace.to_string());
		self
	}

	pub fn failing_write(mut self, namespace: &str) -> Self {
		self.failing_writes.push(namespace.to_string());
		self
	}

	/// Run `hook` with the namespace before every config map read.
	pub fn on_read(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
		self.read_hook = Some(Box::new(hook));
		self
	}

	/// Current data of a config map.
	pub fn data(&self, namespace: &str, name: &str) -> Option<BTreeMap<String, String>> {
		self.config_maps
			.lock()
			.unwrap()
			.get(&(namespace.to_string(), name.to_string()))
			.map(|cm| cm.data.clone().unwrap_or_default())
	}

	/// Number of successful config map replacements.
	pub fn write_count(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}
}

fn in_namespace(meta: &ObjectMeta, namespace: &str) -> bool {
	meta.namespace.as_deref() == Some(namespace)
}

#[async_trait]
impl ClusterApi for MemoryCluster {
	async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, FetchError> {
		Ok(self
			.deployments
			.iter()
			.filter(|d| in_namespace(&d.metadata, namespace))
			.cloned()
			.collect())
	}

	async fn list_services(&self, namespace: &str) -> Result<Vec<Service>, FetchError> {
		Ok(self
			.services
			.iter()
			.filter(|s| in_namespace(&s.metadata, namespace))
			.cloned()
			.collect())
	}

	async fn list_ingresses(&self) -> Result<Vec<Ingress>, FetchError> {
		Ok(self.ingresses.clone())
	}

	async fn list_config_maps(&self) -> Result<Vec<ConfigMap>, FetchError> {
		Ok(self.config_maps.lock().unwrap().values().cloned().collect())
	}

	async fn list_namespaces(&self) -> Result<Vec<Namespace>, FetchError> {
		if self.fail_namespace_list {
			return Err(FetchError::list("namespaces", None, forbidden("namespaces")));
		}
		Ok(self
			.namespaces
			.iter()
			.map(|name| Namespace {
				metadata: ObjectMeta {
					name: Some(name.clone()),
					..Default::default()
				},
				..Default::default()
			})
			.collect())
	}

	async fn read_config_map(
		&self,
		name: &str,
		namespace: &str,
	) -> Result<Option<ConfigMap>, FetchError> {
		if let Some(hook) = &self.read_hook {
			hook(namespace);
		}
		if self.failing_reads.iter().any(|ns| ns == namespace) {
			return Err(FetchError::read("configmap", namespace, name, forbidden("configmaps")));
		}
		Ok(self
			.config_maps
			.lock()
			.unwrap()
			.get(&(namespace.to_string(), name.to_string()))
			.cloned())
	}

	async fn replace_config_map(
		&self,
		current: ConfigMap,
		data: &BTreeMap<String, String>,
	) -> Result<ConfigMap, FetchError> {
		let name = current.metadata.name.clone().unwrap_or_default();
		let namespace = current.metadata.namespace.clone().unwrap_or_default();
		if self.failing_writes.iter().any(|ns| *ns == namespace) {
			return Err(FetchError::replace("configmap", &namespace, &name, forbidden("configmaps")));
		}

		let mut config_maps = self.config_maps.lock().unwrap();
		let Some(existing) = config_maps.get_mut(&(namespace.clone(), name.clone())) else {
			return Err(FetchError::replace(
				"configmap",
				&namespace,
				&name,
				io::Error::new(ErrorKind::NotFound, "not found"),
			));
		};
		let mut object = current;
		object.data = Some(data.clone());
		*existing = object;
		self.writes.fetch_add(1, Ordering::SeqCst);
		Ok(existing.clone())
	}
}
