//! Name-indexed view over every config map in the cluster.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use serde::Serialize;
use tracing::instrument;

use crate::k8s::fetch::{ClusterApi, FetchError};

/// A config map reduced to what the registry cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigObject {
	pub name: String,
	pub namespace: String,
	pub data: BTreeMap<String, String>,
}

impl From<ConfigMap> for ConfigObject {
	fn from(config_map: ConfigMap) -> Self {
		Self {
			name: config_map.metadata.name.unwrap_or_default(),
			namespace: config_map.metadata.namespace.unwrap_or_default(),
			data: config_map.data.unwrap_or_default(),
		}
	}
}

/// Result of looking up a config map by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigLookup {
	/// Namespace of the copy that was returned.
	pub namespace: String,
	pub data: BTreeMap<String, String>,
	/// Number of namespaces holding a config map with this name.
	pub copies: usize,
}

/// Cluster-wide config maps, in listing order.
///
/// Lookups are by name only. When several namespaces hold the same name, the
/// first one listed is returned and [`ConfigLookup::copies`] tells how many
/// there were.
#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
	objects: Vec<ConfigObject>,
}

impl ConfigRegistry {
	pub fn new(objects: Vec<ConfigObject>) -> Self {
		Self { objects }
	}

	/// List all config maps in the cluster.
	#[instrument(skip(api))]
	pub async fn load<C: ClusterApi + ?Sized>(api: &C) -> Result<Self, FetchError> {
		let objects: Vec<ConfigObject> = api
			.list_config_maps()
			.await?
			.into_iter()
			.map(ConfigObject::from)
			.collect();
		tracing::debug!(count = objects.len(), "loaded config registry");
		Ok(Self::new(objects))
	}

	/// Names of every config map, duplicates across namespaces included.
	pub fn list_names(&self) -> Vec<String> {
		self.objects.iter().map(|o| o.name.clone()).collect()
	}

	/// Data of the first config map named `name`, or `None` if there is none.
	pub fn get(&self, name: &str) -> Option<ConfigLookup> {
		let mut matching = self.objects.iter().filter(|o| o.name == name);
		let first = matching.next()?;

		Some(ConfigLookup {
			namespace: first.namespace.clone(),
			data: first.data.clone(),
			copies: 1 + matching.count(),
		})
	}

	/// Namespaces holding a config map named `name`, in listing order.
	pub fn namespaces_of(&self, name: &str) -> Vec<&str> {
		self.objects
			.iter()
			.filter(|o| o.name == name)
			.map(|o| o.namespace.as_str())
			.collect()
	}

	pub fn objects(&self) -> &[ConfigObject] {
		&self.objects
	}
}
