//! Joins deployments, services and ingresses into per-workload records.
//!
//! None of these links are declared in the cluster. They are inferred by
//! comparing values: a service selector against a container name, and an
//! ingress backend against a service name. Missing sub-objects never fail a
//! pass; they degrade to defaults on the produced [`Workload`].

use std::{collections::BTreeMap, fmt};

use k8s_openapi::{
	api::{
		apps::v1::{Deployment, DeploymentStatus},
		core::v1::{Container, Service, ServicePort},
		networking::v1::Ingress,
	},
	apimachinery::pkg::util::intstr::IntOrString,
};
use serde::Serialize;
use tracing::instrument;

use crate::k8s::fetch::Snapshot;

/// How a service selector is compared against a container name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectorRule {
	/// Compare against the first value of the selector mapping.
	///
	/// Selectors are ordered maps, so "first" is the value under the
	/// lexicographically smallest label key.
	#[default]
	FirstValue,

	/// Compare against the value of one declared label key, e.g. `app`.
	Label(String),
}

impl SelectorRule {
	fn matches(&self, selector: &BTreeMap<String, String>, container: &str) -> bool {
		let value = match self {
			SelectorRule::FirstValue => selector.values().next(),
			SelectorRule::Label(key) => selector.get(key),
		};
		value.is_some_and(|v| v == container)
	}
}

/// Replica counts of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ReplicaHealth {
	/// Counts read from the deployment status. Absent counts read as 0.
	Known { available: i32, desired: i32 },

	/// The deployment carries no status at all.
	///
	/// This is "no data", which is not the same thing as `0/0`.
	Unknown,
}

impl ReplicaHealth {
	pub fn from_status(status: Option<&DeploymentStatus>) -> Self {
		match status {
			Some(status) => ReplicaHealth::Known {
				available: status.available_replicas.unwrap_or(0),
				desired: status.replicas.unwrap_or(0),
			},
			None => ReplicaHealth::Unknown,
		}
	}
}

impl fmt::Display for ReplicaHealth {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ReplicaHealth::Known { available, desired } => write!(f, "{available}/{desired}"),
			ReplicaHealth::Unknown => write!(f, "N/A"),
		}
	}
}

/// Config maps bound to a container through `envFrom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "names", rename_all = "lowercase")]
pub enum ConfigRefs {
	/// The container has no `envFrom` attribute.
	Undeclared,

	/// Names of the config maps referenced by the container's `envFrom` entries,
	/// in declaration order. Entries that are not config map references (secret
	/// refs) are left out, so this may be empty.
	Declared(Vec<String>),
}

impl ConfigRefs {
	pub fn from_container(container: &Container) -> Self {
		match &container.env_from {
			None => ConfigRefs::Undeclared,
			Some(sources) => ConfigRefs::Declared(
				sources
					.iter()
					.filter_map(|source| source.config_map_ref.as_ref())
					.map(|config_map| config_map.name.clone())
					.collect(),
			),
		}
	}

	/// Referenced config map names; empty for [`ConfigRefs::Undeclared`].
	pub fn names(&self) -> &[String] {
		match self {
			ConfigRefs::Undeclared => &[],
			ConfigRefs::Declared(names) => names,
		}
	}
}

impl fmt::Display for ConfigRefs {
	/// `Undeclared` and an empty `Declared` both display as `N/A`.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let names = self.names();
		if names.is_empty() {
			return write!(f, "N/A");
		}
		write!(f, "{}", names.join(","))
	}
}

/// One port entry of the service matched to a workload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortBinding {
	pub app_protocol: Option<String>,
	pub name: Option<String>,
	pub node_port: Option<i32>,
	pub port: Option<i32>,
	pub protocol: Option<String>,
	pub target_port: Option<IntOrString>,
}

impl From<&ServicePort> for PortBinding {
	fn from(port: &ServicePort) -> Self {
		Self {
			app_protocol: port.app_protocol.clone(),
			name: port.name.clone(),
			node_port: port.node_port,
			port: Some(port.port),
			protocol: port.protocol.clone(),
			target_port: port.target_port.clone(),
		}
	}
}

/// Port bindings pivoted into one sequence per attribute, in port order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortColumns {
	pub app_protocol: Vec<Option<String>>,
	pub name: Vec<Option<String>>,
	pub node_port: Vec<Option<i32>>,
	pub port: Vec<Option<i32>>,
	pub protocol: Vec<Option<String>>,
	pub target_port: Vec<Option<IntOrString>>,
}

/// Host routing directive taken from an ingress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
	pub host: Option<String>,
	pub service: String,
}

impl RouteRule {
	/// Route of an ingress: the first path of its first rule.
	///
	/// Further rules and paths of the same ingress are not modelled. Returns
	/// `None` when that path is missing or has no service backend.
	pub fn from_ingress(ingress: &Ingress) -> Option<Self> {
		let rule = ingress.spec.as_ref()?.rules.as_ref()?.first()?;
		let path = rule.http.as_ref()?.paths.first()?;
		let service = path.backend.service.as_ref()?;

		Some(Self {
			host: rule.host.clone(),
			service: service.name.clone(),
		})
	}
}

/// Route table for a pass, in ingress listing order.
pub fn route_table(ingresses: &[Ingress]) -> Vec<RouteRule> {
	ingresses.iter().filter_map(RouteRule::from_ingress).collect()
}

/// Correlated view of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
	/// Name of the deployment's first container.
	pub name: String,
	pub deployment: String,
	pub namespace: String,
	pub image: Option<String>,
	pub ports: Vec<PortBinding>,
	pub config_refs: ConfigRefs,
	pub health: ReplicaHealth,
	pub route_host: Option<String>,
	/// Name of the matched service, if any.
	pub service: Option<String>,
	/// How many services matched the container. Only the first one is used.
	pub service_matches: usize,
	/// How many routes pointed at the matched service. Only the first one is used.
	pub route_matches: usize,
}

impl Workload {
	pub fn port_columns(&self) -> PortColumns {
		let mut columns = PortColumns::default();
		for port in &self.ports {
			columns.app_protocol.push(port.app_protocol.clone());
			columns.name.push(port.name.clone());
			columns.node_port.push(port.node_port);
			columns.port.push(port.port);
			columns.protocol.push(port.protocol.clone());
			columns.target_port.push(port.target_port.clone());
		}
		columns
	}

	/// Whether the service or route join picked one candidate out of several.
	pub fn is_ambiguous(&self) -> bool {
		self.service_matches > 1 || self.route_matches > 1
	}
}

/// First item satisfying `pred`, together with how many items satisfied it.
fn first_match<'a, T>(
	items: impl IntoIterator<Item = &'a T>,
	mut pred: impl FnMut(&T) -> bool,
) -> (Option<&'a T>, usize) {
	items
		.into_iter()
		.filter(|item| pred(item))
		.fold((None, 0), |(first, count), item| {
			(first.or(Some(item)), count + 1)
		})
}

/// Joins raw resources into [`Workload`]s.
#[derive(Debug, Clone, Default)]
pub struct Correlator {
	rule: SelectorRule,
}

impl Correlator {
	pub fn new(rule: SelectorRule) -> Self {
		Self { rule }
	}

	/// Produce one workload per deployment, in deployment order.
	///
	/// Deployments without a matching service are kept with empty ports and no
	/// route host.
	#[instrument(skip_all, fields(namespace = %namespace, deployments = deployments.len()))]
	pub fn correlate(
		&self,
		deployments: &[Deployment],
		services: &[Service],
		ingresses: &[Ingress],
		namespace: &str,
	) -> Vec<Workload> {
		let routes = route_table(ingresses);
		tracing::debug!(routes = routes.len(), "built route table");

		deployments
			.iter()
			.map(|deployment| self.workload(deployment, services, &routes, namespace))
			.collect()
	}

	pub fn correlate_snapshot(&self, snapshot: &Snapshot) -> Vec<Workload> {
		self.correlate(
			&snapshot.deployments,
			&snapshot.services,
			&snapshot.ingresses,
			&snapshot.namespace,
		)
	}

	fn workload(
		&self,
		deployment: &Deployment,
		services: &[Service],
		routes: &[RouteRule],
		namespace: &str,
	) -> Workload {
		let deployment_name = deployment.metadata.name.clone().unwrap_or_default();
		let container = deployment
			.spec
			.as_ref()
			.and_then(|spec| spec.template.spec.as_ref())
			.and_then(|pod| pod.containers.first());

		let container_name = container.map(|c| c.name.as_str()).unwrap_or_default();

		let (service, service_matches) = first_match(services, |service| {
			service
				.spec
				.as_ref()
				.and_then(|spec| spec.selector.as_ref())
				.is_some_and(|selector| self.rule.matches(selector, container_name))
		});

		let mut ports = Vec::new();
		let mut route_host = None;
		let mut route_matches = 0;
		let mut service_name = None;

		if let Some(service) = service {
			let name = service.metadata.name.clone().unwrap_or_default();

			ports = service
				.spec
				.as_ref()
				.and_then(|spec| spec.ports.as_ref())
				.map(|ports| ports.iter().map(PortBinding::from).collect())
				.unwrap_or_default();

			let (route, count) = first_match(routes, |route| route.service == name);
			route_host = route.and_then(|route| route.host.clone());
			route_matches = count;
			service_name = Some(name);
		}

		if service_matches > 1 {
			tracing::warn!(
				deployment = %deployment_name,
				matches = service_matches,
				"several services select this container, using the first"
			);
		}
		if route_matches > 1 {
			tracing::warn!(
				deployment = %deployment_name,
				matches = route_matches,
				"several ingresses route to this service, using the first"
			);
		}

		Workload {
			name: container_name.to_string(),
			deployment: deployment_name,
			namespace: namespace.to_string(),
			image: container.and_then(|c| c.image.clone()),
			ports,
			config_refs: container.map_or(ConfigRefs::Undeclared, ConfigRefs::from_container),
			health: ReplicaHealth::from_status(deployment.status.as_ref()),
			route_host,
			service: service_name,
			service_matches,
			route_matches,
		}
	}
}

/// Correlate with the default positional selector rule.
pub fn correlate(
	deployments: &[Deployment],
	services: &[Service],
	ingresses: &[Ingress],
	namespace: &str,
) -> Vec<Workload> {
	Correlator::default().correlate(deployments, services, ingresses, namespace)
}
