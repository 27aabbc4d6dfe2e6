//! Kinds known to the mock server.

/// A served resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockKind {
	pub api_version: &'static str,
	pub kind: &'static str,
	/// Plural resource name used in URLs.
	pub plural: &'static str,
	pub namespaced: bool,
}

impl MockKind {
	const fn namespaced(api_version: &'static str, kind: &'static str, plural: &'static str) -> Self {
		Self {
			api_version,
			kind,
			plural,
			namespaced: true,
		}
	}

	const fn cluster_scoped(
		api_version: &'static str,
		kind: &'static str,
		plural: &'static str,
	) -> Self {
		Self {
			api_version,
			kind,
			plural,
			namespaced: false,
		}
	}

	/// URL prefix of the kind's group version, `/api/v1` or `/apis/<group>/<version>`.
	pub fn prefix(&self) -> String {
		if self.api_version.contains('/') {
			format!("/apis/{}", self.api_version)
		} else {
			format!("/api/{}", self.api_version)
		}
	}

	/// Collection path holding objects of this kind in `namespace`.
	///
	/// `namespace` is ignored for cluster-scoped kinds.
	pub fn collection(&self, namespace: Option<&str>) -> String {
		match (self.namespaced, namespace) {
			(true, Some(ns)) => format!("{}/namespaces/{}/{}", self.prefix(), ns, self.plural),
			_ => format!("{}/{}", self.prefix(), self.plural),
		}
	}
}

pub const NAMESPACE: MockKind = MockKind::cluster_scoped("v1", "Namespace", "namespaces");
pub const CONFIG_MAP: MockKind = MockKind::namespaced("v1", "ConfigMap", "configmaps");

/// Every kind the server answers for.
pub const KINDS: &[MockKind] = &[
	NAMESPACE,
	CONFIG_MAP,
	MockKind::namespaced("v1", "Service", "services"),
	MockKind::namespaced("apps/v1", "Deployment", "deployments"),
	MockKind::namespaced("networking.k8s.io/v1", "Ingress", "ingresses"),
];

/// Look a kind up by `apiVersion` and `kind`.
pub fn by_kind(api_version: &str, kind: &str) -> Option<&'static MockKind> {
	KINDS
		.iter()
		.find(|k| k.api_version == api_version && k.kind == kind)
}

/// Look a kind up by URL prefix and plural name.
pub fn by_plural(prefix: &str, plural: &str) -> Option<&'static MockKind> {
	KINDS
		.iter()
		.find(|k| k.plural == plural && k.prefix() == prefix)
}
