//! HTTP-based mock Kubernetes server using wiremock.
//!
//! This provides a real HTTP server that can be used with actual kubeconfig-based
//! connections. Objects are kept in memory, so a replacement made through the
//! API is visible to later reads.

use std::{
	collections::BTreeMap,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc, RwLock,
	},
};

use bon::Builder;
use kube::config::{
	AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext,
};
use serde_json::{json, Value};
use tracing::{debug, trace, warn};
use wiremock::{
	matchers::{method, path, path_regex},
	Mock, MockServer, Request, ResponseTemplate,
};

use crate::kinds::{self, MockKind, CONFIG_MAP, NAMESPACE};

/// Storage key: kind collection (cluster-wide form), namespace ("" when
/// cluster-scoped), name. Ordering matches the API server's listing order.
type Key = (String, String, String);

struct State {
	objects: RwLock<BTreeMap<Key, Value>>,
	revision: AtomicU64,
	fail_namespace_list: bool,
	failing_reads: Vec<String>,
	failing_writes: Vec<String>,
}

impl State {
	fn next_revision(&self) -> String {
		(self.revision.fetch_add(1, Ordering::SeqCst) + 1).to_string()
	}
}

/// A mock Kubernetes server exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	/// Resources to serve as raw manifests. The server derives API paths from
	/// apiVersion/kind.
	#[builder(default)]
	resources: Vec<Value>,
	/// Extra namespaces. Namespaces of namespaced resources are created anyway.
	#[builder(default)]
	namespaces: Vec<String>,
	/// Answer namespace listing with 403.
	#[builder(default)]
	fail_namespace_list: bool,
	/// Namespaces where reading a single config map answers 403.
	#[builder(default)]
	failing_reads: Vec<String>,
	/// Namespaces where replacing a config map answers 403.
	#[builder(default)]
	failing_writes: Vec<String>,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
	state: Arc<State>,
}

fn key(kind: &MockKind, namespace: Option<&str>, name: &str) -> Key {
	let namespace = if kind.namespaced {
		namespace.unwrap_or("default")
	} else {
		""
	};
	(
		kind.collection(None),
		namespace.to_string(),
		name.to_string(),
	)
}

fn namespace_object(name: &str) -> Value {
	json!({
		"apiVersion": "v1",
		"kind": "Namespace",
		"metadata": {"name": name, "resourceVersion": "1"},
		"status": {"phase": "Active"}
	})
}

impl HttpMockK8sServer {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;
		debug!(uri = %server.uri(), "Started mock K8s server");

		let mut objects = BTreeMap::new();
		let mut namespaces = self.namespaces;

		for mut manifest in self.resources {
			let Some((kind, namespace, name)) = identify(&manifest) else {
				warn!(manifest = %manifest, "Ignoring resource of unknown kind");
				continue;
			};
			if kind.namespaced {
				let ns = namespace.clone().unwrap_or_else(|| "default".to_string());
				manifest["metadata"]["namespace"] = json!(ns);
				namespaces.push(ns);
			}
			if manifest["metadata"]["resourceVersion"].is_null() {
				manifest["metadata"]["resourceVersion"] = json!("1");
			}
			trace!(kind = kind.kind, name = %name, "Registered resource");
			objects.insert(key(kind, namespace.as_deref(), &name), manifest);
		}

		for ns in namespaces {
			objects
				.entry(key(&NAMESPACE, None, &ns))
				.or_insert_with(|| namespace_object(&ns));
		}

		let state = Arc::new(State {
			objects: RwLock::new(objects),
			revision: AtomicU64::new(1),
			fail_namespace_list: self.fail_namespace_list,
			failing_reads: self.failing_reads,
			failing_writes: self.failing_writes,
		});

		mount_version(&server).await;
		mount_resources(&server, &state).await;

		RunningHttpMockK8sServer { server, state }
	}
}

fn identify(manifest: &Value) -> Option<(&'static MockKind, Option<String>, String)> {
	let api_version = manifest.get("apiVersion")?.as_str()?;
	let kind = manifest.get("kind")?.as_str()?;
	let name = manifest.pointer("/metadata/name")?.as_str()?.to_string();
	let namespace = manifest
		.pointer("/metadata/namespace")
		.and_then(Value::as_str)
		.map(str::to_string);
	Some((kinds::by_kind(api_version, kind)?, namespace, name))
}

impl RunningHttpMockK8sServer {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// Create a Kubeconfig pointing to this mock server.
	pub fn kubeconfig(&self) -> Kubeconfig {
		self.kubeconfig_with_context("mock-context")
	}

	/// Create a Kubeconfig pointing to this mock server with a custom context name.
	pub fn kubeconfig_with_context(&self, context_name: &str) -> Kubeconfig {
		let cluster_name = "mock-cluster";
		let user_name = "mock-user";

		Kubeconfig {
			clusters: vec![NamedCluster {
				name: cluster_name.to_string(),
				cluster: Some(Cluster {
					server: Some(self.uri()),
					insecure_skip_tls_verify: Some(true),
					..Default::default()
				}),
			}],
			contexts: vec![NamedContext {
				name: context_name.to_string(),
				context: Some(Context {
					cluster: cluster_name.to_string(),
					user: Some(user_name.to_string()),
					namespace: Some("default".to_string()),
					..Default::default()
				}),
			}],
			auth_infos: vec![NamedAuthInfo {
				name: user_name.to_string(),
				auth_info: Some(AuthInfo::default()),
			}],
			current_context: Some(context_name.to_string()),
			..Default::default()
		}
	}

	/// Current stored state of an object.
	pub fn object(
		&self,
		api_version: &str,
		kind: &str,
		namespace: Option<&str>,
		name: &str,
	) -> Option<Value> {
		let kind = kinds::by_kind(api_version, kind)?;
		let objects = self.state.objects.read().unwrap();
		objects.get(&key(kind, namespace, name)).cloned()
	}

	/// Current `data` of a config map. A config map without data gives an empty object.
	pub fn config_map_data(&self, namespace: &str, name: &str) -> Option<Value> {
		let config_map = self.object("v1", "ConfigMap", Some(namespace), name)?;
		Some(config_map.get("data").cloned().unwrap_or_else(|| json!({})))
	}

	/// Number of requests received with the given HTTP method.
	pub async fn request_count(&self, http_method: &str) -> usize {
		self.server
			.received_requests()
			.await
			.unwrap_or_default()
			.iter()
			.filter(|req| req.method.as_str() == http_method)
			.count()
	}
}

async fn mount_version(server: &MockServer) {
	Mock::given(method("GET"))
		.and(path("/version"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"major": "1",
			"minor": "31",
			"gitVersion": "v1.31.0",
			"gitCommit": "fake",
			"gitTreeState": "clean",
			"buildDate": "2024-01-01T00:00:00Z",
			"goVersion": "go1.22.0",
			"compiler": "gc",
			"platform": "linux/amd64"
		})))
		.mount(server)
		.await;
}

/// What a request path refers to.
#[derive(Debug, PartialEq, Eq)]
enum Target {
	List {
		kind: &'static MockKind,
		namespace: Option<String>,
	},
	Object {
		kind: &'static MockKind,
		namespace: Option<String>,
		name: String,
	},
}

/// Parse a Kubernetes API path.
///
/// Examples:
/// - `/api/v1/configmaps` -> list config maps in every namespace
/// - `/api/v1/namespaces` -> list namespaces
/// - `/api/v1/namespaces/ns1` -> namespace `ns1`
/// - `/apis/apps/v1/namespaces/ns1/deployments` -> list deployments in `ns1`
/// - `/api/v1/namespaces/ns1/configmaps/app-cfg` -> config map `ns1/app-cfg`
fn parse_target(url_path: &str) -> Option<Target> {
	let segments: Vec<&str> = url_path
		.trim_matches('/')
		.split('/')
		.filter(|s| !s.is_empty())
		.collect();

	let (prefix, rest) = match segments.as_slice() {
		["api", version, rest @ ..] => (format!("/api/{version}"), rest),
		["apis", group, version, rest @ ..] => (format!("/apis/{group}/{version}"), rest),
		_ => return None,
	};

	match rest {
		[plural] => Some(Target::List {
			kind: kinds::by_plural(&prefix, plural)?,
			namespace: None,
		}),
		[plural, name] => {
			let kind = kinds::by_plural(&prefix, plural)?;
			(!kind.namespaced).then(|| Target::Object {
				kind,
				namespace: None,
				name: (*name).to_string(),
			})
		}
		["namespaces", ns, plural] => Some(Target::List {
			kind: kinds::by_plural(&prefix, plural)?,
			namespace: Some((*ns).to_string()),
		}),
		["namespaces", ns, plural, name] => Some(Target::Object {
			kind: kinds::by_plural(&prefix, plural)?,
			namespace: Some((*ns).to_string()),
			name: (*name).to_string(),
		}),
		_ => None,
	}
}

fn status(code: u16, reason: &str, message: String) -> ResponseTemplate {
	ResponseTemplate::new(code).set_body_json(json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": message,
		"reason": reason,
		"code": code
	}))
}

fn forbidden(verb: &str, kind: &MockKind, namespace: Option<&str>) -> ResponseTemplate {
	let scope = namespace.map_or_else(
		|| "at the cluster scope".to_string(),
		|ns| format!("in the namespace \"{ns}\""),
	);
	status(
		403,
		"Forbidden",
		format!(
			"{} is forbidden: User \"mock-user\" cannot {verb} resource \"{}\" {scope}",
			kind.plural, kind.plural
		),
	)
}

fn not_found(kind: &MockKind, name: &str) -> ResponseTemplate {
	status(
		404,
		"NotFound",
		format!("{} \"{name}\" not found", kind.plural),
	)
}

fn handle_get(state: &State, target: Target) -> ResponseTemplate {
	let objects = state.objects.read().unwrap();
	match target {
		Target::List { kind, namespace } => {
			if state.fail_namespace_list && *kind == NAMESPACE {
				return forbidden("list", kind, None);
			}
			let collection = kind.collection(None);
			let items: Vec<Value> = objects
				.iter()
				.filter(|((c, ns, _), _)| {
					*c == collection && namespace.as_deref().map_or(true, |want| ns == want)
				})
				.map(|(_, v)| v.clone())
				.collect();

			ResponseTemplate::new(200).set_body_json(json!({
				"kind": format!("{}List", kind.kind),
				"apiVersion": kind.api_version,
				"metadata": {"resourceVersion": state.revision.load(Ordering::SeqCst).to_string()},
				"items": items
			}))
		}
		Target::Object {
			kind,
			namespace,
			name,
		} => {
			if *kind == CONFIG_MAP
				&& namespace
					.as_deref()
					.is_some_and(|ns| state.failing_reads.iter().any(|f| f == ns))
			{
				return forbidden("get", kind, namespace.as_deref());
			}
			match objects.get(&key(kind, namespace.as_deref(), &name)) {
				Some(object) => ResponseTemplate::new(200).set_body_json(object.clone()),
				None => not_found(kind, &name),
			}
		}
	}
}

fn handle_put(state: &State, target: Target, body: &[u8]) -> ResponseTemplate {
	let Target::Object {
		kind,
		namespace,
		name,
	} = target
	else {
		return status(405, "MethodNotAllowed", "PUT on a collection".to_string());
	};

	if namespace
		.as_deref()
		.is_some_and(|ns| state.failing_writes.iter().any(|f| f == ns))
	{
		return forbidden("update", kind, namespace.as_deref());
	}

	let mut object: Value = match serde_json::from_slice(body) {
		Ok(v) => v,
		Err(e) => return status(400, "BadRequest", format!("invalid body: {e}")),
	};

	let mut objects = state.objects.write().unwrap();
	let key = key(kind, namespace.as_deref(), &name);
	let Some(existing) = objects.get(&key) else {
		return not_found(kind, &name);
	};

	// An empty resourceVersion makes the update unconditional.
	let sent_version = object
		.pointer("/metadata/resourceVersion")
		.and_then(Value::as_str)
		.filter(|v| !v.is_empty());
	let stored_version = existing
		.pointer("/metadata/resourceVersion")
		.and_then(Value::as_str);
	if let Some(sent) = sent_version {
		if Some(sent) != stored_version {
			return status(
				409,
				"Conflict",
				format!(
					"Operation cannot be fulfilled on {} \"{name}\": the object has been modified",
					kind.plural
				),
			);
		}
	}

	object["metadata"]["name"] = json!(name);
	if let Some(ns) = &namespace {
		object["metadata"]["namespace"] = json!(ns);
	}
	object["metadata"]["resourceVersion"] = json!(state.next_revision());

	trace!(kind = kind.kind, name = %name, "Replaced resource");
	objects.insert(key, object.clone());
	ResponseTemplate::new(200).set_body_json(object)
}

async fn mount_resources(server: &MockServer, state: &Arc<State>) {
	let get_state = Arc::clone(state);
	let put_state = Arc::clone(state);

	// GET endpoints - handles both single resource and LIST
	Mock::given(method("GET"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| match parse_target(req.url.path()) {
			Some(target) => handle_get(&get_state, target),
			None => status(404, "NotFound", format!("no route for {}", req.url.path())),
		})
		.mount(server)
		.await;

	// PUT replaces an existing object
	Mock::given(method("PUT"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| match parse_target(req.url.path()) {
			Some(target) => handle_put(&put_state, target, &req.body),
			None => status(404, "NotFound", format!("no route for {}", req.url.path())),
		})
		.mount(server)
		.await;
}
