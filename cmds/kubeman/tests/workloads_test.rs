//! Integration tests for the workload view against a mock Kubernetes API server.

use std::path::Path;

use k8s_mock::HttpMockK8sServer;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kubeman::{
	commands::workloads::{list_workloads, show_workloads, WorkloadsOpts},
	correlate::{ConfigRefs, Correlator, ReplicaHealth, SelectorRule, Workload},
	k8s::{client::ClusterConnection, fetch::KubeCluster},
	output::{ColorMode, RowClass},
};

/// Load manifests from YAML files in a directory.
fn load_manifests_from_dir(dir: &Path) -> Vec<serde_json::Value> {
	let mut entries: Vec<_> = std::fs::read_dir(dir)
		.expect("failed to read dir")
		.filter_map(|e| e.ok())
		.filter(|e| e.path().extension().is_some_and(|ext| ext == "yaml"))
		.collect();
	entries.sort_by_key(|e| e.path());

	entries
		.iter()
		.map(|entry| {
			let content = std::fs::read_to_string(entry.path()).expect("failed to read file");
			serde_yaml::from_str(&content).expect("failed to parse YAML")
		})
		.collect()
}

async fn cluster() -> (k8s_mock::RunningHttpMockK8sServer, KubeCluster) {
	let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/workloads");
	let server = HttpMockK8sServer::builder()
		.resources(load_manifests_from_dir(&fixtures))
		.build()
		.start()
		.await;

	let conn = ClusterConnection::from_kubeconfig(server.kubeconfig(), None)
		.await
		.expect("connection should succeed");
	let api = KubeCluster::from(&conn);
	(server, api)
}

fn by_deployment<'a>(workloads: &'a [Workload], name: &str) -> &'a Workload {
	workloads
		.iter()
		.find(|w| w.deployment == name)
		.unwrap_or_else(|| panic!("no workload for deployment {name}"))
}

#[tokio::test]
async fn test_workloads_are_correlated() {
	let (_server, api) = cluster().await;

	let workloads = list_workloads(&api, "application", &Correlator::default())
		.await
		.expect("listing should succeed");
	assert_eq!(workloads.len(), 3);

	let web = by_deployment(&workloads, "web");
	assert_eq!(web.name, "web");
	assert_eq!(web.image.as_deref(), Some("nginx:1.25"));
	assert_eq!(web.health, ReplicaHealth::Known { available: 2, desired: 3 });
	assert_eq!(web.health.to_string(), "2/3");
	assert_eq!(web.config_refs.to_string(), "app-cfg,feature-flags");
	assert_eq!(web.service.as_deref(), Some("web-svc"));
	assert_eq!(web.route_host.as_deref(), Some("web.example.com"));

	let ports = web.port_columns();
	assert_eq!(ports.name, vec![Some("http".to_string()), Some("metrics".to_string())]);
	assert_eq!(ports.port, vec![Some(80), Some(9090)]);
	assert_eq!(ports.node_port, vec![Some(30080), None]);
	assert_eq!(ports.app_protocol, vec![Some("http".to_string()), None]);
	assert_eq!(
		ports.target_port,
		vec![
			Some(IntOrString::Int(8080)),
			Some(IntOrString::String("metrics".to_string()))
		]
	);
}

#[tokio::test]
async fn test_missing_status_is_unknown_not_zero() {
	let (_server, api) = cluster().await;

	let workloads = list_workloads(&api, "application", &Correlator::default())
		.await
		.unwrap();

	let worker = by_deployment(&workloads, "worker");
	assert_eq!(worker.health, ReplicaHealth::Unknown);
	assert_eq!(worker.health.to_string(), "N/A");
	assert_eq!(RowClass::of(&worker.health), RowClass::Normal);

	let paused = by_deployment(&workloads, "paused");
	assert_eq!(paused.health.to_string(), "0/0");
	assert_eq!(RowClass::of(&paused.health), RowClass::Closed);
}

#[tokio::test]
async fn test_unmatched_service_leaves_ports_and_host_empty() {
	let (_server, api) = cluster().await;

	let workloads = list_workloads(&api, "application", &Correlator::default())
		.await
		.unwrap();

	// worker-svc selects the worker, but it lives in another namespace.
	let worker = by_deployment(&workloads, "worker");
	assert!(worker.ports.is_empty());
	assert_eq!(worker.route_host, None);
	assert_eq!(worker.config_refs, ConfigRefs::Undeclared);
}

#[tokio::test]
async fn test_second_ingress_rule_is_not_reflected() {
	let (_server, api) = cluster().await;

	let workloads = list_workloads(&api, "application", &Correlator::default())
		.await
		.unwrap();

	let paused = by_deployment(&workloads, "paused");
	assert_eq!(paused.service.as_deref(), Some("paused-svc"));
	assert_eq!(paused.route_host, None);
	assert_eq!(paused.config_refs, ConfigRefs::Declared(vec![]));
	assert_eq!(paused.config_refs.to_string(), "N/A");
}

#[tokio::test]
async fn test_namespace_scopes_deployments() {
	let (_server, api) = cluster().await;

	let workloads = list_workloads(&api, "other", &Correlator::default())
		.await
		.unwrap();

	assert_eq!(workloads.len(), 1);
	assert_eq!(workloads[0].image.as_deref(), Some("nginx:1.24"));
	assert_eq!(workloads[0].service, None);

	let empty = list_workloads(&api, "nowhere", &Correlator::default())
		.await
		.unwrap();
	assert!(empty.is_empty());
}

#[tokio::test]
async fn test_label_selector_rule() {
	let (_server, api) = cluster().await;

	let by_label = Correlator::new(SelectorRule::Label("app".to_string()));
	let workloads = list_workloads(&api, "application", &by_label).await.unwrap();
	assert_eq!(
		by_deployment(&workloads, "web").service.as_deref(),
		Some("web-svc")
	);

	let wrong_label = Correlator::new(SelectorRule::Label("tier".to_string()));
	let workloads = list_workloads(&api, "application", &wrong_label)
		.await
		.unwrap();
	assert!(workloads.iter().all(|w| w.service.is_none()));
}

#[tokio::test]
async fn test_show_workloads_table() {
	let (_server, api) = cluster().await;

	let mut out = Vec::new();
	show_workloads(
		&api,
		"application",
		&Correlator::default(),
		WorkloadsOpts {
			json: false,
			color: ColorMode::Never,
		},
		&mut out,
	)
	.await
	.unwrap();

	let text = String::from_utf8(out).unwrap();
	let lines: Vec<&str> = text.lines().collect();
	assert_eq!(lines.len(), 4, "{text}");
	assert!(lines[0].starts_with("DEPLOYMENT"));

	let web = lines
		.iter()
		.find(|l| l.starts_with("web "))
		.expect("web row");
	assert!(web.contains("http,metrics"), "{web}");
	assert!(web.contains("80,9090"), "{web}");
	assert!(web.contains("30080,-"), "{web}");
	assert!(web.contains("8080,metrics"), "{web}");
}
