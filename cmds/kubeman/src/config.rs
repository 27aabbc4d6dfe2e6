//! Configuration file support for kubeman
//!
//! Supports `.kubeman.yaml` files that can be placed anywhere in the directory
//! hierarchy. kubeman searches from the current directory upward to the filesystem root.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{correlate::SelectorRule, k8s::client::ConnectOptions};

/// The name of the config file kubeman looks for
pub const CONFIG_FILE_NAME: &str = ".kubeman.yaml";

/// Namespace used when neither the flag nor the config file names one
pub const DEFAULT_NAMESPACE: &str = "application";

/// Root configuration structure for .kubeman.yaml
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KubemanConfig {
	/// Namespace the workload view reads from
	#[serde(default)]
	pub namespace: Option<String>,

	/// Label key used to match services to deployments.
	///
	/// When unset, the first selector entry (by key order) is used.
	#[serde(default)]
	pub selector_label: Option<String>,

	/// Number of namespaces reconciled at once
	#[serde(default)]
	pub concurrency: Option<usize>,

	/// Kubeconfig context
	#[serde(default)]
	pub context: Option<String>,

	/// Kubeconfig path
	#[serde(default)]
	pub kubeconfig: Option<PathBuf>,
}

impl KubemanConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		if let Some(config_path) = find_config_file(start_dir) {
			let config = Self::load_from_file(&config_path)?;
			Ok(Some(config))
		} else {
			Ok(None)
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		let config: KubemanConfig = serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;
		Ok(config)
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let mut current = start_dir.to_path_buf();

	if let Ok(canonical) = current.canonicalize() {
		current = canonical;
	}

	loop {
		let config_path = current.join(CONFIG_FILE_NAME);
		if config_path.exists() {
			return Some(config_path);
		}

		match current.parent() {
			Some(parent) if parent != current => current = parent.to_path_buf(),
			_ => break,
		}
	}

	None
}

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	pub namespace: Option<String>,
	pub selector_label: Option<String>,
	pub concurrency: Option<usize>,
	pub context: Option<String>,
	pub kubeconfig: Option<PathBuf>,
}

/// Effective settings after merging flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	pub namespace: String,
	pub selector: SelectorRule,
	pub concurrency: usize,
	pub connect: ConnectOptions,
}

impl Settings {
	/// Flags win over file values, file values win over defaults.
	pub fn resolve(file: Option<KubemanConfig>, overrides: Overrides) -> Self {
		let file = file.unwrap_or_default();

		let selector = match overrides.selector_label.or(file.selector_label) {
			Some(label) => SelectorRule::Label(label),
			None => SelectorRule::FirstValue,
		};

		Self {
			namespace: overrides
				.namespace
				.or(file.namespace)
				.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
			selector,
			concurrency: overrides.concurrency.or(file.concurrency).unwrap_or(1).max(1),
			connect: ConnectOptions {
				kubeconfig: overrides.kubeconfig.or(file.kubeconfig),
				context: overrides.context.or(file.context),
			},
		}
	}

	/// Load the config file found from the current directory and merge `overrides`.
	pub fn load(overrides: Overrides) -> Result<Self> {
		let cwd = std::env::current_dir().context("getting current directory")?;
		let file = match find_config_file(&cwd) {
			Some(path) => {
				tracing::debug!(path = %path.display(), "loading config file");
				Some(KubemanConfig::load_from_file(&path)?)
			}
			None => None,
		};
		Ok(Self::resolve(file, overrides))
	}
}

#[cfg(test)]
mod tests {
	use indoc::indoc;
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn test_find_config_in_parent_dir() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(&config_path, "namespace: staging\n").unwrap();

		let subdir = temp.path().join("a").join("b");
		fs::create_dir_all(&subdir).unwrap();

		let found = find_config_file(&subdir);
		// Compare file names only to avoid canonicalization issues on macOS
		assert!(found.is_some());
		assert_eq!(found.unwrap().file_name(), config_path.file_name());
	}

	#[test]
	fn test_no_config_found() {
		let temp = TempDir::new().unwrap();
		assert!(KubemanConfig::load_from_directory(temp.path())
			.unwrap()
			.is_none());
	}

	#[test]
	fn test_load_all_keys() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(
			&config_path,
			indoc! {"
				namespace: staging
				selectorLabel: app.kubernetes.io/name
				concurrency: 4
				context: prod
				kubeconfig: /etc/kube/config
			"},
		)
		.unwrap();

		let config = KubemanConfig::load_from_file(&config_path).unwrap();
		assert_eq!(
			config,
			KubemanConfig {
				namespace: Some("staging".to_string()),
				selector_label: Some("app.kubernetes.io/name".to_string()),
				concurrency: Some(4),
				context: Some("prod".to_string()),
				kubeconfig: Some(PathBuf::from("/etc/kube/config")),
			}
		);
	}

	#[test]
	fn test_load_rejects_unknown_keys() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(&config_path, "namespaces: typo\n").unwrap();

		let err = KubemanConfig::load_from_file(&config_path).unwrap_err();
		assert!(err.to_string().contains("failed to parse config file"));
	}

	#[test]
	fn test_resolve_defaults() {
		let settings = Settings::resolve(None, Overrides::default());
		assert_eq!(settings.namespace, DEFAULT_NAMESPACE);
		assert_eq!(settings.selector, SelectorRule::FirstValue);
		assert_eq!(settings.concurrency, 1);
		assert_eq!(settings.connect, ConnectOptions::default());
	}

	#[test]
	fn test_resolve_flags_override_file() {
		let file = KubemanConfig {
			namespace: Some("staging".to_string()),
			selector_label: Some("app".to_string()),
			concurrency: Some(4),
			context: Some("prod".to_string()),
			kubeconfig: None,
		};
		let overrides = Overrides {
			namespace: Some("dev".to_string()),
			concurrency: Some(0),
			..Default::default()
		};

		let settings = Settings::resolve(Some(file), overrides);
		assert_eq!(settings.namespace, "dev");
		assert_eq!(settings.selector, SelectorRule::Label("app".to_string()));
		// Zero is clamped: at least one namespace is processed at a time.
		assert_eq!(settings.concurrency, 1);
		assert_eq!(settings.connect.context.as_deref(), Some("prod"));
	}
}
