//! Parsing of config map data from the command line.

use std::{collections::BTreeMap, fs, path::Path};

use serde_yaml_with_quirks::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataFileError {
	#[error("reading {path}")]
	Read {
		path: String,
		#[source]
		source: std::io::Error,
	},
	#[error("parsing {path}")]
	Parse {
		path: String,
		#[source]
		source: serde_yaml_with_quirks::Error,
	},
	#[error("{path}: expected a mapping of keys to scalar values")]
	NotAMapping { path: String },
	#[error("{path}: key {key:?} is not a scalar")]
	NonScalarKey { path: String, key: String },
	#[error("{path}: value of {key:?} is nested; only scalar values are allowed")]
	NestedValue { path: String, key: String },
	#[error("invalid --set entry {0:?}: expected KEY=VALUE")]
	InvalidPair(String),
	#[error("invalid --set entry {0:?}: key is empty")]
	EmptyKey(String),
}

fn scalar(value: &Value) -> Option<String> {
	match value {
		Value::Null => Some(String::new()),
		Value::Bool(b) => Some(b.to_string()),
		Value::Number(n) => Some(n.to_string()),
		Value::String(s) => Some(s.clone()),
		Value::Sequence(_) | Value::Mapping(_) => None,
	}
}

/// Parse a YAML or JSON mapping into config map data.
///
/// Scalars are stringified, `null` becomes an empty string. A blank document
/// yields empty data.
pub fn parse_data(content: &str, path: &str) -> Result<BTreeMap<String, String>, DataFileError> {
	// The YAML parser rejects a document without any node.
	if content.trim().is_empty() {
		return Ok(BTreeMap::new());
	}

	let value: Value =
		serde_yaml_with_quirks::from_str(content).map_err(|source| DataFileError::Parse {
			path: path.to_string(),
			source,
		})?;

	let mapping = match value {
		Value::Mapping(mapping) => mapping,
		// `~` or `null` alone clears the data too.
		Value::Null => return Ok(BTreeMap::new()),
		_ => {
			return Err(DataFileError::NotAMapping {
				path: path.to_string(),
			})
		}
	};

	let mut data = BTreeMap::new();
	for (key, value) in mapping {
		let key = scalar(&key).ok_or_else(|| DataFileError::NonScalarKey {
			path: path.to_string(),
			key: format!("{key:?}"),
		})?;
		let value = scalar(&value).ok_or_else(|| DataFileError::NestedValue {
			path: path.to_string(),
			key: key.clone(),
		})?;
		data.insert(key, value);
	}
	Ok(data)
}

/// Read config map data from a YAML or JSON file.
pub fn load_data_file(path: &Path) -> Result<BTreeMap<String, String>, DataFileError> {
	let display = path.display().to_string();
	let content = fs::read_to_string(path).map_err(|source| DataFileError::Read {
		path: display.clone(),
		source,
	})?;
	parse_data(&content, &display)
}

/// Parse `KEY=VALUE` pairs. Later keys win; the value may contain `=`.
pub fn parse_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<BTreeMap<String, String>, DataFileError> {
	let mut data = BTreeMap::new();
	for pair in pairs {
		let pair = pair.as_ref();
		let (key, value) = pair
			.split_once('=')
			.ok_or_else(|| DataFileError::InvalidPair(pair.to_string()))?;
		if key.is_empty() {
			return Err(DataFileError::EmptyKey(pair.to_string()));
		}
		data.insert(key.to_string(), value.to_string());
	}
	Ok(data)
}
