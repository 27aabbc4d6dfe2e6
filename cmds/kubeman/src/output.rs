//! Terminal rendering of workloads, config maps and reconcile reports.
//!
//! Tables are aligned with `tabwriter`. Workload rows are coloured by their
//! replica health: dimmed when scaled to zero, red when nothing is available.

use std::{
	error::Error as StdError,
	fmt::Display,
	io::{self, IsTerminal, Write},
};

use clap::ValueEnum;
use nu_ansi_term::{Color, Style};
use serde::Serialize;
use tabwriter::TabWriter;

use crate::{
	correlate::{ReplicaHealth, Workload},
	reconcile::{Outcome, ReconcileReport},
	registry::ConfigLookup,
};

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
	/// Color when stdout is a terminal.
	#[default]
	Auto,
	Always,
	Never,
}

impl ColorMode {
	pub fn enabled(self) -> bool {
		match self {
			ColorMode::Auto => io::stdout().is_terminal(),
			ColorMode::Always => true,
			ColorMode::Never => false,
		}
	}
}

/// Display class of a workload row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClass {
	Normal,
	/// Replicas wanted but none available.
	Down,
	/// Scaled to zero.
	Closed,
}

impl RowClass {
	pub fn of(health: &ReplicaHealth) -> Self {
		match health {
			ReplicaHealth::Known {
				available: 0,
				desired: 0,
			} => RowClass::Closed,
			ReplicaHealth::Known { available: 0, .. } => RowClass::Down,
			_ => RowClass::Normal,
		}
	}

	fn style(self) -> Option<Style> {
		match self {
			RowClass::Normal => None,
			RowClass::Down => Some(Style::new().fg(Color::Rgb(255, 100, 100))),
			RowClass::Closed => Some(Style::new().fg(Color::Rgb(100, 100, 100))),
		}
	}
}

const WORKLOAD_HEADER: [&str; 11] = [
	"DEPLOYMENT",
	"IMAGE",
	"CONFIGMAP",
	"STATUS",
	"HOST",
	"APP PROTOCOL",
	"PORT NAME",
	"NODE PORT",
	"PORT",
	"PROTOCOL",
	"TARGET PORT",
];

const NONE: &str = "<none>";

fn column<T: Display>(values: &[Option<T>]) -> String {
	if values.is_empty() {
		return NONE.to_string();
	}
	values
		.iter()
		.map(|v| v.as_ref().map_or_else(|| "-".to_string(), ToString::to_string))
		.collect::<Vec<_>>()
		.join(",")
}

fn target_port_display(port: &k8s_openapi::apimachinery::pkg::util::intstr::IntOrString) -> String {
	use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
	match port {
		IntOrString::Int(n) => n.to_string(),
		IntOrString::String(s) => s.clone(),
	}
}

fn workload_cells(workload: &Workload) -> Vec<String> {
	let ports = workload.port_columns();
	let target_ports: Vec<Option<String>> = ports
		.target_port
		.iter()
		.map(|p| p.as_ref().map(target_port_display))
		.collect();

	vec![
		workload.name.clone(),
		workload.image.clone().unwrap_or_else(|| NONE.to_string()),
		workload.config_refs.to_string(),
		workload.health.to_string(),
		workload.route_host.clone().unwrap_or_else(|| NONE.to_string()),
		column(&ports.app_protocol),
		column(&ports.name),
		column(&ports.node_port),
		column(&ports.port),
		column(&ports.protocol),
		column(&target_ports),
	]
}

/// Write workloads as an aligned table.
pub fn write_workloads<W: Write>(workloads: &[Workload], color: bool, writer: W) -> io::Result<()> {
	let mut tw = TabWriter::new(writer).padding(2).ansi(color);
	writeln!(tw, "{}", WORKLOAD_HEADER.join("\t"))?;

	for workload in workloads {
		let line = workload_cells(workload).join("\t");
		match RowClass::of(&workload.health).style().filter(|_| color) {
			Some(style) => writeln!(tw, "{}", style.paint(line))?,
			None => writeln!(tw, "{line}")?,
		}
	}
	tw.flush()
}

/// Write config map names, one per line.
pub fn write_names<W: Write>(names: &[String], mut writer: W) -> io::Result<()> {
	for name in names {
		writeln!(writer, "{name}")?;
	}
	writer.flush()
}

fn escape_cell(value: &str) -> String {
	value.replace('\t', "\\t").replace('\n', "\\n")
}

/// Write config map data as a key/value table. `None` prints an empty table.
pub fn write_config_data<W: Write>(lookup: Option<&ConfigLookup>, writer: W) -> io::Result<()> {
	let mut tw = TabWriter::new(writer).padding(2);
	writeln!(tw, "KEY\tVALUE")?;
	if let Some(lookup) = lookup {
		for (key, value) in &lookup.data {
			writeln!(tw, "{}\t{}", escape_cell(key), escape_cell(value))?;
		}
	}
	tw.flush()
}

/// Render an error with its chain of causes, `a: b: c`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
	let mut parts = vec![err.to_string()];
	let mut source = err.source();
	while let Some(cause) = source {
		parts.push(cause.to_string());
		source = cause.source();
	}
	parts.join(": ")
}

fn outcome_detail(outcome: &Outcome) -> Option<String> {
	match outcome {
		Outcome::Failed(err) => Some(error_chain(err)),
		_ => None,
	}
}

/// Write a reconcile report as a table followed by its summary line.
pub fn write_report<W: Write>(report: &ReconcileReport, writer: W) -> io::Result<()> {
	let mut tw = TabWriter::new(writer).padding(2);
	writeln!(tw, "NAMESPACE\tOUTCOME\tDETAIL")?;
	for entry in report.entries() {
		writeln!(
			tw,
			"{}\t{}\t{}",
			entry.namespace,
			entry.outcome,
			outcome_detail(&entry.outcome).unwrap_or_default()
		)?;
	}
	writeln!(tw)?;
	writeln!(tw, "configmap/{}: {}", report.name(), report.summary())?;
	tw.flush()
}

#[derive(Serialize)]
struct ReportEntryJson<'a> {
	namespace: &'a str,
	outcome: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<String>,
}

#[derive(Serialize)]
struct ReportJson<'a> {
	name: &'a str,
	summary: String,
	entries: Vec<ReportEntryJson<'a>>,
}

/// Write a reconcile report as JSON.
pub fn write_report_json<W: Write>(report: &ReconcileReport, writer: W) -> serde_json::Result<()> {
	let json = ReportJson {
		name: report.name(),
		summary: report.summary().to_string(),
		entries: report
			.entries()
			.iter()
			.map(|entry| ReportEntryJson {
				namespace: &entry.namespace,
				outcome: entry.outcome.label(),
				error: outcome_detail(&entry.outcome),
			})
			.collect(),
	};
	write_json(&json, writer)
}

/// Write any serializable value as pretty JSON followed by a newline.
pub fn write_json<T: Serialize + ?Sized, W: Write>(value: &T, mut writer: W) -> serde_json::Result<()> {
	serde_json::to_writer_pretty(&mut writer, value)?;
	writeln!(writer).map_err(serde_json::Error::io)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use indoc::indoc;
	use rstest::rstest;

	use super::*;
	use crate::correlate::{ConfigRefs, PortBinding};

	fn workload(health: ReplicaHealth) -> Workload {
		Workload {
			name: "web".to_string(),
			deployment: "web".to_string(),
			namespace: "application".to_string(),
			image: Some("nginx:1.25".to_string()),
			ports: vec![PortBinding {
				name: Some("http".to_string()),
				port: Some(80),
				protocol: Some("TCP".to_string()),
				..Default::default()
			}],
			config_refs: ConfigRefs::Declared(vec!["app-cfg".to_string()]),
			health,
			route_host: Some("web.example.com".to_string()),
			service: Some("web-svc".to_string()),
			service_matches: 1,
			route_matches: 1,
		}
	}

	#[rstest]
	#[case(ReplicaHealth::Known { available: 0, desired: 0 }, RowClass::Closed)]
	#[case(ReplicaHealth::Known { available: 0, desired: 3 }, RowClass::Down)]
	#[case(ReplicaHealth::Known { available: 1, desired: 3 }, RowClass::Normal)]
	#[case(ReplicaHealth::Known { available: 3, desired: 3 }, RowClass::Normal)]
	#[case(ReplicaHealth::Unknown, RowClass::Normal)]
	fn test_row_class(#[case] health: ReplicaHealth, #[case] expected: RowClass) {
		assert_eq!(RowClass::of(&health), expected);
	}

	#[test]
	fn test_row_class_is_recomputed_per_value() {
		// A row that was down renders normally once replicas come back.
		let mut w = workload(ReplicaHealth::Known {
			available: 0,
			desired: 2,
		});
		assert_eq!(RowClass::of(&w.health), RowClass::Down);
		w.health = ReplicaHealth::Known {
			available: 2,
			desired: 2,
		};
		assert_eq!(RowClass::of(&w.health), RowClass::Normal);
	}

	#[test]
	fn test_write_workloads_plain() {
		let mut out = Vec::new();
		let mut bare = workload(ReplicaHealth::Unknown);
		bare.ports.clear();
		bare.route_host = None;
		bare.config_refs = ConfigRefs::Undeclared;

		write_workloads(
			&[
				workload(ReplicaHealth::Known {
					available: 1,
					desired: 1,
				}),
				bare,
			],
			false,
			&mut out,
		)
		.unwrap();

		let text = String::from_utf8(out).unwrap();
		let lines: Vec<Vec<&str>> = text
			.lines()
			.map(|l| l.split("  ").map(str::trim).filter(|c| !c.is_empty()).collect())
			.collect();

		assert_eq!(lines[0][0], "DEPLOYMENT");
		assert_eq!(
			lines[1],
			vec![
				"web",
				"nginx:1.25",
				"app-cfg",
				"1/1",
				"web.example.com",
				"-",
				"http",
				"-",
				"80",
				"TCP",
				"-"
			]
		);
		assert_eq!(
			lines[2],
			vec![
				"web", "nginx:1.25", "N/A", "N/A", "<none>", "<none>", "<none>", "<none>", "<none>",
				"<none>", "<none>"
			]
		);
	}

	#[test]
	fn test_write_workloads_colors_down_rows() {
		let mut out = Vec::new();
		write_workloads(
			&[workload(ReplicaHealth::Known {
				available: 0,
				desired: 2,
			})],
			true,
			&mut out,
		)
		.unwrap();

		let text = String::from_utf8(out).unwrap();
		assert!(text.contains("\u{1b}[38;2;255;100;100m"), "{text:?}");
	}

	#[test]
	fn test_write_config_data() {
		let lookup = ConfigLookup {
			namespace: "ns1".to_string(),
			data: [
				("a".to_string(), "1".to_string()),
				("multi".to_string(), "x\ny".to_string()),
			]
			.into_iter()
			.collect(),
			copies: 1,
		};

		let mut out = Vec::new();
		write_config_data(Some(&lookup), &mut out).unwrap();

		assert_eq!(
			String::from_utf8(out).unwrap(),
			indoc! {r"
				KEY    VALUE
				a      1
				multi  x\ny
			"}
		);
	}

	#[test]
	fn test_write_config_data_missing_is_empty_table() {
		let mut out = Vec::new();
		write_config_data(None, &mut out).unwrap();
		assert_eq!(String::from_utf8(out).unwrap(), "KEY  VALUE\n");
	}
}
