//! Configmaps apply subcommand handler.

use std::{collections::BTreeMap, io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::instrument;

use crate::{
	commands::util::{connect, create_tokio_runtime, load_settings, GlobalArgs},
	config::{Overrides, Settings},
	data,
	k8s::fetch::{ClusterApi, KubeCluster},
	output,
	reconcile::{CancelFlag, ReconcileReport, Reconciler},
};

#[derive(Args)]
pub struct ApplyArgs {
	/// Config map name
	pub name: String,

	/// Read the new data from a YAML or JSON mapping
	#[arg(long, conflicts_with = "set", required_unless_present = "set")]
	pub from_file: Option<PathBuf>,

	/// Set a key (Format: key=value). May be repeated
	#[arg(long = "set", value_name = "KEY=VALUE")]
	pub set: Vec<String>,

	/// Number of namespaces updated at once [default: 1]
	#[arg(long)]
	pub concurrency: Option<usize>,

	/// JSON output
	#[arg(long)]
	pub json: bool,
}

/// Options for [`apply_config_map`].
#[derive(Debug, Clone, Default)]
pub struct ApplyOpts {
	pub concurrency: usize,
	pub json: bool,
	pub cancel: CancelFlag,
}

/// Run the configmaps apply subcommand.
///
/// Fails when any namespace could not be updated or the run was interrupted.
pub fn run<W: Write>(args: ApplyArgs, global: &GlobalArgs, writer: W) -> Result<()> {
	let data = match &args.from_file {
		Some(path) => data::load_data_file(path)?,
		None => data::parse_pairs(&args.set)?,
	};

	let settings = load_settings(Overrides {
		concurrency: args.concurrency,
		..global.overrides()
	})?;

	let runtime = create_tokio_runtime()?;
	let report = runtime.block_on(run_async(&args, &data, settings, writer))?;

	if !report.is_success() {
		anyhow::bail!("configmap/{}: {}", report.name(), report.summary());
	}
	Ok(())
}

async fn run_async<W: Write>(
	args: &ApplyArgs,
	data: &BTreeMap<String, String>,
	settings: Settings,
	writer: W,
) -> Result<ReconcileReport> {
	let conn = connect(&settings.connect).await?;
	let api = KubeCluster::from(&conn);

	let cancel = CancelFlag::new();
	let interrupt = {
		let cancel = cancel.clone();
		tokio::spawn(async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				tracing::warn!("interrupted, finishing the namespace in progress");
				cancel.cancel();
			}
		})
	};

	let opts = ApplyOpts {
		concurrency: settings.concurrency,
		json: args.json,
		cancel,
	};
	let result = apply_config_map(&api, &args.name, data, opts, writer).await;
	interrupt.abort();
	result
}

/// Overwrite config map `name` everywhere it exists and print the report.
#[instrument(skip_all, fields(name = %name))]
pub async fn apply_config_map<C: ClusterApi + ?Sized, W: Write>(
	api: &C,
	name: &str,
	data: &BTreeMap<String, String>,
	opts: ApplyOpts,
	mut writer: W,
) -> Result<ReconcileReport> {
	let report = Reconciler::new(api)
		.concurrency(opts.concurrency)
		.cancel_flag(opts.cancel)
		.apply_config_update(name, data)
		.await
		.with_context(|| format!("updating config map {name}"))?;

	if opts.json {
		output::write_report_json(&report, &mut writer).context("writing report")?;
	} else {
		output::write_report(&report, &mut writer).context("writing report")?;
	}
	Ok(report)
}
