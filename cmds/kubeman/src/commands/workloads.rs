//! Workloads command handler.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;
use tracing::instrument;

use super::util::{connect, create_tokio_runtime, load_settings, GlobalArgs};
use crate::{
	config::{Overrides, Settings},
	correlate::{Correlator, Workload},
	k8s::fetch::{ClusterApi, KubeCluster, Snapshot},
	output::{self, ColorMode},
};

#[derive(Args)]
pub struct WorkloadsArgs {
	/// Namespace to read deployments and services from [default: application]
	#[arg(short, long)]
	pub namespace: Option<String>,

	/// Match services by this selector label instead of the first selector entry
	#[arg(long)]
	pub selector_label: Option<String>,

	/// Print JSON instead of a table
	#[arg(long)]
	pub json: bool,

	/// Controls color in table output
	#[arg(long, value_enum, default_value_t = ColorMode::Auto)]
	pub color: ColorMode,
}

/// Output options for [`show_workloads`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkloadsOpts {
	pub json: bool,
	pub color: ColorMode,
}

/// Run the workloads command.
pub fn run<W: Write>(args: WorkloadsArgs, global: &GlobalArgs, writer: W) -> Result<()> {
	let settings = load_settings(Overrides {
		namespace: args.namespace.clone(),
		selector_label: args.selector_label.clone(),
		..global.overrides()
	})?;

	let runtime = create_tokio_runtime()?;
	runtime.block_on(run_async(args, settings, writer))
}

async fn run_async<W: Write>(args: WorkloadsArgs, settings: Settings, writer: W) -> Result<()> {
	let conn = connect(&settings.connect).await?;
	let api = KubeCluster::from(&conn);
	let correlator = Correlator::new(settings.selector);
	let opts = WorkloadsOpts {
		json: args.json,
		color: args.color,
	};
	show_workloads(&api, &settings.namespace, &correlator, opts, writer).await
}

/// Fetch and correlate the workloads of `namespace`.
#[instrument(skip(api, correlator))]
pub async fn list_workloads<C: ClusterApi + ?Sized>(
	api: &C,
	namespace: &str,
	correlator: &Correlator,
) -> Result<Vec<Workload>> {
	let snapshot = Snapshot::fetch(api, namespace)
		.await
		.with_context(|| format!("fetching resources in namespace {namespace}"))?;

	let workloads = correlator.correlate_snapshot(&snapshot);
	tracing::debug!(count = workloads.len(), "correlated workloads");
	Ok(workloads)
}

/// Fetch, correlate and print the workloads of `namespace`.
pub async fn show_workloads<C: ClusterApi + ?Sized, W: Write>(
	api: &C,
	namespace: &str,
	correlator: &Correlator,
	opts: WorkloadsOpts,
	mut writer: W,
) -> Result<()> {
	let workloads = list_workloads(api, namespace, correlator).await?;

	if opts.json {
		output::write_json(&workloads, &mut writer).context("writing workloads")?;
	} else {
		output::write_workloads(&workloads, opts.color.enabled(), &mut writer)
			.context("writing workloads")?;
	}
	Ok(())
}
