//! Configmaps list subcommand handler.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use crate::{
	commands::util::{connect, create_tokio_runtime, load_settings, GlobalArgs},
	k8s::fetch::{ClusterApi, KubeCluster},
	output,
	registry::ConfigRegistry,
};

#[derive(Args)]
pub struct ListArgs {
	/// JSON output
	#[arg(long)]
	pub json: bool,
}

/// Run the configmaps list subcommand.
pub fn run<W: Write>(args: ListArgs, global: &GlobalArgs, writer: W) -> Result<()> {
	let settings = load_settings(global.overrides())?;
	let runtime = create_tokio_runtime()?;
	runtime.block_on(async {
		let conn = connect(&settings.connect).await?;
		list_config_maps(&KubeCluster::from(&conn), args.json, writer).await
	})
}

/// Print the name of every config map in the cluster.
pub async fn list_config_maps<C: ClusterApi + ?Sized, W: Write>(
	api: &C,
	json: bool,
	mut writer: W,
) -> Result<()> {
	let registry = ConfigRegistry::load(api)
		.await
		.context("listing config maps")?;

	if json {
		output::write_json(registry.objects(), &mut writer).context("writing config maps")?;
	} else {
		output::write_names(&registry.list_names(), &mut writer).context("writing config maps")?;
	}
	Ok(())
}
