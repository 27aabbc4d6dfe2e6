//! Configmaps get subcommand handler.

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
pub struct GetArgs {
	/// Config map name
	pub name: String,

	/// JSON output
	#[arg(long)]
	pub json: bool,
}

/// Run the configmaps get subcommand.
pub fn run<W: Write>(args: GetArgs, global: &GlobalArgs, writer: W) -> Result<()> {
	let settings = load_settings(global.overrides())?;
	let runtime = create_tokio_runtime()?;
	runtime.block_on(async {
		let conn = connect(&settings.connect).await?;
		show_config_map(&KubeCluster::from(&conn), &args.name, args.json, writer).await
	})
}

/// Print the data of the first config map named `name`.
///
/// A missing name prints an empty table (or `null` as JSON).
pub async fn show_config_map<C: ClusterApi + ?Sized, W: Write>(
	api: &C,
	name: &str,
	json: bool,
	mut writer: W,
) -> Result<()> {
	let registry = ConfigRegistry::load(api)
		.await
		.context("listing config maps")?;
	let lookup = registry.get(name);

	match &lookup {
		None => tracing::debug!(name, "config map not found"),
		Some(found) if found.copies > 1 => tracing::warn!(
			name,
			namespace = %found.namespace,
			copies = found.copies,
			holders = ?registry.namespaces_of(name),
			"config map exists in several namespaces; showing the first"
		),
		Some(_) => {}
	}

	if json {
		output::write_json(&lookup, &mut writer).context("writing config map")?;
	} else {
		output::write_config_data(lookup.as_ref(), &mut writer).context("writing config map")?;
	}
	Ok(())
}
