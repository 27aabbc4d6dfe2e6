//! Configmaps command handler.

use std::io::Write;

use anyhow::Result;
use clap::{Args, Subcommand};

use super::util::GlobalArgs;

pub mod apply;
pub mod get;
pub mod list;

#[derive(Args)]
pub struct ConfigmapsArgs {
	#[command(subcommand)]
	pub command: ConfigmapsCommands,
}

#[derive(Subcommand)]
pub enum ConfigmapsCommands {
	/// List config map names across all namespaces
	#[command(alias = "ls")]
	List(list::ListArgs),

	/// Show the data of a config map
	Get(get::GetArgs),

	/// Overwrite a config map in every namespace that has it
	Apply(apply::ApplyArgs),
}

/// Run the configmaps command.
pub fn run<W: Write>(args: ConfigmapsArgs, global: &GlobalArgs, writer: W) -> Result<()> {
	match args.command {
		ConfigmapsCommands::List(list_args) => list::run(list_args, global, writer),
		ConfigmapsCommands::Get(get_args) => get::run(get_args, global, writer),
		ConfigmapsCommands::Apply(apply_args) => apply::run(apply_args, global, writer),
	}
}
