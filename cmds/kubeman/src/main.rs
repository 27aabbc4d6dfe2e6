use anyhow::Result;
use clap::{Parser, Subcommand};
use kubeman::{
	commands::{self, util::BrokenPipeGuard, util::GlobalArgs},
	telemetry,
};

#[derive(Parser)]
#[command(name = "kubeman")]
#[command(about = "Inspect workloads and manage config maps across namespaces", long_about = None)]
#[command(version)]
struct Cli {
	#[command(flatten)]
	global: GlobalArgs,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Deployments joined with their services, ports and ingress hosts
	Workloads(commands::workloads::WorkloadsArgs),

	/// List, show and update config maps
	#[command(alias = "cm")]
	Configmaps(commands::configmaps::ConfigmapsArgs),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	telemetry::init(cli.global.log_level)?;

	let stdout = BrokenPipeGuard::new(std::io::stdout());

	match cli.command {
		Commands::Workloads(args) => commands::workloads::run(args, &cli.global, stdout),
		Commands::Configmaps(args) => commands::configmaps::run(args, &cli.global, stdout),
	}
}
