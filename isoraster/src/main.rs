use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use isoraster::tools;

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Build a street/transit egress table and write it to disk
	BuildEgress(tools::build_egress::Subcommand),

	/// Run the one-to-many processor for a single origin
	Analyze(tools::analyze::Subcommand),

	/// Run a many-to-many batch job to completion
	Batch(tools::batch::Subcommand),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	env_logger::Builder::new().filter_level(cli.verbose.log_level_filter()).format_timestamp(None).init();

	run(cli)
}

fn run(cli: Cli) -> Result<()> {
	match &cli.command {
		Commands::BuildEgress(args) => tools::build_egress::run(args),
		Commands::Analyze(args) => tools::analyze::run(args),
		Commands::Batch(args) => tools::batch::run(args),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn run_command(arg_vec: Vec<&str>) -> Result<String> {
		let cli = Cli::try_parse_from(arg_vec)?;
		let msg = format!("{cli:?}");
		run(cli)?;
		Ok(msg)
	}

	#[test]
	fn help() {
		let err = run_command(vec!["isoraster"]).unwrap_err().to_string();
		assert!(err.contains("\nUsage: isoraster [OPTIONS] <COMMAND>"));
	}

	#[test]
	fn version() {
		let err = run_command(vec!["isoraster", "-V"]).unwrap_err().to_string();
		assert!(err.starts_with("isoraster "));
	}

	#[test]
	fn build_egress_subcommand_requires_network_and_data_dir() {
		let err = run_command(vec!["isoraster", "build-egress"]).unwrap_err().to_string();
		assert!(err.contains("required"));
	}

	#[test]
	fn analyze_subcommand_requires_origin() {
		let err = run_command(vec!["isoraster", "analyze", "net", "--data-dir", "."]).unwrap_err().to_string();
		assert!(err.contains("required"));
	}

	#[test]
	fn batch_subcommand_requires_origins() {
		let err = run_command(vec!["isoraster", "batch", "net", "--data-dir", ".", "--egress", "e"]).unwrap_err().to_string();
		assert!(err.contains("required"));
	}
}
