mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kiln_lib::module::Stage;

use cmd::{cmd_build, cmd_catalog, cmd_graph, cmd_license};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about = "Multi-module build coordinator", long_about = None)]
struct Cli {
  /// Build root containing kiln.lua
  #[arg(short = 'C', long, global = true, default_value = ".")]
  root: PathBuf,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate, verify, compile, test and package modules
  Build {
    /// Modules to build (default: all). Their dependencies are included.
    modules: Vec<String>,

    /// Only run these stages
    #[arg(short, long, value_delimiter = ',')]
    stage: Vec<Stage>,

    /// Maximum number of tasks to run at once
    #[arg(short, long)]
    jobs: Option<usize>,

    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
  /// Run code generators without compiling
  Generate {
    modules: Vec<String>,

    #[arg(short, long)]
    jobs: Option<usize>,

    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
  /// Run static analysis and license checks without compiling
  Verify {
    modules: Vec<String>,

    #[arg(short, long)]
    jobs: Option<usize>,

    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
  /// Show modules, their dependencies and the task waves
  Graph {
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
  /// List the coordinates of the version catalog
  Catalog {
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
  /// Check source files for license headers
  License {
    modules: Vec<String>,

    /// Add missing headers instead of reporting them
    #[arg(long)]
    fix: bool,

    /// Skip the confirmation prompt when fixing
    #[arg(short, long)]
    force: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Build {
      modules,
      stage,
      jobs,
      output,
    } => cmd_build(&cli.root, "build", &modules, &stage, jobs, output),
    Commands::Generate { modules, jobs, output } => {
      cmd_build(&cli.root, "generate", &modules, &[Stage::Generate], jobs, output)
    }
    Commands::Verify { modules, jobs, output } => {
      cmd_build(&cli.root, "verify", &modules, &[Stage::Verify], jobs, output)
    }
    Commands::Graph { output } => cmd_graph(&cli.root, output),
    Commands::Catalog { output } => cmd_catalog(&cli.root, output),
    Commands::License { modules, fix, force } => cmd_license(&cli.root, &modules, fix, force),
  }
}
