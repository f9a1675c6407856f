// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use wf_cli::commands::{self, SchemaKind};
use wf_cli::format::{Formatter, OutputFormat};

/// Exit code for runtime errors.
const EXIT_RUNTIME_ERROR: u8 = 1;

#[derive(Parser, Debug)]
#[command(name = "wf", version, about = "Deterministic workflow execution engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for structured results.
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a workflow document and print its run result.
    Run {
        /// Path to a workflow JSON document.
        file: PathBuf,
        /// Path to an engine configuration TOML file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory to persist each step's receipt as a JSON file.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Validate a workflow or receipt JSON document against its schema.
    Validate {
        /// Path to a workflow or receipt JSON document.
        file: PathBuf,
    },
    /// Re-verify a run result's (or bare receipt array's) Merkle inclusion.
    Replay {
        /// Path to a run result or receipt array JSON document.
        file: PathBuf,
    },
    /// Pretty-print a run result, workflow, or receipt document.
    Inspect {
        /// Path to a run result, workflow, or receipt JSON document.
        file: PathBuf,
    },
    /// Print a JSON schema for one of the engine's wire types.
    Schema {
        /// Which schema to print.
        #[arg(value_enum)]
        kind: SchemaKindArg,
    },
    /// Configuration file inspection.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Load and validate an engine configuration file, printing diagnostics.
    Check {
        /// Path to an engine configuration TOML file. Defaults if omitted.
        config: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SchemaKindArg {
    Workflow,
    Receipt,
    RunResult,
    Config,
}

impl From<SchemaKindArg> for SchemaKind {
    fn from(kind: SchemaKindArg) -> Self {
        match kind {
            SchemaKindArg::Workflow => SchemaKind::Workflow,
            SchemaKindArg::Receipt => SchemaKind::Receipt,
            SchemaKindArg::RunResult => SchemaKind::RunResult,
            SchemaKindArg::Config => SchemaKind::Config,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    let formatter = Formatter::new(cli.format.clone());

    match run(cli, &formatter).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&format!("{e:#}")));
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn run(cli: Cli, formatter: &Formatter) -> Result<()> {
    match cli.command {
        Commands::Run { file, config, out } => {
            let engine_config = wf_config::load_config(config.as_deref())
                .with_context(|| "load engine configuration")?;
            let engine = commands::build_engine(&engine_config)?;
            let workflow = commands::load_workflow_file(&file)?;
            let result = engine.execute(workflow).await;
            if let Some(ref dir) = out {
                commands::write_receipts(dir, &result)?;
            }
            println!("{}", formatter.format_run_result(&result));
            if result.status == wf_core::RunStatus::Failed {
                anyhow::bail!(
                    "run failed: {}",
                    result.error.map(|e| e.message).unwrap_or_default()
                );
            }
            Ok(())
        }
        Commands::Validate { file } => {
            let detected = commands::validate_file(&file)?;
            match detected {
                commands::ValidatedType::Workflow => println!("{}: valid workflow document", file.display()),
                commands::ValidatedType::Receipt => println!("{}: valid receipt document", file.display()),
            }
            Ok(())
        }
        Commands::Replay { file } => {
            let report = commands::replay_file(&file)?;
            println!("{}", formatter.format_replay_report(&report));
            if !report.steps.iter().all(|s| s.verified) {
                anyhow::bail!("one or more receipts failed Merkle verification");
            }
            Ok(())
        }
        Commands::Inspect { file } => {
            match commands::inspect_file(&file)? {
                commands::InspectedDocument::RunResult(result) => {
                    println!("{}", formatter.format_run_result(&result));
                }
                commands::InspectedDocument::Workflow(workflow) => {
                    println!("{}", formatter.format_workflow(&workflow));
                }
                commands::InspectedDocument::Receipt(receipt) => {
                    println!("{}", formatter.format_receipt(&receipt));
                }
            }
            Ok(())
        }
        Commands::Schema { kind } => {
            println!("{}", commands::schema_json(kind.into())?);
            Ok(())
        }
        Commands::Config(ConfigCommands::Check { config }) => {
            let diagnostics = commands::config_check(config.as_deref())?;
            let has_error = diagnostics.iter().any(|d| d.starts_with("error:"));
            for d in &diagnostics {
                println!("{d}");
            }
            if has_error {
                anyhow::bail!("configuration is invalid");
            }
            Ok(())
        }
    }
}
