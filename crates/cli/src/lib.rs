pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use statline_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "statline",
    about = "Statline operator CLI",
    long_about = "Validate the NHL endpoint catalog, inspect configuration, and replay budgeted agent sessions.",
    after_help = "Examples:\n  statline catalog\n  statline endpoints --category teams\n  statline replay session.json --trace-out trace.json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a statline.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Load and validate the merged endpoint catalog")]
    Catalog,
    #[command(about = "List catalog endpoints as the agent sees them")]
    Endpoints {
        #[arg(long, help = "Only list endpoints in this category")]
        category: Option<String>,
    },
    #[command(about = "Write the merged catalog in canonical form")]
    Merge {
        #[arg(long, help = "Destination file for the merged catalog")]
        output: PathBuf,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Run one budgeted session driven by a recorded agent script")]
    Replay {
        #[arg(help = "JSON array of recorded agent responses")]
        script: PathBuf,
        #[arg(long, help = "Also write the session outcome to this file")]
        trace_out: Option<PathBuf>,
        #[arg(long, help = "Override session.call_limit")]
        call_limit: Option<u32>,
        #[arg(long, help = "Override session.cost_limit (0 = unconstrained)")]
        cost_limit: Option<u64>,
        #[arg(long, help = "Override session.max_turns")]
        max_turns: Option<u32>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
        ..LoadOptions::default()
    };

    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Catalog => commands::catalog::run(options),
        Command::Endpoints { category } => commands::endpoints::run(options, category.as_deref()),
        Command::Merge { output } => commands::merge::run(options, &output),
        Command::Config => commands::config::run(options),
        Command::Replay { script, trace_out, call_limit, cost_limit, max_turns } => {
            commands::replay::run(
                options,
                commands::replay::ReplayArgs { script, trace_out, call_limit, cost_limit, max_turns },
            )
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr; stdout carries only command output.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(log_level);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
