use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use statline_agent::{Orchestrator, ScriptedAgent, SessionOutcome, SessionSettings};
use statline_core::config::{ConfigOverrides, LoadOptions};
use statline_gateway::EndpointGateway;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::{load_catalog, load_config, CommandResult, EXIT_CONFIG, EXIT_IO};

#[derive(Debug, Clone, Default)]
pub struct ReplayArgs {
    pub script: PathBuf,
    pub trace_out: Option<PathBuf>,
    pub call_limit: Option<u32>,
    pub cost_limit: Option<u64>,
    pub max_turns: Option<u32>,
}

pub fn run(mut options: LoadOptions, args: ReplayArgs) -> CommandResult {
    options.overrides = ConfigOverrides {
        call_limit: args.call_limit.or(options.overrides.call_limit),
        cost_limit: args.cost_limit.or(options.overrides.cost_limit),
        max_turns: args.max_turns.or(options.overrides.max_turns),
        ..options.overrides
    };

    let config = match load_config("replay", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let catalog = match load_catalog("replay", &config) {
        Ok(catalog) => Arc::new(catalog),
        Err(result) => return result,
    };
    let gateway = match EndpointGateway::from_config(catalog, &config.gateway) {
        Ok(gateway) => gateway,
        Err(error) => {
            return CommandResult::failure("replay", "gateway_build", error.to_string(), EXIT_CONFIG)
        }
    };
    let mut agent = match ScriptedAgent::from_path(&args.script) {
        Ok(agent) => agent,
        Err(error) => {
            return CommandResult::failure("replay", "script", format!("{error:#}"), EXIT_IO)
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure("replay", "runtime", error.to_string(), 1),
    };

    let orchestrator = Orchestrator::new(gateway, SessionSettings::from(&config.session));
    let outcome = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(event_name = "cli.replay.interrupted", "interrupt received, cancelling session");
                on_interrupt.cancel();
            }
        });
        orchestrator.run(&mut agent, cancel).await
    });

    let rendered = match serde_json::to_string_pretty(&outcome) {
        Ok(rendered) => rendered,
        Err(error) => return CommandResult::failure("replay", "serialization", error.to_string(), 1),
    };

    if let Some(path) = &args.trace_out {
        if let Err(error) = write_outcome(path, &rendered) {
            return CommandResult::failure(
                "replay",
                "io",
                format!("failed to write `{}`: {error}", path.display()),
                EXIT_IO,
            );
        }
    }

    log_outcome(&outcome, agent.remaining());
    CommandResult { exit_code: 0, output: rendered }
}

fn write_outcome(path: &Path, rendered: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{rendered}\n"))
}

fn log_outcome(outcome: &SessionOutcome, unused_steps: usize) {
    info!(
        event_name = "cli.replay.completed",
        session_id = %outcome.session_id,
        reason = %outcome.reason,
        calls_used = outcome.budget.calls_used(),
        cost_used = outcome.budget.cost_used(),
        trace_len = outcome.trace.len(),
        unused_steps,
        "replay finished"
    );
}
