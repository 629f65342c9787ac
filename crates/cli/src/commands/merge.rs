use std::path::Path;

use statline_core::config::LoadOptions;
use tracing::info;

use crate::commands::{load_catalog, load_config, CommandResult, EXIT_IO};

pub fn run(options: LoadOptions, output: &Path) -> CommandResult {
    let config = match load_config("merge", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let catalog = match load_catalog("merge", &config) {
        Ok(catalog) => catalog,
        Err(result) => return result,
    };

    if let Err(error) = catalog.write_json(output) {
        return CommandResult::failure("merge", "io", error.to_string(), EXIT_IO);
    }

    info!(
        event_name = "cli.merge.written",
        output = %output.display(),
        entries = catalog.len(),
        "merged catalog written"
    );
    CommandResult::success(
        "merge",
        format!("wrote {} merged entries to {}", catalog.len(), output.display()),
    )
}
