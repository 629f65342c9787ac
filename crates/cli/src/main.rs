use std::process::ExitCode;

fn main() -> ExitCode {
    statline_cli::run()
}
