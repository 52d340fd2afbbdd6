use std::process::ExitCode;

fn main() -> ExitCode {
    timeoff_cli::run()
}
