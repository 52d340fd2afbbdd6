pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "timeoff",
    about = "Leave request lifecycle CLI",
    long_about = "Submit leave requests, resolve escalations, inspect balances, and manage the database.",
    after_help = "Examples:\n  timeoff migrate\n  timeoff seed\n  timeoff submit --employee EMP-001 --leave-type casual --start 2026-09-07 --end 2026-09-08 --days 2 --reason \"family travel\"\n  timeoff decide --request LR-... --action approve --by hr-ops"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo roster and open its balance rows")]
    Seed,
    #[command(about = "Submit a leave request and print the resulting decision")]
    Submit(commands::submit::SubmitArgs),
    #[command(about = "Approve or reject an escalated request")]
    Decide(commands::decide::DecideArgs),
    #[command(about = "Show an employee's balance rows for a year")]
    Balance(commands::balance::BalanceArgs),
}

fn init_logging() {
    use timeoff_core::config::{AppConfig, LoadOptions, LogFormat};
    use tracing::Level;

    let Ok(config) = AppConfig::load(LoadOptions::default()) else { return };
    let level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt().with_target(false).with_max_level(level);

    // try_init: a test harness may have installed a subscriber already
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Submit(args) => commands::submit::run(args),
        Command::Decide(args) => commands::decide::run(args),
        Command::Balance(args) => commands::balance::run(args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
