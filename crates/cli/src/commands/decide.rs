use clap::{Args, ValueEnum};
use serde_json::json;

use timeoff_core::domain::request::{HumanDecision, LeaveRequestId};
use timeoff_db::connect_with_settings;

use crate::commands::{build_manager, load_config, runtime, CommandResult};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Action {
    Approve,
    Reject,
}

impl From<Action> for HumanDecision {
    fn from(action: Action) -> Self {
        match action {
            Action::Approve => HumanDecision::Approve,
            Action::Reject => HumanDecision::Reject,
        }
    }
}

#[derive(Debug, Args)]
pub struct DecideArgs {
    #[arg(long, help = "Leave request identifier, e.g. LR-...")]
    pub request: String,
    #[arg(long, value_enum, help = "Resolution to apply")]
    pub action: Action,
    #[arg(long, default_value = "hr-ops", help = "Reviewer applying the resolution")]
    pub by: String,
    #[arg(long, help = "Optional resolution note")]
    pub note: Option<String>,
}

pub fn run(args: DecideArgs) -> CommandResult {
    let config = match load_config("decide") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("decide") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let manager = build_manager(&config, pool.clone())?;

        let outcome = manager
            .decide(
                &LeaveRequestId(args.request.clone()),
                args.action.into(),
                &args.by,
                args.note.clone(),
            )
            .await;
        pool.close().await;
        outcome.map_err(|error| {
            let exit_code = if error.is_retryable() { 7u8 } else { 6u8 };
            (error.reason_code(), error.to_string(), exit_code)
        })
    });

    match result {
        Ok(request) => {
            let message = format!("request {} is now {}", request.id.0, request.status);
            let data = serde_json::to_value(&request).unwrap_or_else(|_| json!(null));
            CommandResult::success_with_data("decide", message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("decide", error_class, message, exit_code)
        }
    }
}
