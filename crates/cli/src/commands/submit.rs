use chrono::NaiveDate;
use clap::Args;
use serde_json::json;

use timeoff_core::config::days_from_f64;
use timeoff_core::validation::SubmissionInput;
use timeoff_db::connect_with_settings;

use crate::commands::{build_manager, load_config, runtime, CommandResult};

#[derive(Debug, Args)]
pub struct SubmitArgs {
    #[arg(long, help = "Employee identifier, e.g. EMP-001")]
    pub employee: String,
    #[arg(long = "leave-type", help = "Leave type code, e.g. casual")]
    pub leave_type: String,
    #[arg(long, help = "First day of leave (YYYY-MM-DD)")]
    pub start: String,
    #[arg(long, help = "Last day of leave (YYYY-MM-DD)")]
    pub end: String,
    #[arg(long, help = "Working days requested, in 0.5 steps")]
    pub days: f64,
    #[arg(long, default_value_t = false, help = "Request exactly half a day")]
    pub half_day: bool,
    #[arg(long, help = "Reason for the request (5-1000 characters)")]
    pub reason: String,
    #[arg(long, default_value_t = false, help = "A supporting document is attached")]
    pub has_document: bool,
}

pub fn run(args: SubmitArgs) -> CommandResult {
    let config = match load_config("submit") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let Ok(start_date) = args.start.parse::<NaiveDate>() else {
        return CommandResult::failure(
            "submit",
            "invalid_argument",
            format!("`{}` is not a YYYY-MM-DD date", args.start),
            2,
        );
    };
    let Ok(end_date) = args.end.parse::<NaiveDate>() else {
        return CommandResult::failure(
            "submit",
            "invalid_argument",
            format!("`{}` is not a YYYY-MM-DD date", args.end),
            2,
        );
    };
    let Some(days) = days_from_f64(args.days) else {
        return CommandResult::failure(
            "submit",
            "invalid_argument",
            format!("`{}` is not a non-negative multiple of 0.5", args.days),
            2,
        );
    };
    let runtime = match runtime("submit") {
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

        let input = SubmissionInput {
            employee_id: args.employee,
            leave_type: args.leave_type,
            start_date,
            end_date,
            days,
            half_day: args.half_day,
            reason: args.reason,
            has_document: args.has_document,
        };
        let outcome = manager.submit(input).await;
        pool.close().await;
        outcome.map_err(|error| {
            let exit_code = if error.is_retryable() { 7u8 } else { 6u8 };
            (error.reason_code(), error.to_string(), exit_code)
        })
    });

    match result {
        Ok(request) => {
            let message = format!("request {} is {}", request.id.0, request.status);
            let data = serde_json::to_value(&request).unwrap_or_else(|_| json!(null));
            CommandResult::success_with_data("submit", message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("submit", error_class, message, exit_code)
        }
    }
}
