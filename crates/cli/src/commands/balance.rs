use chrono::{Datelike, Utc};
use clap::Args;
use serde_json::json;

use timeoff_db::connect_with_settings;

use crate::commands::{build_manager, load_config, runtime, CommandResult};

#[derive(Debug, Args)]
pub struct BalanceArgs {
    #[arg(long, help = "Employee identifier, e.g. EMP-001")]
    pub employee: String,
    #[arg(long, help = "Calendar year (defaults to the current year)")]
    pub year: Option<i32>,
}

pub fn run(args: BalanceArgs) -> CommandResult {
    let config = match load_config("balance") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("balance") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let year = args.year.unwrap_or_else(|| Utc::now().date_naive().year());
    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        let manager = build_manager(&config, pool.clone())?;

        let outcome = manager.balances(&args.employee, year).await;
        pool.close().await;
        outcome.map_err(|error| {
            let exit_code = if error.is_retryable() { 7u8 } else { 6u8 };
            (error.reason_code(), error.to_string(), exit_code)
        })
    });

    match result {
        Ok(balances) => {
            let rows: Vec<_> = balances
                .iter()
                .map(|balance| {
                    json!({
                        "leave_type": balance.key.leave_type,
                        "year": balance.key.year,
                        "entitlement": balance.entitlement,
                        "carried_forward": balance.carried_forward,
                        "used": balance.used_days,
                        "pending": balance.pending_days,
                        "remaining": balance.remaining(),
                    })
                })
                .collect();
            let message =
                format!("{} balance row(s) for {} in {}", rows.len(), args.employee, year);
            CommandResult::success_with_data("balance", message, json!(rows))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("balance", error_class, message, exit_code)
        }
    }
}
