use chrono::Utc;

use crate::commands::CommandResult;
use corrubox_core::config::{AppConfig, LoadOptions};
use corrubox_db::repositories::{QuoteRepository, SqlQuoteRepository};
use corrubox_db::{connect_with_settings, migrations};

/// Sweeps open quotes past their validity deadline into `expired`. Safe to
/// run repeatedly: terminal quotes are never touched, and a quote whose
/// deadline has not passed is left as is.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "expire",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "expire",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let quotes = SqlQuoteRepository::new(pool.clone());
        let now = Utc::now();
        let candidates = quotes
            .list_expiry_candidates(now)
            .await
            .map_err(|error| ("expiry_query", error.to_string(), 5u8))?;

        let mut expired = 0usize;
        for mut quote in candidates {
            if quote.expire_if_due(now) {
                quotes
                    .save(quote)
                    .await
                    .map_err(|error| ("expiry_save", error.to_string(), 5u8))?;
                expired += 1;
            }
        }

        pool.close().await;
        Ok::<usize, (&'static str, String, u8)>(expired)
    });

    match result {
        Ok(expired) => {
            CommandResult::success("expire", format!("expired {expired} overdue quote(s)"))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("expire", error_class, message, exit_code)
        }
    }
}
