//! Migrate command - Database migration management.

use account_service_lib::config::AccountServiceConfig;
use common::{AppError, AppResult};

use crate::cli::MigrateAction;

/// Execute the migrate command
pub async fn execute(action: MigrateAction, config: AccountServiceConfig) -> AppResult<()> {
    if matches!(action, MigrateAction::Fresh) {
        tracing::warn!("Resetting database and running all migrations...");
    }

    let action = match action {
        MigrateAction::Up => account_service_lib::MigrateAction::Up,
        MigrateAction::Down => account_service_lib::MigrateAction::Down,
        MigrateAction::Status => account_service_lib::MigrateAction::Status,
        MigrateAction::Fresh => account_service_lib::MigrateAction::Fresh,
    };

    account_service_lib::run_migrations(&config, action)
        .await
        .map_err(|e| AppError::internal(format!("Migration failed: {}", e)))
}
