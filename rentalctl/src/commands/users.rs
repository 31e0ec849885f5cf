//! Users command - account registration.

use account_service_lib::config::AccountServiceConfig;
use account_service_lib::infra::Database;
use account_service_lib::{AccountManager, AccountService};
use common::AppResult;

use crate::cli::UsersAction;

/// Execute the users command
pub async fn execute(action: UsersAction, config: AccountServiceConfig) -> AppResult<()> {
    let db = Database::connect(&config.database).await?;
    let accounts = AccountManager::new(db);

    match action {
        UsersAction::Register {
            email,
            password_hash,
            username,
        } => {
            let user = accounts.register(&email, username, password_hash).await?;
            println!("registered user {} ({})", user.id, user.email);
        }
    }

    Ok(())
}
