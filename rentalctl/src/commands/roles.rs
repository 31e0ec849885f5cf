//! Roles command - grant, revoke and inspect roles.

use account_service_lib::config::AccountServiceConfig;
use account_service_lib::infra::Database;
use account_service_lib::{AccountManager, AccountService};
use common::{AppError, AppResult};

use crate::cli::RolesAction;

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> AppResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::internal(e.to_string()))
}

/// Execute the roles command
pub async fn execute(action: RolesAction, config: AccountServiceConfig) -> AppResult<()> {
    let db = Database::connect(&config.database).await?;
    let accounts = AccountManager::new(db);

    match action {
        RolesAction::Assign { user_id, role } => {
            let assignment = accounts.grant_role(user_id, role).await?;
            println!(
                "user {} has {} since {}",
                user_id,
                role,
                assignment.assigned_date.to_rfc3339()
            );
        }
        RolesAction::Remove { user_id, role } => {
            let removed = accounts.revoke_role(user_id, role).await?;
            if removed {
                println!("removed {} from user {}", role, user_id);
            } else {
                println!("user {} had no {} assignment", user_id, role);
            }
        }
        RolesAction::RevokeAdmin { user_id } => {
            let changed = accounts.revoke_admin(user_id).await?;
            println!(
                "admin rights of user {} {}",
                user_id,
                if changed { "revoked" } else { "were not granted" }
            );
        }
        RolesAction::Show { user_id, json } => {
            let summary = accounts.role_summary(user_id).await?;
            if json {
                println!("{}", to_json(&summary)?);
            } else {
                let roles: Vec<&str> = summary.roles.iter().map(|role| role.as_str()).collect();
                println!("user {}: {} (highest: {})", user_id, roles.join(", "), summary.highest);
                if summary.is_admin_flag {
                    println!("legacy admin flag is set");
                }
            }
        }
        RolesAction::List { role, json } => {
            let users = accounts.users_in_role(role).await?;
            if json {
                println!("{}", to_json(&users)?);
            } else {
                for user in &users {
                    println!("{}\t{}", user.id, user.email);
                }
            }
        }
    }

    Ok(())
}
