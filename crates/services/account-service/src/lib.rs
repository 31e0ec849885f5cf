//! Account Service Library
//!
//! Transactional data access for rental accounts: entity stores, generic
//! and specialized repositories sharing one unit of work, and role
//! management reconciling the legacy admin flag with role assignments.

pub mod config;
pub mod infra;
pub mod query;
pub mod repository;
pub mod service;
pub mod store;
pub mod unit_of_work;

use tracing::info;

use crate::config::AccountServiceConfig;
use crate::infra::Database;

pub use query::{FieldValue, Filter, OrderBy, QuerySpec, Relation, SortDirection};
pub use repository::{Repository, RoleRepository, UserRepository};
pub use service::{AccountManager, AccountService, RoleSummary};
pub use store::{EntityStore, InMemoryDatabase, SeaOrmStore};
pub use unit_of_work::{Persistence, UnitOfWork, UnitOfWorkFactory};

/// Migration action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}

/// Run migrations (for CLI commands).
pub async fn run_migrations(
    config: &AccountServiceConfig,
    action: MigrateAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::connect_without_migrations(&config.database).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("Database reset and migrations applied");
        }
    }

    Ok(())
}
