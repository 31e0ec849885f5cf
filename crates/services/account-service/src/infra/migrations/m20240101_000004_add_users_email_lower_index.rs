//! Migration: Case-insensitive unique index on users.email.
//!
//! Emails are normalized to lowercase on the way in, but rows written around
//! that path must still not differ from another row by case alone.

use sea_orm_migration::prelude::*;

pub(super) const INDEX_NAME: &str = "idx_users_email_lower";

pub(super) fn create_index_sql() -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON users (LOWER(email))",
        INDEX_NAME
    )
}

pub(super) fn drop_index_sql() -> String {
    format!("DROP INDEX IF EXISTS {}", INDEX_NAME)
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // sea-query indexes take plain columns, not expressions
        manager
            .get_connection()
            .execute_unprepared(&create_index_sql())
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(&drop_index_sql())
            .await?;
        Ok(())
    }
}
