//! Database migrations.
//!
//! Migration names follow the pattern: m{YYYYMMDD}_{NNNNNN}_{description}

use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users_table;
mod m20240101_000002_create_role_assignments_table;
mod m20240101_000003_create_bookings_and_reviews;
mod m20240101_000004_add_users_email_lower_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_role_assignments_table::Migration),
            Box::new(m20240101_000003_create_bookings_and_reviews::Migration),
            Box::new(m20240101_000004_add_users_email_lower_index::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_in_name_order() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|migration| migration.name().to_string())
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(
            names.last().map(String::as_str),
            Some("m20240101_000004_add_users_email_lower_index")
        );
    }

    #[test]
    fn test_email_index_ignores_case() {
        let sql = m20240101_000004_add_users_email_lower_index::create_index_sql();
        assert!(sql.starts_with("CREATE UNIQUE INDEX"));
        assert!(sql.contains("ON users (LOWER(email))"));
        assert!(m20240101_000004_add_users_email_lower_index::drop_index_sql()
            .ends_with(m20240101_000004_add_users_email_lower_index::INDEX_NAME));
    }
}
