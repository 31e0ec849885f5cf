//! CLI argument definitions.

use clap::{Parser, Subcommand};

use domain::Role;

/// Operator tool for the rental accounts database
#[derive(Parser, Debug)]
#[command(name = "rentalctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },

    /// Manage user roles
    Roles {
        #[command(subcommand)]
        action: RolesAction,
    },

    /// Manage user accounts
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
}

/// Migration actions
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum MigrateAction {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset and re-run all migrations
    Fresh,
}

/// Role management actions
#[derive(Subcommand, Debug)]
pub enum RolesAction {
    /// Grant a role (admin, super_admin)
    Assign { user_id: i64, role: Role },
    /// Revoke a role row
    Remove { user_id: i64, role: Role },
    /// Revoke admin rights in both the role table and the legacy flag
    RevokeAdmin { user_id: i64 },
    /// Show a user's effective roles
    Show {
        user_id: i64,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List users holding a role
    List {
        role: Role,
        #[arg(long)]
        json: bool,
    },
}

/// Account actions
#[derive(Subcommand, Debug)]
pub enum UsersAction {
    /// Register a user from an already hashed password
    Register {
        email: String,
        password_hash: String,
        #[arg(long)]
        username: Option<String>,
    },
}
