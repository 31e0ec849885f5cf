//! Command handlers.

pub mod migrate;
pub mod roles;
pub mod users;
