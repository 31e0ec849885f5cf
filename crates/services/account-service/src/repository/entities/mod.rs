//! SeaORM entities for the account tables.

pub mod booking;
pub mod review;
pub mod role_assignment;
pub mod user;
