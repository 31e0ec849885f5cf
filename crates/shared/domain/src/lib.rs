//! Domain layer - Core account entities and role policy.
//!
//! This crate contains pure domain logic with no infrastructure dependencies.

pub mod booking;
pub mod constants;
pub mod error;
pub mod resolver;
pub mod role;
pub mod user;

pub use booking::{Booking, Review};
pub use constants::*;
pub use error::{DomainError, DomainResult};
pub use resolver::{AssignPlan, RemovePlan, RoleResolver};
pub use role::{Role, RoleAssignment};
pub use user::{normalize_email, User};
