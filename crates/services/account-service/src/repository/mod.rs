//! Repository layer for data access.

mod base;
pub mod entities;
mod role_repository;
mod user_repository;

pub use base::{Repository, StoreRepository};
pub use role_repository::{RoleRepository, RoleStore};
pub use user_repository::{UserRepository, UserStore};
