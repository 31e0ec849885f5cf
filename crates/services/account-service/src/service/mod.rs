//! Service layer - account use cases on top of units of work.

mod account_service;

pub use account_service::{AccountManager, AccountService, RoleSummary};
