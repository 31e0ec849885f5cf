//! Domain-level constants.
//!
//! These constants define business rules shared by the data-access layer
//! and its callers.

// =============================================================================
// Roles
// =============================================================================

/// Claim value for the implicit role every registered user holds
pub const ROLE_GUEST: &str = "guest";

/// Claim value for administrators
pub const ROLE_ADMIN: &str = "admin";

/// Claim value for super administrators
pub const ROLE_SUPER_ADMIN: &str = "super_admin";

// =============================================================================
// Pagination
// =============================================================================

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Maximum allowed items per page to prevent excessive queries
pub const MAX_PAGE_SIZE: u64 = 100;

/// Default starting page number (1-indexed)
pub const DEFAULT_PAGE_NUMBER: u64 = 1;

// =============================================================================
// Accounts
// =============================================================================

/// Maximum username length accepted at registration
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Reviews are scored on a 1..=5 scale
pub const MIN_REVIEW_RATING: i32 = 1;
pub const MAX_REVIEW_RATING: i32 = 5;
