//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::{Booking, Review};
use crate::constants::MAX_USERNAME_LENGTH;
use crate::error::{DomainError, DomainResult};

/// Normalize an email address for storage and case-insensitive matching
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User domain entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Numeric identity, `0` until persisted
    pub id: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Legacy admin flag, kept in sync with Admin role assignments
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    /// Loaded only when the bookings relation is requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bookings: Vec<Booking>,
    /// Loaded only when the reviews relation is requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviews: Vec<Review>,
}

impl User {
    /// Create a new, unsaved user without admin rights
    pub fn new(email: &str, username: Option<String>, password_hash: String) -> Self {
        Self {
            id: 0,
            email: normalize_email(email),
            username: username
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            password_hash,
            is_admin: false,
            created_at: Utc::now(),
            bookings: Vec::new(),
            reviews: Vec::new(),
        }
    }

    /// Same user with an explicit id (seeding, imports)
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Check registration invariants
    pub fn validate(&self) -> DomainResult<()> {
        if self.email.is_empty() || !self.email.contains('@') {
            return Err(DomainError::validation("email must be a valid address"));
        }
        if self.password_hash.is_empty() {
            return Err(DomainError::validation("password hash must not be empty"));
        }
        if let Some(username) = &self.username {
            if username.chars().count() > MAX_USERNAME_LENGTH {
                return Err(DomainError::validation(format!(
                    "username must be at most {} characters",
                    MAX_USERNAME_LENGTH
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_normalizes_input() {
        let user = User::new("  Alice@Example.COM ", Some("  ".to_string()), "h".to_string());
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.username, None);
        assert!(!user.is_admin);
        assert_eq!(user.id, 0);
    }

    #[test]
    fn test_validate_rejects_bad_email() {
        let user = User::new("not-an-email", None, "h".to_string());
        assert!(matches!(user.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User::new("a@b.c", None, "secret-hash".to_string());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("bookings"));
    }
}
