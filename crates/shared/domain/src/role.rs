//! Roles and persisted role assignments.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{ROLE_ADMIN, ROLE_GUEST, ROLE_SUPER_ADMIN};
use crate::error::{DomainError, DomainResult};

/// Ordered role enumeration.
///
/// The declaration order is the rank order, so `Ord` compares privilege:
/// `Guest < Admin < SuperAdmin`. The discriminant is the value persisted in
/// the `role_assignments.role` column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Implicit role of every registered user, never stored as a row
    #[default]
    Guest = 0,
    Admin = 1,
    SuperAdmin = 2,
}

impl Role {
    /// Persisted rank of this role
    pub fn rank(self) -> i32 {
        self as i32
    }

    /// Resolve a persisted rank
    pub fn from_rank(rank: i32) -> DomainResult<Self> {
        match rank {
            0 => Ok(Role::Guest),
            1 => Ok(Role::Admin),
            2 => Ok(Role::SuperAdmin),
            other => Err(DomainError::UnknownRole(other)),
        }
    }

    /// All roles, lowest rank first
    pub fn all() -> &'static [Role] {
        &[Role::Guest, Role::Admin, Role::SuperAdmin]
    }

    /// Claim value for this role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => ROLE_GUEST,
            Role::Admin => ROLE_ADMIN,
            Role::SuperAdmin => ROLE_SUPER_ADMIN,
        }
    }

    /// Whether this role is ever persisted as an assignment row
    pub fn is_materialized(self) -> bool {
        !matches!(self, Role::Guest)
    }
}

impl TryFrom<i32> for Role {
    type Error = DomainError;

    fn try_from(rank: i32) -> Result<Self, Self::Error> {
        Role::from_rank(rank)
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Role::all()
            .iter()
            .copied()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownRoleName(s.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted (user, role) grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Surrogate key, `0` until persisted
    pub id: i64,
    pub user_id: i64,
    pub role: Role,
    pub assigned_date: DateTime<Utc>,
}

impl RoleAssignment {
    /// Create an unsaved assignment stamped with the given time
    pub fn new(user_id: i64, role: Role, assigned_date: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            user_id,
            role,
            assigned_date,
        }
    }
}
