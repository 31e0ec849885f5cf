//! Role resolution over the two persisted role models.
//!
//! A user's role state is split between the legacy `is_admin` flag on the
//! user row and the rows of the `role_assignments` table. The resolver
//! reconciles them as a union:
//!
//! - every registered user is a `Guest`, with no row required
//! - a user is `Admin` if the flag is set OR an Admin row exists
//! - any other role requires its row
//!
//! Mutations are planned here and applied by the role repository, so the
//! flag and the Admin row always change together.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::role::{Role, RoleAssignment};

/// Outcome of planning a role assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignPlan {
    /// The role is already granted; the stored row is returned unchanged
    Existing(RoleAssignment),
    /// A new row must be inserted, optionally raising the legacy flag
    Insert {
        assignment: RoleAssignment,
        set_admin_flag: bool,
    },
}

/// Outcome of planning a role removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovePlan {
    /// No row exists for the pair; nothing changes
    Absent,
    /// The row must be deleted, optionally clearing the legacy flag
    Delete {
        assignment: RoleAssignment,
        clear_admin_flag: bool,
    },
}

/// Read-only view of one user's persisted role state.
#[derive(Debug, Clone, Copy)]
pub struct RoleResolver<'a> {
    is_admin: bool,
    assignments: &'a [RoleAssignment],
}

impl<'a> RoleResolver<'a> {
    pub fn new(is_admin: bool, assignments: &'a [RoleAssignment]) -> Self {
        Self {
            is_admin,
            assignments,
        }
    }

    /// Stored row for `role`, if any
    pub fn assignment(&self, role: Role) -> Option<&'a RoleAssignment> {
        self.assignments.iter().find(|a| a.role == role)
    }

    /// Effective role set: `{Guest} ∪ {Admin if flag} ∪ rows`
    pub fn effective_roles(&self) -> BTreeSet<Role> {
        let mut roles: BTreeSet<Role> = self.assignments.iter().map(|a| a.role).collect();
        roles.insert(Role::Guest);
        if self.is_admin {
            roles.insert(Role::Admin);
        }
        roles
    }

    pub fn has_role(&self, role: Role) -> bool {
        match role {
            Role::Guest => true,
            Role::Admin => self.is_admin || self.assignment(Role::Admin).is_some(),
            other => self.assignment(other).is_some(),
        }
    }

    /// Highest role held.
    ///
    /// The legacy flag short-circuits to `Admin` before any row is consulted.
    pub fn highest_role(&self) -> Role {
        if self.is_admin {
            return Role::Admin;
        }
        self.assignments
            .iter()
            .map(|a| a.role)
            .max()
            .unwrap_or(Role::Guest)
    }

    /// Plan granting `role` to `user_id`.
    ///
    /// Callers must reject `Guest` before planning; it is never stored.
    pub fn plan_assign(&self, user_id: i64, role: Role, now: DateTime<Utc>) -> AssignPlan {
        if let Some(existing) = self.assignment(role) {
            return AssignPlan::Existing(existing.clone());
        }
        AssignPlan::Insert {
            assignment: RoleAssignment::new(user_id, role, now),
            set_admin_flag: role == Role::Admin && !self.is_admin,
        }
    }

    /// Plan revoking `role`
    pub fn plan_remove(&self, role: Role) -> RemovePlan {
        match self.assignment(role) {
            None => RemovePlan::Absent,
            Some(assignment) => RemovePlan::Delete {
                assignment: assignment.clone(),
                clear_admin_flag: role == Role::Admin && self.is_admin,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, role: Role) -> RoleAssignment {
        RoleAssignment {
            id,
            user_id: 7,
            role,
            assigned_date: Utc::now(),
        }
    }

    #[test]
    fn test_guest_is_always_held() {
        let resolver = RoleResolver::new(false, &[]);
        assert!(resolver.has_role(Role::Guest));
        assert_eq!(resolver.highest_role(), Role::Guest);
        assert_eq!(resolver.effective_roles().into_iter().collect::<Vec<_>>(), vec![Role::Guest]);
    }

    #[test]
    fn test_admin_flag_or_row() {
        assert!(RoleResolver::new(true, &[]).has_role(Role::Admin));

        let rows = [row(1, Role::Admin)];
        assert!(RoleResolver::new(false, &rows).has_role(Role::Admin));
        assert!(!RoleResolver::new(false, &[]).has_role(Role::Admin));
    }

    #[test]
    fn test_flag_short_circuits_highest_role() {
        assert_eq!(RoleResolver::new(true, &[]).highest_role(), Role::Admin);

        let rows = [row(1, Role::SuperAdmin)];
        assert_eq!(RoleResolver::new(true, &rows).highest_role(), Role::Admin);
        assert_eq!(RoleResolver::new(false, &rows).highest_role(), Role::SuperAdmin);
    }

    #[test]
    fn test_effective_roles_union() {
        let rows = [row(1, Role::SuperAdmin)];
        let roles: Vec<_> = RoleResolver::new(true, &rows).effective_roles().into_iter().collect();
        assert_eq!(roles, vec![Role::Guest, Role::Admin, Role::SuperAdmin]);
    }

    #[test]
    fn test_plan_assign_is_idempotent() {
        let rows = [row(3, Role::Admin)];
        let plan = RoleResolver::new(true, &rows).plan_assign(7, Role::Admin, Utc::now());
        assert_eq!(plan, AssignPlan::Existing(rows[0].clone()));
    }

    #[test]
    fn test_plan_assign_admin_raises_flag() {
        let now = Utc::now();
        let plan = RoleResolver::new(false, &[]).plan_assign(7, Role::Admin, now);
        assert_eq!(
            plan,
            AssignPlan::Insert {
                assignment: RoleAssignment::new(7, Role::Admin, now),
                set_admin_flag: true,
            }
        );

        let plan = RoleResolver::new(false, &[]).plan_assign(7, Role::SuperAdmin, now);
        assert!(matches!(plan, AssignPlan::Insert { set_admin_flag: false, .. }));
    }

    #[test]
    fn test_plan_remove() {
        assert_eq!(RoleResolver::new(true, &[]).plan_remove(Role::Admin), RemovePlan::Absent);

        let rows = [row(4, Role::Admin)];
        assert_eq!(
            RoleResolver::new(true, &rows).plan_remove(Role::Admin),
            RemovePlan::Delete {
                assignment: rows[0].clone(),
                clear_admin_flag: true,
            }
        );
    }
}
