//! Role repository: role assignments reconciled with the legacy admin flag.
//!
//! Mutations read the user's current role state, ask `RoleResolver` for a
//! plan and apply it in one flush, so the `is_admin` flag and the Admin row
//! never change separately. Each mutation first saves whatever the caller
//! staged earlier, then saves its own changes as a batch of their own.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use common::{AppError, AppResult, OptionExt};
use domain::{AssignPlan, RemovePlan, Role, RoleAssignment, RoleResolver, User};

use super::base::{Repository, StoreRepository};
use crate::query::{fields, Filter, OrderBy, QuerySpec};

#[async_trait]
pub trait RoleRepository: Repository<RoleAssignment> {
    /// Stored rows of one user, lowest role first
    async fn get_user_role_assignments(&self, user_id: i64) -> AppResult<Vec<RoleAssignment>>;

    async fn get_role_assignment(&self, user_id: i64, role: Role) -> AppResult<Option<RoleAssignment>>;

    /// Grant `role`, returning the stored row.
    ///
    /// Granting a role the user already has returns the existing row. Granting
    /// Admin also raises the legacy flag. A concurrent grant of the same role
    /// is not an error: the winner's row is returned.
    async fn assign_role_to_user(&self, user_id: i64, role: Role) -> AppResult<RoleAssignment>;

    /// Revoke `role`; `false` if the user had no row for it.
    ///
    /// Revoking Admin also clears the legacy flag.
    async fn remove_role_from_user(&self, user_id: i64, role: Role) -> AppResult<bool>;

    /// Users holding a row for `role`; every user for `Guest`
    async fn get_users_in_role(&self, role: Role) -> AppResult<Vec<User>>;

    async fn user_has_role(&self, user_id: i64, role: Role) -> AppResult<bool>;

    /// Highest effective role; the legacy flag wins over any row
    async fn get_user_highest_role(&self, user_id: i64) -> AppResult<Role>;

    /// Effective role set in ascending order
    async fn get_user_roles(&self, user_id: i64) -> AppResult<Vec<Role>>;

    /// Set only the legacy flag. Returns whether the stored value changed.
    async fn set_legacy_admin_flag(&self, user_id: i64, value: bool) -> AppResult<bool>;
}

/// Store-backed role repository
pub type RoleStore = StoreRepository<RoleAssignment>;

impl StoreRepository<RoleAssignment> {
    async fn role_state(&self, user_id: i64) -> AppResult<Option<(User, Vec<RoleAssignment>)>> {
        let Some(user) = self.sibling::<User>().get_by_id(user_id).await? else {
            return Ok(None);
        };
        let rows = self.get_user_role_assignments(user_id).await?;
        Ok(Some((user, rows)))
    }
}

#[async_trait]
impl RoleRepository for StoreRepository<RoleAssignment> {
    async fn get_user_role_assignments(&self, user_id: i64) -> AppResult<Vec<RoleAssignment>> {
        let spec = QuerySpec::filtered(Filter::equals(fields::USER_ID, user_id))
            .order_by(OrderBy::asc(fields::role_assignment::ROLE));
        self.query(spec).await
    }

    async fn get_role_assignment(&self, user_id: i64, role: Role) -> AppResult<Option<RoleAssignment>> {
        self.single_or_default(
            Filter::equals(fields::USER_ID, user_id)
                .and(Filter::equals(fields::role_assignment::ROLE, role)),
        )
        .await
    }

    async fn assign_role_to_user(&self, user_id: i64, role: Role) -> AppResult<RoleAssignment> {
        if !role.is_materialized() {
            return Err(AppError::invalid_argument(format!(
                "the {} role is implicit and cannot be assigned",
                role
            )));
        }

        self.store().save_changes().await?;
        let (mut user, rows) = self
            .role_state(user_id)
            .await?
            .ok_or_not_found(format!("user {}", user_id))?;

        let (assignment, set_admin_flag) =
            match RoleResolver::new(user.is_admin, &rows).plan_assign(user_id, role, Utc::now()) {
                AssignPlan::Existing(existing) => return Ok(existing),
                AssignPlan::Insert {
                    assignment,
                    set_admin_flag,
                } => (assignment, set_admin_flag),
            };

        self.add(assignment).await?;
        if set_admin_flag {
            user.is_admin = true;
            self.sibling::<User>().update(user)?;
        }
        let own_batch = self.store().pending_changes() == 1 + usize::from(set_admin_flag);

        let conflict = match self.store().save_changes().await {
            Ok(_) => None,
            Err(AppError::Duplicate(detail)) if own_batch => Some(detail),
            Err(err) => return Err(err),
        };

        match (self.get_role_assignment(user_id, role).await?, conflict) {
            (Some(stored), None) => {
                info!(user_id, role = %role, "Role assigned");
                Ok(stored)
            }
            (Some(stored), Some(detail)) => {
                debug!(user_id, role = %role, %detail, "Role was assigned concurrently");
                Ok(stored)
            }
            (None, Some(detail)) => Err(AppError::Duplicate(detail)),
            (None, None) => Err(AppError::internal(format!(
                "role {} for user {} missing after save",
                role, user_id
            ))),
        }
    }

    async fn remove_role_from_user(&self, user_id: i64, role: Role) -> AppResult<bool> {
        if !role.is_materialized() {
            return Ok(false);
        }
        self.store().save_changes().await?;
        let Some((mut user, rows)) = self.role_state(user_id).await? else {
            return Ok(false);
        };

        match RoleResolver::new(user.is_admin, &rows).plan_remove(role) {
            RemovePlan::Absent => Ok(false),
            RemovePlan::Delete {
                assignment,
                clear_admin_flag,
            } => {
                self.remove(&assignment);
                if clear_admin_flag {
                    user.is_admin = false;
                    self.sibling::<User>().update(user)?;
                }
                // the flag update hits a row whenever the user still exists,
                // and a vanished user took its rows with it
                let affected = self.store().save_changes().await?;
                let removed = affected > u64::from(clear_admin_flag);
                if removed {
                    info!(user_id, role = %role, "Role removed");
                } else {
                    debug!(user_id, role = %role, "Role was removed concurrently");
                }
                Ok(removed)
            }
        }
    }

    async fn get_users_in_role(&self, role: Role) -> AppResult<Vec<User>> {
        let users = self.sibling::<User>();
        if !role.is_materialized() {
            return users.get_all().await;
        }

        let rows = self
            .find(Filter::equals(fields::role_assignment::ROLE, role))
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        users
            .find(Filter::one_of(fields::ID, rows.iter().map(|row| row.user_id)))
            .await
    }

    async fn user_has_role(&self, user_id: i64, role: Role) -> AppResult<bool> {
        if role == Role::Guest {
            return Ok(true);
        }
        Ok(match self.role_state(user_id).await? {
            Some((user, rows)) => RoleResolver::new(user.is_admin, &rows).has_role(role),
            None => false,
        })
    }

    async fn get_user_highest_role(&self, user_id: i64) -> AppResult<Role> {
        Ok(match self.role_state(user_id).await? {
            Some((user, rows)) => RoleResolver::new(user.is_admin, &rows).highest_role(),
            None => Role::Guest,
        })
    }

    async fn get_user_roles(&self, user_id: i64) -> AppResult<Vec<Role>> {
        Ok(match self.role_state(user_id).await? {
            Some((user, rows)) => RoleResolver::new(user.is_admin, &rows)
                .effective_roles()
                .into_iter()
                .collect(),
            None => vec![Role::Guest],
        })
    }

    async fn set_legacy_admin_flag(&self, user_id: i64, value: bool) -> AppResult<bool> {
        let users = self.sibling::<User>();
        let mut user = users
            .get_by_id(user_id)
            .await?
            .ok_or_not_found(format!("user {}", user_id))?;
        if user.is_admin == value {
            return Ok(false);
        }

        user.is_admin = value;
        users.update(user)?;
        let affected = self.store().save_changes().await?;
        info!(user_id, is_admin = value, "Legacy admin flag updated");
        Ok(affected > 0)
    }
}
