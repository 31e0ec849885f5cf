//! Account service - registration, credentials and role management.
//!
//! Every call opens its own unit of work; multi-step changes run inside one
//! transaction.

use async_trait::async_trait;
use serde::Serialize;

use common::{AppError, AppResult, OptionExt};
use domain::{Role, RoleAssignment, RoleResolver, User};

use crate::repository::{Repository, RoleRepository, UserRepository};
use crate::unit_of_work::{UnitOfWork, UnitOfWorkFactory};

/// Role view handed to the claims issuer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSummary {
    pub user_id: i64,
    /// Effective roles, lowest first
    pub roles: Vec<Role>,
    pub highest: Role,
    pub is_admin_flag: bool,
}

/// Account service trait for dependency injection.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Create a user from an already hashed password.
    ///
    /// Fails with `Duplicate` if the email or username is taken.
    async fn register(
        &self,
        email: &str,
        username: Option<String>,
        password_hash: String,
    ) -> AppResult<User>;

    async fn authenticate(&self, email: &str, password_hash: &str) -> AppResult<Option<User>>;

    async fn grant_role(&self, user_id: i64, role: Role) -> AppResult<RoleAssignment>;

    async fn revoke_role(&self, user_id: i64, role: Role) -> AppResult<bool>;

    /// Remove Admin in both representations: the row and the legacy flag
    async fn revoke_admin(&self, user_id: i64) -> AppResult<bool>;

    /// Fails with `NotFound` for an unknown user
    async fn role_summary(&self, user_id: i64) -> AppResult<RoleSummary>;

    async fn users_in_role(&self, role: Role) -> AppResult<Vec<User>>;
}

/// Concrete implementation of AccountService over a unit-of-work factory.
pub struct AccountManager<F> {
    factory: F,
}

impl<F: UnitOfWorkFactory> AccountManager<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl<F: UnitOfWorkFactory> AccountService for AccountManager<F> {
    async fn register(
        &self,
        email: &str,
        username: Option<String>,
        password_hash: String,
    ) -> AppResult<User> {
        let user = User::new(email, username, password_hash);
        user.validate()?;

        let uow = self.factory.unit_of_work();
        crate::with_transaction!(uow, |tx| {
            let users = tx.users();
            if users.email_exists(&user.email).await? {
                return Err(AppError::duplicate(format!("user with email {}", user.email)));
            }
            if let Some(username) = &user.username {
                if users.username_exists(username).await? {
                    return Err(AppError::duplicate(format!("user with username {}", username)));
                }
            }

            let email = user.email.clone();
            users.add(user).await?;
            tx.save_changes().await?;
            let created = users
                .get_by_email(&email)
                .await?
                .ok_or_else(|| AppError::internal(format!("user {} missing after save", email)))?;
            tracing::info!(user_id = created.id, "User registered");
            Ok::<_, AppError>(created)
        })
    }

    async fn authenticate(&self, email: &str, password_hash: &str) -> AppResult<Option<User>> {
        let uow = self.factory.unit_of_work();
        uow.users().validate_credentials(email, password_hash).await
    }

    async fn grant_role(&self, user_id: i64, role: Role) -> AppResult<RoleAssignment> {
        let uow = self.factory.unit_of_work();
        uow.roles().assign_role_to_user(user_id, role).await
    }

    async fn revoke_role(&self, user_id: i64, role: Role) -> AppResult<bool> {
        let uow = self.factory.unit_of_work();
        uow.roles().remove_role_from_user(user_id, role).await
    }

    async fn revoke_admin(&self, user_id: i64) -> AppResult<bool> {
        let uow = self.factory.unit_of_work();
        crate::with_transaction!(uow, |tx| {
            let roles = tx.roles();
            let row_removed = roles.remove_role_from_user(user_id, Role::Admin).await?;
            let flag_cleared = roles.set_legacy_admin_flag(user_id, false).await?;
            Ok::<_, AppError>(row_removed || flag_cleared)
        })
    }

    async fn role_summary(&self, user_id: i64) -> AppResult<RoleSummary> {
        let uow = self.factory.unit_of_work();
        let user = uow
            .users()
            .get_by_id(user_id)
            .await?
            .ok_or_not_found(format!("user {}", user_id))?;
        let rows = uow.roles().get_user_role_assignments(user_id).await?;

        let resolver = RoleResolver::new(user.is_admin, &rows);
        Ok(RoleSummary {
            user_id,
            roles: resolver.effective_roles().into_iter().collect(),
            highest: resolver.highest_role(),
            is_admin_flag: user.is_admin,
        })
    }

    async fn users_in_role(&self, role: Role) -> AppResult<Vec<User>> {
        let uow = self.factory.unit_of_work();
        uow.roles().get_users_in_role(role).await
    }
}
