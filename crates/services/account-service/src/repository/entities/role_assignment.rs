//! Role assignment database entity.
//!
//! Roles are stored by rank; `(user_id, role)` carries a unique index.

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{NotSet, Set};

use domain::{DomainError, Role, RoleAssignment};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "role_assignments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub role: i32,
    pub assigned_date: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn from_domain(assignment: &RoleAssignment) -> Self {
        Self {
            id: if assignment.id == 0 { NotSet } else { Set(assignment.id) },
            user_id: Set(assignment.user_id),
            role: Set(assignment.role.rank()),
            assigned_date: Set(assignment.assigned_date),
        }
    }
}

impl TryFrom<Model> for RoleAssignment {
    type Error = DomainError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(RoleAssignment {
            id: model.id,
            user_id: model.user_id,
            role: Role::from_rank(model.role)?,
            assigned_date: model.assigned_date,
        })
    }
}
