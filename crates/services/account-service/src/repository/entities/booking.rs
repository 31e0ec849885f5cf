//! Booking database entity.

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{NotSet, Set};

use domain::Booking;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub apartment_id: i64,
    #[sea_orm(unique)]
    pub reservation_number: String,
    pub check_in: Date,
    pub check_out: Date,
    pub created_at: DateTimeUtc,
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
    pub fn from_domain(booking: &Booking) -> Self {
        Self {
            id: if booking.id == 0 { NotSet } else { Set(booking.id) },
            user_id: Set(booking.user_id),
            apartment_id: Set(booking.apartment_id),
            reservation_number: Set(booking.reservation_number.clone()),
            check_in: Set(booking.check_in),
            check_out: Set(booking.check_out),
            created_at: Set(booking.created_at),
        }
    }
}

impl From<Model> for Booking {
    fn from(model: Model) -> Self {
        Booking {
            id: model.id,
            user_id: model.user_id,
            apartment_id: model.apartment_id,
            reservation_number: model.reservation_number,
            check_in: model.check_in,
            check_out: model.check_out,
            created_at: model.created_at,
        }
    }
}
