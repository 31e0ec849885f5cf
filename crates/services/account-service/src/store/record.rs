//! Entity kinds handled by the stores and their type-erased rows.

use serde::{Deserialize, Serialize};

use domain::{Booking, Review, RoleAssignment, User};

use crate::query::{fields, FieldValue, Relation};

/// Tables known to the account store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    RoleAssignment,
    Booking,
    Review,
}

impl EntityKind {
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::RoleAssignment => "role_assignments",
            EntityKind::Booking => "bookings",
            EntityKind::Review => "reviews",
        }
    }

    /// Column names accepted in filters and orderings
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            EntityKind::User => &[
                fields::ID,
                fields::user::EMAIL,
                fields::user::USERNAME,
                fields::user::PASSWORD_HASH,
                fields::user::IS_ADMIN,
                fields::CREATED_AT,
            ],
            EntityKind::RoleAssignment => &[
                fields::ID,
                fields::USER_ID,
                fields::role_assignment::ROLE,
                fields::role_assignment::ASSIGNED_DATE,
            ],
            EntityKind::Booking => &[
                fields::ID,
                fields::USER_ID,
                fields::booking::APARTMENT_ID,
                fields::booking::RESERVATION_NUMBER,
                fields::booking::CHECK_IN,
                fields::booking::CHECK_OUT,
                fields::CREATED_AT,
            ],
            EntityKind::Review => &[
                fields::ID,
                fields::USER_ID,
                fields::review::APARTMENT_ID,
                fields::review::RATING,
                fields::review::COMMENT,
                fields::CREATED_AT,
            ],
        }
    }

    pub fn has_column(self, name: &str) -> bool {
        self.columns().contains(&name)
    }
}

/// A row of any table
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    User(User),
    RoleAssignment(RoleAssignment),
    Booking(Booking),
    Review(Review),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::User(_) => EntityKind::User,
            Record::RoleAssignment(_) => EntityKind::RoleAssignment,
            Record::Booking(_) => EntityKind::Booking,
            Record::Review(_) => EntityKind::Review,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Record::User(row) => row.id,
            Record::RoleAssignment(row) => row.id,
            Record::Booking(row) => row.id,
            Record::Review(row) => row.id,
        }
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        match self {
            Record::User(row) => row.id = id,
            Record::RoleAssignment(row) => row.id = id,
            Record::Booking(row) => row.id = id,
            Record::Review(row) => row.id = id,
        }
    }

    /// Owning user, for tables with a `user_id` foreign key
    pub fn owner_id(&self) -> Option<i64> {
        match self {
            Record::User(_) => None,
            Record::RoleAssignment(row) => Some(row.user_id),
            Record::Booking(row) => Some(row.user_id),
            Record::Review(row) => Some(row.user_id),
        }
    }

    /// Column value, `None` for an unknown column
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        match self {
            Record::User(row) => row.field(name),
            Record::RoleAssignment(row) => row.field(name),
            Record::Booking(row) => row.field(name),
            Record::Review(row) => row.field(name),
        }
    }
}

/// A domain type the generic repository can manage.
pub trait Entity: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Persisted id, `0` when not yet saved
    fn id(&self) -> i64;

    fn field(&self, name: &str) -> Option<FieldValue>;

    fn into_record(self) -> Record;

    fn from_record(record: Record) -> Option<Self>;

    /// Related kind and its foreign key column, if `relation` applies
    fn relation(relation: Relation) -> Option<(EntityKind, &'static str)> {
        let _ = relation;
        None
    }

    /// Store eagerly loaded rows for `relation`
    fn attach(&mut self, relation: Relation, related: Vec<Record>) {
        let _ = (relation, related);
    }
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            fields::ID => self.id.into(),
            fields::user::EMAIL => self.email.clone().into(),
            fields::user::USERNAME => self.username.clone().into(),
            fields::user::PASSWORD_HASH => self.password_hash.clone().into(),
            fields::user::IS_ADMIN => self.is_admin.into(),
            fields::CREATED_AT => self.created_at.into(),
            _ => return None,
        })
    }

    fn into_record(self) -> Record {
        Record::User(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::User(user) => Some(user),
            _ => None,
        }
    }

    fn relation(relation: Relation) -> Option<(EntityKind, &'static str)> {
        match relation {
            Relation::Bookings => Some((EntityKind::Booking, fields::USER_ID)),
            Relation::Reviews => Some((EntityKind::Review, fields::USER_ID)),
        }
    }

    fn attach(&mut self, relation: Relation, related: Vec<Record>) {
        match relation {
            Relation::Bookings => {
                self.bookings = related.into_iter().filter_map(Booking::from_record).collect();
            }
            Relation::Reviews => {
                self.reviews = related.into_iter().filter_map(Review::from_record).collect();
            }
        }
    }
}

impl Entity for RoleAssignment {
    const KIND: EntityKind = EntityKind::RoleAssignment;

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            fields::ID => self.id.into(),
            fields::USER_ID => self.user_id.into(),
            fields::role_assignment::ROLE => self.role.into(),
            fields::role_assignment::ASSIGNED_DATE => self.assigned_date.into(),
            _ => return None,
        })
    }

    fn into_record(self) -> Record {
        Record::RoleAssignment(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::RoleAssignment(assignment) => Some(assignment),
            _ => None,
        }
    }
}

impl Entity for Booking {
    const KIND: EntityKind = EntityKind::Booking;

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            fields::ID => self.id.into(),
            fields::USER_ID => self.user_id.into(),
            fields::booking::APARTMENT_ID => self.apartment_id.into(),
            fields::booking::RESERVATION_NUMBER => self.reservation_number.clone().into(),
            fields::booking::CHECK_IN => self.check_in.into(),
            fields::booking::CHECK_OUT => self.check_out.into(),
            fields::CREATED_AT => self.created_at.into(),
            _ => return None,
        })
    }

    fn into_record(self) -> Record {
        Record::Booking(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Booking(booking) => Some(booking),
            _ => None,
        }
    }
}

impl Entity for Review {
    const KIND: EntityKind = EntityKind::Review;

    fn id(&self) -> i64 {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            fields::ID => self.id.into(),
            fields::USER_ID => self.user_id.into(),
            fields::review::APARTMENT_ID => self.apartment_id.into(),
            fields::review::RATING => self.rating.into(),
            fields::review::COMMENT => self.comment.clone().into(),
            fields::CREATED_AT => self.created_at.into(),
            _ => return None,
        })
    }

    fn into_record(self) -> Record {
        Record::Review(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Review(review) => Some(review),
            _ => None,
        }
    }
}
