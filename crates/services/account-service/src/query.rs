//! Serializable query specifications.
//!
//! Repositories describe what they want with plain data (`QuerySpec`,
//! `Filter`, `OrderBy`) and every store evaluates it its own way: the
//! in-memory store walks its rows, the SeaORM store builds SQL conditions.
//! Field names are the snake_case column names of the target table.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use domain::Role;

/// Column names usable in filters and orderings.
pub mod fields {
    pub const ID: &str = "id";
    pub const USER_ID: &str = "user_id";
    pub const CREATED_AT: &str = "created_at";

    pub mod user {
        pub const EMAIL: &str = "email";
        pub const USERNAME: &str = "username";
        pub const PASSWORD_HASH: &str = "password_hash";
        pub const IS_ADMIN: &str = "is_admin";
    }

    pub mod role_assignment {
        pub const ROLE: &str = "role";
        pub const ASSIGNED_DATE: &str = "assigned_date";
    }

    pub mod booking {
        pub const APARTMENT_ID: &str = "apartment_id";
        pub const RESERVATION_NUMBER: &str = "reservation_number";
        pub const CHECK_IN: &str = "check_in";
        pub const CHECK_OUT: &str = "check_out";
    }

    pub mod review {
        pub const APARTMENT_ID: &str = "apartment_id";
        pub const RATING: &str = "rating";
        pub const COMMENT: &str = "comment";
    }
}

/// A column value as seen by filters and orderings.
///
/// Variants compare by declaration order first, so values of different
/// kinds never interleave when sorting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

/// Roles are stored by rank
impl From<Role> for FieldValue {
    fn from(role: Role) -> Self {
        FieldValue::Int(i64::from(role.rank()))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// Row predicate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Matches every row
    #[default]
    All,
    Eq(String, FieldValue),
    Ne(String, FieldValue),
    /// Case-insensitive text equality
    EqIgnoreCase(String, String),
    Gt(String, FieldValue),
    Lt(String, FieldValue),
    In(String, Vec<FieldValue>),
    IsNull(String),
    And(Vec<Filter>),
    /// An empty `Or` matches nothing
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn equals(field: &str, value: impl Into<FieldValue>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn not_equals(field: &str, value: impl Into<FieldValue>) -> Self {
        Filter::Ne(field.to_string(), value.into())
    }

    pub fn equals_ignore_case(field: &str, value: &str) -> Self {
        Filter::EqIgnoreCase(field.to_string(), value.to_string())
    }

    pub fn greater_than(field: &str, value: impl Into<FieldValue>) -> Self {
        Filter::Gt(field.to_string(), value.into())
    }

    pub fn less_than(field: &str, value: impl Into<FieldValue>) -> Self {
        Filter::Lt(field.to_string(), value.into())
    }

    pub fn one_of<V: Into<FieldValue>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(field: &str) -> Self {
        Filter::IsNull(field.to_string())
    }

    pub fn negate(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Conjunction, flattening nested `And`s and dropping `All`
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (left, right) => Filter::And(vec![left, right]),
        }
    }

    /// Disjunction
    pub fn or(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::Or(mut left), f) => {
                left.push(f);
                Filter::Or(left)
            }
            (left, right) => Filter::Or(vec![left, right]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// Relations that can be eager-loaded alongside a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Bookings,
    Reviews,
}

/// Complete description of a read.
///
/// Evaluation order: filter, includes, ordering, then `skip`/`take`.
/// Without an ordering, rows come back by ascending id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub include: Vec<Relation>,
    #[serde(default)]
    pub skip: Option<u64>,
    #[serde(default)]
    pub take: Option<u64>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn include(mut self, relation: Relation) -> Self {
        if !self.include.contains(&relation) {
            self.include.push(relation);
        }
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_flattens() {
        let filter = Filter::equals("a", 1i64)
            .and(Filter::All)
            .and(Filter::equals("b", 2i64))
            .and(Filter::equals("c", 3i64));
        match filter {
            Filter::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected conjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_option_maps_to_null() {
        assert_eq!(FieldValue::from(None::<String>), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("x")), FieldValue::Text("x".to_string()));
        assert_eq!(FieldValue::from(Role::SuperAdmin), FieldValue::Int(2));
    }

    #[test]
    fn test_spec_survives_json() {
        let spec = QuerySpec::filtered(Filter::equals_ignore_case(fields::user::EMAIL, "A@b.c"))
            .order_by(OrderBy::desc(fields::CREATED_AT))
            .include(Relation::Bookings)
            .skip(10)
            .take(10);

        let json = serde_json::to_string(&spec).unwrap();
        let parsed: QuerySpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, spec);
    }
}
