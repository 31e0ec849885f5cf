//! Bookings and reviews owned by a user.
//!
//! Only the fields the account core needs are modelled here; apartment and
//! media details live with their own services.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_REVIEW_RATING, MIN_REVIEW_RATING};
use crate::error::{DomainError, DomainResult};

/// A reservation of an apartment by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub apartment_id: i64,
    /// Public reservation code quoted by the guest
    pub reservation_number: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        user_id: i64,
        apartment_id: i64,
        reservation_number: impl Into<String>,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> DomainResult<Self> {
        if check_out <= check_in {
            return Err(DomainError::validation("check-out must be after check-in"));
        }
        Ok(Self {
            id: 0,
            user_id,
            apartment_id,
            reservation_number: reservation_number.into(),
            check_in,
            check_out,
            created_at: Utc::now(),
        })
    }

    /// Number of nights covered by the booking
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

/// A user's review of an apartment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub user_id: i64,
    pub apartment_id: i64,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(
        user_id: i64,
        apartment_id: i64,
        rating: i32,
        comment: impl Into<String>,
    ) -> DomainResult<Self> {
        if !(MIN_REVIEW_RATING..=MAX_REVIEW_RATING).contains(&rating) {
            return Err(DomainError::validation(format!(
                "rating must be between {} and {}",
                MIN_REVIEW_RATING, MAX_REVIEW_RATING
            )));
        }
        Ok(Self {
            id: 0,
            user_id,
            apartment_id,
            rating,
            comment: comment.into(),
            created_at: Utc::now(),
        })
    }
}
