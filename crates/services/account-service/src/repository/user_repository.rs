//! User repository: lookups by credentials, username and reservation.

use async_trait::async_trait;

use common::AppResult;
use domain::{Booking, User};

use super::base::{Repository, StoreRepository};
use crate::query::{fields, Filter, QuerySpec, Relation};

/// User-specific queries on top of the generic repository.
///
/// Blank email or username input never matches anything.
#[async_trait]
pub trait UserRepository: Repository<User> {
    /// Case-insensitive email lookup
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn get_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// User with bookings loaded
    async fn get_with_bookings(&self, user_id: i64) -> AppResult<Option<User>>;

    /// User with reviews loaded
    async fn get_with_reviews(&self, user_id: i64) -> AppResult<Option<User>>;

    /// User whose email matches and whose stored hash equals `password_hash`
    async fn validate_credentials(&self, email: &str, password_hash: &str) -> AppResult<Option<User>>;

    /// Owner of the booking with `reservation_number`, if their email matches.
    ///
    /// The returned user has bookings loaded.
    async fn find_by_reservation(&self, email: &str, reservation_number: &str) -> AppResult<Option<User>>;

    async fn email_exists(&self, email: &str) -> AppResult<bool>;

    async fn username_exists(&self, username: &str) -> AppResult<bool>;
}

/// Store-backed user repository
pub type UserStore = StoreRepository<User>;

fn non_blank(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[async_trait]
impl UserRepository for StoreRepository<User> {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let Some(email) = non_blank(email) else {
            return Ok(None);
        };
        self.single_or_default(Filter::equals_ignore_case(fields::user::EMAIL, email))
            .await
    }

    async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let Some(username) = non_blank(username) else {
            return Ok(None);
        };
        self.single_or_default(Filter::equals(fields::user::USERNAME, username))
            .await
    }

    async fn get_with_bookings(&self, user_id: i64) -> AppResult<Option<User>> {
        let spec = QuerySpec::filtered(Filter::equals(fields::ID, user_id)).include(Relation::Bookings);
        Ok(self.query(spec).await?.into_iter().next())
    }

    async fn get_with_reviews(&self, user_id: i64) -> AppResult<Option<User>> {
        let spec = QuerySpec::filtered(Filter::equals(fields::ID, user_id)).include(Relation::Reviews);
        Ok(self.query(spec).await?.into_iter().next())
    }

    async fn validate_credentials(&self, email: &str, password_hash: &str) -> AppResult<Option<User>> {
        let user = self.get_by_email(email).await?;
        Ok(user.filter(|user| user.password_hash == password_hash))
    }

    async fn find_by_reservation(&self, email: &str, reservation_number: &str) -> AppResult<Option<User>> {
        let (Some(email), Some(number)) = (non_blank(email), non_blank(reservation_number)) else {
            return Ok(None);
        };

        let bookings = self
            .sibling::<Booking>()
            .find(Filter::equals(fields::booking::RESERVATION_NUMBER, number))
            .await?;
        if bookings.is_empty() {
            return Ok(None);
        }

        let owners: Vec<i64> = bookings.iter().map(|booking| booking.user_id).collect();
        let spec = QuerySpec::filtered(
            Filter::one_of(fields::ID, owners)
                .and(Filter::equals_ignore_case(fields::user::EMAIL, email)),
        )
        .include(Relation::Bookings)
        .take(1);
        Ok(self.query(spec).await?.into_iter().next())
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        match non_blank(email) {
            Some(email) => {
                self.exists(Filter::equals_ignore_case(fields::user::EMAIL, email))
                    .await
            }
            None => Ok(false),
        }
    }

    async fn username_exists(&self, username: &str) -> AppResult<bool> {
        match non_blank(username) {
            Some(username) => {
                self.exists(Filter::equals(fields::user::USERNAME, username))
                    .await
            }
            None => Ok(false),
        }
    }
}
