//! Shared fixtures for the in-memory integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;

use account_service_lib::store::InMemoryDatabase;
use account_service_lib::{Repository, UnitOfWork, UnitOfWorkFactory, UserRepository};
use domain::{Booking, Review, User};

/// Insert a user with an explicit id and legacy flag
pub async fn seed_user(db: &InMemoryDatabase, id: i64, email: &str, is_admin: bool) -> User {
    let mut user = User::new(email, None, format!("hash:{}", email)).with_id(id);
    user.is_admin = is_admin;

    let uow = db.unit_of_work();
    uow.users().add(user).await.unwrap();
    uow.save_changes().await.unwrap();
    uow.users().get_by_id(id).await.unwrap().unwrap()
}

/// Insert `count` users with generated ids, emails `user01@example.com`...
pub async fn seed_numbered_users(db: &InMemoryDatabase, count: usize) {
    let uow = db.unit_of_work();
    let users: Vec<User> = (1..=count)
        .map(|n| User::new(&format!("user{:02}@example.com", n), None, "hash".to_string()))
        .collect();
    uow.users().add_range(users).await.unwrap();
    uow.save_changes().await.unwrap();
}

pub async fn seed_booking(db: &InMemoryDatabase, user_id: i64, reservation_number: &str) {
    let booking = Booking::new(
        user_id,
        100,
        reservation_number,
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(),
    )
    .unwrap();

    let uow = db.unit_of_work();
    uow.bookings().add(booking).await.unwrap();
    uow.save_changes().await.unwrap();
}

pub async fn seed_review(db: &InMemoryDatabase, user_id: i64, rating: i32) {
    let review = Review::new(user_id, 100, rating, "quiet street, bright rooms").unwrap();

    let uow = db.unit_of_work();
    uow.reviews().add(review).await.unwrap();
    uow.save_changes().await.unwrap();
}

/// Fresh read of a user through a new unit of work
pub async fn reload_user(db: &InMemoryDatabase, id: i64) -> Option<User> {
    db.unit_of_work().users().get_by_id(id).await.unwrap()
}

/// Look up a user by email through a new unit of work
pub async fn find_user(db: &InMemoryDatabase, email: &str) -> Option<User> {
    db.unit_of_work().users().get_by_email(email).await.unwrap()
}
