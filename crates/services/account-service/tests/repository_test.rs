//! Generic and user repository tests over the in-memory store.

mod support;

use account_service_lib::query::fields;
use account_service_lib::store::{EntityKind, InMemoryDatabase};
use account_service_lib::{
    AccountManager, AccountService, Filter, OrderBy, QuerySpec, Relation, Repository, UnitOfWork,
    UnitOfWorkFactory, UserRepository,
};
use common::{AppError, PaginationParams};
use domain::User;

use crate::support::{find_user, seed_booking, seed_numbered_users, seed_review, seed_user};

fn ids(users: &[User]) -> Vec<i64> {
    users.iter().map(|user| user.id).collect()
}

#[tokio::test]
async fn test_second_page_of_ten() {
    let db = InMemoryDatabase::new();
    seed_numbered_users(&db, 25).await;
    let uow = db.unit_of_work();

    let page = uow.users().get_paged(2, 10, QuerySpec::new()).await.unwrap();
    assert_eq!(ids(&page), (11..=20).collect::<Vec<i64>>());

    let last = uow.users().get_paged(3, 10, QuerySpec::new()).await.unwrap();
    assert_eq!(ids(&last), (21..=25).collect::<Vec<i64>>());

    let beyond = uow.users().get_paged(4, 10, QuerySpec::new()).await.unwrap();
    assert!(beyond.is_empty());
}

#[tokio::test]
async fn test_paging_rejects_zero() {
    let db = InMemoryDatabase::new();
    seed_numbered_users(&db, 3).await;
    let users = db.unit_of_work().users();

    let err = users.get_paged(0, 10, QuerySpec::new()).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    let err = users.get_paged(1, 0, QuerySpec::new()).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_paginate_reports_totals_for_filter() {
    let db = InMemoryDatabase::new();
    seed_numbered_users(&db, 25).await;
    let users = db.unit_of_work().users();

    let spec = QuerySpec::filtered(Filter::greater_than(fields::ID, 5))
        .order_by(OrderBy::desc(fields::ID));
    let page = users
        .paginate(PaginationParams::new(2, 8), spec)
        .await
        .unwrap();

    assert_eq!(page.meta.total, 20);
    assert_eq!(page.meta.total_pages, 3);
    assert_eq!(page.meta.page, 2);
    assert_eq!(ids(&page.data), (10..=17).rev().collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_predicate_reads() {
    let db = InMemoryDatabase::new();
    seed_user(&db, 1, "ann@example.com", true).await;
    seed_user(&db, 2, "bob@example.com", false).await;
    seed_user(&db, 3, "cid@example.com", false).await;
    let users = db.unit_of_work().users();

    let regular = users
        .find(Filter::equals(fields::user::IS_ADMIN, false))
        .await
        .unwrap();
    assert_eq!(ids(&regular), vec![2, 3]);

    assert!(users.exists(Filter::equals(fields::user::IS_ADMIN, true)).await.unwrap());
    assert!(!users.exists(Filter::equals(fields::ID, 9)).await.unwrap());
    assert_eq!(users.count(None).await.unwrap(), 3);
    assert_eq!(
        users
            .count(Some(Filter::one_of(fields::ID, [1, 3, 8])))
            .await
            .unwrap(),
        2
    );
    assert!(users.get_by_id(4).await.unwrap().is_none());
}

#[tokio::test]
async fn test_single_or_default_rejects_many() {
    let db = InMemoryDatabase::new();
    seed_user(&db, 1, "ann@example.com", false).await;
    seed_user(&db, 2, "bob@example.com", false).await;
    let users = db.unit_of_work().users();

    let err = users
        .single_or_default(Filter::equals(fields::user::IS_ADMIN, false))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "MULTIPLE_RESULTS");

    let one = users
        .single_or_default(Filter::equals(fields::ID, 2))
        .await
        .unwrap();
    assert_eq!(one.map(|user| user.email), Some("bob@example.com".to_string()));
    assert!(users
        .single_or_default(Filter::equals(fields::ID, 7))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_unknown_field_is_invalid() {
    let db = InMemoryDatabase::new();
    let users = db.unit_of_work().users();

    let err = users.find(Filter::equals("nickname", "ann")).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let spec = QuerySpec::new().order_by(OrderBy::asc("nickname"));
    assert!(users.query(spec).await.is_err());
}

#[tokio::test]
async fn test_add_rejects_stored_id() {
    let db = InMemoryDatabase::new();
    seed_user(&db, 4, "ann@example.com", false).await;
    let uow = db.unit_of_work();

    let clash = User::new("bob@example.com", None, "hash".to_string()).with_id(4);
    let err = uow.users().add(clash).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    assert_eq!(uow.save_changes().await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_and_remove() {
    let db = InMemoryDatabase::new();
    seed_user(&db, 1, "ann@example.com", false).await;
    seed_user(&db, 2, "bob@example.com", false).await;
    seed_booking(&db, 2, "R-200").await;
    let uow = db.unit_of_work();
    let users = uow.users();

    let mut ann = users.get_by_id(1).await.unwrap().unwrap();
    ann.username = Some("ann".to_string());
    users.update(ann).unwrap();
    let unsaved = User::new("new@example.com", None, "hash".to_string());
    assert!(users.update(unsaved).is_err());
    uow.save_changes().await.unwrap();
    assert_eq!(
        users.get_by_username("ann").await.unwrap().map(|user| user.id),
        Some(1)
    );

    let bob = users.get_by_id(2).await.unwrap().unwrap();
    users.remove(&bob);
    assert_eq!(uow.save_changes().await.unwrap(), 1);
    assert_eq!(db.row_count(EntityKind::User), 1);
    // bookings follow their owner
    assert_eq!(db.row_count(EntityKind::Booking), 0);
}

#[tokio::test]
async fn test_relations_load_on_request() {
    let db = InMemoryDatabase::new();
    seed_user(&db, 1, "ann@example.com", false).await;
    seed_user(&db, 2, "bob@example.com", false).await;
    seed_booking(&db, 1, "R-100").await;
    seed_booking(&db, 1, "R-101").await;
    seed_booking(&db, 2, "R-200").await;
    seed_review(&db, 1, 4).await;
    let uow = db.unit_of_work();
    let users = uow.users();

    let plain = users.get_by_id(1).await.unwrap().unwrap();
    assert!(plain.bookings.is_empty());

    let with_bookings = users.get_with_bookings(1).await.unwrap().unwrap();
    let numbers: Vec<&str> = with_bookings
        .bookings
        .iter()
        .map(|booking| booking.reservation_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["R-100", "R-101"]);
    assert!(with_bookings.reviews.is_empty());

    let with_reviews = users.get_with_reviews(1).await.unwrap().unwrap();
    assert_eq!(with_reviews.reviews.len(), 1);
    assert_eq!(with_reviews.reviews[0].rating, 4);

    let both = users
        .query(
            QuerySpec::new()
                .include(Relation::Bookings)
                .include(Relation::Reviews),
        )
        .await
        .unwrap();
    assert_eq!(both[1].bookings.len(), 1);
    assert!(both[1].reviews.is_empty());

    let err = uow
        .bookings()
        .query(QuerySpec::new().include(Relation::Reviews))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_email_lookup_ignores_case_and_blank_input() {
    let db = InMemoryDatabase::new();
    seed_user(&db, 1, "ann@example.com", false).await;
    let users = db.unit_of_work().users();

    let found = users.get_by_email("  ANN@Example.com ").await.unwrap();
    assert_eq!(found.map(|user| user.id), Some(1));
    assert!(users.get_by_email("   ").await.unwrap().is_none());
    assert!(users.get_by_username("").await.unwrap().is_none());
    assert!(users.email_exists("Ann@example.com").await.unwrap());
    assert!(!users.email_exists("").await.unwrap());
    assert!(!users.username_exists("ann").await.unwrap());
}

#[tokio::test]
async fn test_find_by_reservation_checks_owner_email() {
    let db = InMemoryDatabase::new();
    seed_user(&db, 1, "ann@example.com", false).await;
    seed_user(&db, 2, "bob@example.com", false).await;
    seed_booking(&db, 1, "R-100").await;
    let users = db.unit_of_work().users();

    let owner = users
        .find_by_reservation("Ann@example.com", "R-100")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner.id, 1);
    assert_eq!(owner.bookings.len(), 1);

    assert!(users.find_by_reservation("bob@example.com", "R-100").await.unwrap().is_none());
    assert!(users.find_by_reservation("ann@example.com", "R-999").await.unwrap().is_none());
    assert!(users.find_by_reservation("", "R-100").await.unwrap().is_none());
}

#[tokio::test]
async fn test_validate_credentials() {
    let db = InMemoryDatabase::new();
    seed_user(&db, 1, "ann@example.com", false).await;
    let users = db.unit_of_work().users();

    let ok = users
        .validate_credentials("ann@example.com", "hash:ann@example.com")
        .await
        .unwrap();
    assert_eq!(ok.map(|user| user.id), Some(1));
    assert!(users
        .validate_credentials("ann@example.com", "wrong")
        .await
        .unwrap()
        .is_none());
    assert!(users
        .validate_credentials("nobody@example.com", "hash:nobody@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_register_rejects_taken_email_and_username() {
    let db = InMemoryDatabase::new();
    let service = AccountManager::new(db.clone());

    let ann = service
        .register("Ann@Example.com", Some("ann".to_string()), "h1".to_string())
        .await
        .unwrap();
    assert!(ann.id > 0);
    assert_eq!(ann.email, "ann@example.com");
    assert!(!ann.is_admin);

    let err = service
        .register("ANN@example.com", None, "h2".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Duplicate(_)));

    let err = service
        .register("other@example.com", Some("ann".to_string()), "h3".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Duplicate(_)));

    let err = service
        .register("not-an-email", None, "h4".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    assert_eq!(db.row_count(EntityKind::User), 1);
    assert_eq!(
        service.authenticate("ann@example.com", "h1").await.unwrap().map(|u| u.id),
        Some(ann.id)
    );
    assert!(find_user(&db, "other@example.com").await.is_none());
}
