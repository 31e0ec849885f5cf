//! Transaction behavior of units of work over the in-memory store.

mod support;

use std::time::Duration;

use account_service_lib::store::{EntityKind, InMemoryDatabase};
use account_service_lib::{Repository, RoleRepository, UnitOfWork, UnitOfWorkFactory};
use common::AppError;
use domain::{Role, User};

use crate::support::{reload_user, seed_user};

fn guest(email: &str) -> User {
    User::new(email, None, "hash".to_string())
}

#[tokio::test]
async fn test_failed_commit_persists_nothing() {
    let db = InMemoryDatabase::new();
    seed_user(&db, 1, "ann@example.com", false).await;
    let uow = db.unit_of_work();

    uow.begin_transaction().await.unwrap();
    uow.users().add(guest("bob@example.com")).await.unwrap();
    uow.roles().assign_role_to_user(1, Role::Admin).await.unwrap();

    db.fail_next_commit();
    let err = uow.commit_transaction().await.unwrap_err();

    assert!(matches!(err, AppError::Persistence(_)));
    assert!(!uow.in_transaction());
    assert_eq!(db.row_count(EntityKind::User), 1);
    assert_eq!(db.row_count(EntityKind::RoleAssignment), 0);

    let fresh = db.unit_of_work();
    assert!(fresh.users().get_by_email("bob@example.com").await.unwrap().is_none());
    assert!(!reload_user(&db, 1).await.unwrap().is_admin);
}

#[tokio::test]
async fn test_constraint_violation_at_commit_rolls_back_batch() {
    let db = InMemoryDatabase::new();
    seed_user(&db, 1, "ann@example.com", false).await;
    let uow = db.unit_of_work();

    uow.begin_transaction().await.unwrap();
    let users = uow.users();
    users.add(guest("bob@example.com")).await.unwrap();
    users.add(guest("ANN@example.com")).await.unwrap();

    let err = uow.commit_transaction().await.unwrap_err();
    assert!(matches!(err, AppError::Duplicate(_)));
    assert_eq!(db.row_count(EntityKind::User), 1);
    assert!(!uow.in_transaction());
}

#[tokio::test]
async fn test_writes_stay_private_until_commit() {
    let db = InMemoryDatabase::new();
    let writer = db.unit_of_work();
    let reader = db.unit_of_work();

    writer.begin_transaction().await.unwrap();
    writer.users().add(guest("ann@example.com")).await.unwrap();
    writer.save_changes().await.unwrap();

    assert!(writer.users().get_by_email("ann@example.com").await.unwrap().is_some());
    assert!(reader.users().get_by_email("ann@example.com").await.unwrap().is_none());

    writer.commit_transaction().await.unwrap();
    assert!(reader.users().get_by_email("ann@example.com").await.unwrap().is_some());
}

#[tokio::test]
async fn test_second_begin_conflicts() {
    let db = InMemoryDatabase::new();
    let uow = db.unit_of_work();

    let handle = uow.begin_transaction().await.unwrap();
    let err = uow.begin_transaction().await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert!(uow.in_transaction());
    uow.rollback_transaction().await.unwrap();

    let next = uow.begin_transaction().await.unwrap();
    assert_ne!(handle.id(), next.id());
}

#[tokio::test]
async fn test_rollback_discards_flushed_and_staged_writes() {
    let db = InMemoryDatabase::new();
    let uow = db.unit_of_work();

    uow.begin_transaction().await.unwrap();
    uow.users().add(guest("ann@example.com")).await.unwrap();
    uow.save_changes().await.unwrap();
    uow.users().add(guest("bob@example.com")).await.unwrap();

    uow.rollback_transaction().await.unwrap();
    assert!(!uow.in_transaction());
    assert_eq!(uow.users().count(None).await.unwrap(), 0);

    // nothing staged survives the rollback
    assert_eq!(uow.save_changes().await.unwrap(), 0);
    assert_eq!(db.row_count(EntityKind::User), 0);
}

#[tokio::test]
async fn test_save_without_transaction_writes_through() {
    let db = InMemoryDatabase::new();
    let uow = db.unit_of_work();

    uow.users()
        .add_range(vec![guest("ann@example.com"), guest("bob@example.com")])
        .await
        .unwrap();
    assert_eq!(db.row_count(EntityKind::User), 0);

    assert_eq!(uow.save_changes().await.unwrap(), 2);
    assert_eq!(db.row_count(EntityKind::User), 2);

    // commit with nothing open only saves
    uow.commit_transaction().await.unwrap();
}

#[tokio::test]
async fn test_dispose_releases_and_blocks_reuse() {
    let db = InMemoryDatabase::new();
    let uow = db.unit_of_work();

    uow.begin_transaction().await.unwrap();
    uow.users().add(guest("ann@example.com")).await.unwrap();
    uow.save_changes().await.unwrap();

    uow.dispose().await.unwrap();
    uow.dispose().await.unwrap();

    assert!(!uow.in_transaction());
    assert_eq!(db.row_count(EntityKind::User), 0);
    assert!(matches!(
        uow.begin_transaction().await,
        Err(AppError::Internal(_))
    ));
}

#[tokio::test]
async fn test_dropping_open_unit_of_work_discards_transaction() {
    let db = InMemoryDatabase::new();
    {
        let uow = db.unit_of_work();
        uow.begin_transaction().await.unwrap();
        uow.users().add(guest("ann@example.com")).await.unwrap();
        uow.save_changes().await.unwrap();
    }
    assert_eq!(db.row_count(EntityKind::User), 0);
}

#[tokio::test]
async fn test_transaction_helper_commits_on_success() {
    let db = InMemoryDatabase::new();
    seed_user(&db, 1, "ann@example.com", false).await;
    let uow = db.unit_of_work();

    let granted = account_service_lib::with_transaction!(uow, |tx| {
        tx.users().add(guest("bob@example.com")).await?;
        tx.save_changes().await?;
        let row = tx.roles().assign_role_to_user(1, Role::SuperAdmin).await?;
        Ok::<_, AppError>(row)
    })
    .unwrap();

    assert_eq!(granted.role, Role::SuperAdmin);
    assert!(!uow.in_transaction());
    assert_eq!(db.row_count(EntityKind::User), 2);
    assert_eq!(db.row_count(EntityKind::RoleAssignment), 1);
}

#[tokio::test]
async fn test_transaction_helper_rolls_back_on_error() {
    let db = InMemoryDatabase::new();
    let uow = db.unit_of_work();

    let result: Result<(), AppError> = account_service_lib::with_transaction!(uow, |tx| {
        tx.users().add(guest("ann@example.com")).await?;
        tx.save_changes().await?;
        Err::<(), _>(AppError::invalid_argument("abort"))
    });

    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    assert!(!uow.in_transaction());
    assert_eq!(db.row_count(EntityKind::User), 0);
}

#[tokio::test]
async fn test_cancelled_transaction_is_rolled_back() {
    let db = InMemoryDatabase::new();
    let uow = db.unit_of_work();

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        uow.transaction(|tx| {
            Box::pin(async move {
                tx.users().add(guest("ann@example.com")).await?;
                tx.save_changes().await?;
                futures::future::pending::<()>().await;
                Ok::<_, AppError>(())
            })
        }),
    )
    .await;

    assert!(outcome.is_err());
    assert!(!uow.in_transaction());
    assert_eq!(uow.users().count(None).await.unwrap(), 0);
    assert_eq!(db.row_count(EntityKind::User), 0);
}
