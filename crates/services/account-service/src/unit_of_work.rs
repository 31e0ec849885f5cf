//! Unit of Work pattern implementation.
//!
//! A unit of work owns one entity store and hands out repositories bound to
//! it, so every repository sees the same staged writes and the same open
//! transaction. It is meant for one request or task and is never shared
//! between concurrent units of work.
//!
//! Scoped release: dropping a `Persistence` with an open transaction
//! abandons it, and the `transaction` helper rolls back when its future is
//! dropped before completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::future::BoxFuture;
use once_cell::sync::OnceCell;
use tracing::{debug, error, warn};

use common::{AppError, AppResult};
use domain::{Booking, Review};

use crate::repository::{
    Repository, RoleRepository, RoleStore, StoreRepository, UserRepository, UserStore,
};
use crate::store::{EntityStore, TransactionHandle};

/// Unit of Work trait for dependency injection.
///
/// Provides centralized access to all repositories and transaction management.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn users(&self) -> Arc<dyn UserRepository>;

    fn roles(&self) -> Arc<dyn RoleRepository>;

    fn bookings(&self) -> Arc<dyn Repository<Booking>>;

    fn reviews(&self) -> Arc<dyn Repository<Review>>;

    /// Flush every staged write; returns affected rows
    async fn save_changes(&self) -> AppResult<u64>;

    /// Fails with `Conflict` while a transaction is open
    async fn begin_transaction(&self) -> AppResult<TransactionHandle>;

    /// Save and commit. Any failure rolls back and returns the original error.
    ///
    /// Without an open transaction this only saves.
    async fn commit_transaction(&self) -> AppResult<()>;

    async fn rollback_transaction(&self) -> AppResult<()>;

    fn in_transaction(&self) -> bool;

    /// Roll back anything open and release the store. Safe to call twice.
    async fn dispose(&self) -> AppResult<()>;
}

/// Creates units of work over one backing database
pub trait UnitOfWorkFactory: Send + Sync {
    fn unit_of_work(&self) -> Persistence;
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    store: Arc<dyn EntityStore>,
    users: OnceCell<Arc<UserStore>>,
    roles: OnceCell<Arc<RoleStore>>,
    bookings: OnceCell<Arc<StoreRepository<Booking>>>,
    reviews: OnceCell<Arc<StoreRepository<Review>>>,
    transaction: Mutex<Option<TransactionHandle>>,
    disposed: AtomicBool,
}

impl Persistence {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            users: OnceCell::new(),
            roles: OnceCell::new(),
            bookings: OnceCell::new(),
            reviews: OnceCell::new(),
            transaction: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    fn lock_transaction(&self) -> MutexGuard<'_, Option<TransactionHandle>> {
        self.transaction.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Option<TransactionHandle> {
        *self.lock_transaction()
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(AppError::internal("unit of work used after dispose"));
        }
        Ok(())
    }

    /// Drop-time release: forget the handle and let the store discard it
    fn abandon_transaction(&self) {
        if let Some(handle) = self.lock_transaction().take() {
            warn!(transaction = handle.id(), "Abandoning open transaction");
            self.store.abandon();
        }
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err` or when
    /// the returned future is dropped before completion.
    pub async fn transaction<T, F>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(&'a Persistence) -> BoxFuture<'a, AppResult<T>> + Send,
        T: Send,
    {
        self.begin_transaction().await?;
        let _guard = RollbackGuard { uow: self };

        match f(self).await {
            Ok(value) => {
                self.commit_transaction().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback_transaction().await {
                    error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }
}

struct RollbackGuard<'a> {
    uow: &'a Persistence,
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        self.uow.abandon_transaction();
    }
}

impl Drop for Persistence {
    fn drop(&mut self) {
        self.abandon_transaction();
    }
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users
            .get_or_init(|| Arc::new(UserStore::new(self.store.clone())))
            .clone()
    }

    fn roles(&self) -> Arc<dyn RoleRepository> {
        self.roles
            .get_or_init(|| Arc::new(RoleStore::new(self.store.clone())))
            .clone()
    }

    fn bookings(&self) -> Arc<dyn Repository<Booking>> {
        self.bookings
            .get_or_init(|| Arc::new(StoreRepository::new(self.store.clone())))
            .clone()
    }

    fn reviews(&self) -> Arc<dyn Repository<Review>> {
        self.reviews
            .get_or_init(|| Arc::new(StoreRepository::new(self.store.clone())))
            .clone()
    }

    async fn save_changes(&self) -> AppResult<u64> {
        self.ensure_open()?;
        self.store.save_changes().await
    }

    async fn begin_transaction(&self) -> AppResult<TransactionHandle> {
        self.ensure_open()?;
        if let Some(open) = self.current() {
            return Err(AppError::conflict(format!(
                "transaction {} is already open",
                open.id()
            )));
        }

        let handle = self.store.begin_transaction().await?;
        *self.lock_transaction() = Some(handle);
        debug!(transaction = handle.id(), "Unit of work transaction started");
        Ok(handle)
    }

    async fn commit_transaction(&self) -> AppResult<()> {
        let Some(handle) = self.current() else {
            return self.save_changes().await.map(|_| ());
        };

        let result = match self.store.save_changes().await {
            Ok(_) => self.store.commit().await,
            Err(err) => Err(err),
        };
        self.lock_transaction().take();

        if let Err(err) = result {
            warn!(transaction = handle.id(), error = %err, "Commit failed, rolling back");
            if let Err(rollback_err) = self.store.rollback().await {
                error!("Transaction rollback failed: {}", rollback_err);
            }
            return Err(err);
        }

        debug!(transaction = handle.id(), "Unit of work committed");
        Ok(())
    }

    async fn rollback_transaction(&self) -> AppResult<()> {
        if let Some(handle) = self.lock_transaction().take() {
            debug!(transaction = handle.id(), "Unit of work rolled back");
        }
        self.store.rollback().await
    }

    fn in_transaction(&self) -> bool {
        self.current().is_some()
    }

    async fn dispose(&self) -> AppResult<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = if self.in_transaction() {
            self.rollback_transaction().await
        } else {
            Ok(())
        };
        self.store.abandon();
        result
    }
}

/// Run a block inside `Persistence::transaction`.
///
/// The block sees the unit of work under the given name and must evaluate
/// to an `AppResult`.
#[macro_export]
macro_rules! with_transaction {
    ($uow:expr, |$ctx:ident| $body:expr) => {
        $uow.transaction(|$ctx| Box::pin(async move { $body })).await
    };
}
