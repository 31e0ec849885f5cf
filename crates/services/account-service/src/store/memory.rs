//! In-memory entity store for tests and local development.
//!
//! `InMemoryDatabase` holds the committed tables and is shared by every
//! store created from it. Each `InMemoryStore` keeps its own staged writes
//! and, while a transaction is open, a journal of batches flushed inside it.
//! Reads inside a transaction see the committed tables with the journal
//! replayed on top; other stores see the journal only after commit.
//!
//! The tables enforce the same constraints as the SQL schema: primary keys,
//! unique email (case-insensitive), unique username, unique
//! `(user_id, role)`, unique reservation number, and `user_id` foreign keys
//! with cascading user deletes.
//!
//! Generated ids come from per-table sequences shared by every store, so ids
//! handed out inside concurrent transactions never collide at commit. A
//! journaled grant whose `(user_id, role)` pair was committed by another
//! transaction in the meantime is dropped at commit, as a waiting insert
//! would end on the winner's row in PostgreSQL.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sea_orm::DbErr;
use tracing::{debug, warn};

use common::{AppError, AppResult};

use super::{Change, EntityKind, EntityStore, Record, TransactionHandle};
use crate::query::{FieldValue, Filter, OrderBy, QuerySpec, SortDirection};
use crate::unit_of_work::{Persistence, UnitOfWorkFactory};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    sequences: Sequences,
    next_transaction: AtomicU64,
    fail_next_commit: AtomicBool,
}

/// Committed state shared by all stores created from it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    shared: Arc<Shared>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh store with no open transaction
    pub fn store(&self) -> InMemoryStore {
        InMemoryStore {
            db: self.clone(),
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Make the next transaction commit fail after its writes were flushed
    pub fn fail_next_commit(&self) {
        self.shared.fail_next_commit.store(true, AtomicOrdering::SeqCst);
    }

    /// Committed row count of one table
    pub fn row_count(&self, kind: EntityKind) -> usize {
        lock(&self.shared.tables).rows(kind).count()
    }

    fn take_commit_failure(&self) -> bool {
        self.shared.fail_next_commit.swap(false, AtomicOrdering::SeqCst)
    }

    fn next_handle(&self) -> TransactionHandle {
        TransactionHandle::new(self.shared.next_transaction.fetch_add(1, AtomicOrdering::SeqCst) + 1)
    }
}

impl UnitOfWorkFactory for InMemoryDatabase {
    fn unit_of_work(&self) -> Persistence {
        Persistence::new(Arc::new(self.store()))
    }
}

/// Last id handed out per table
#[derive(Debug, Default)]
struct Sequences {
    last: Mutex<BTreeMap<EntityKind, i64>>,
}

impl Sequences {
    /// Next id above both the sequence and `floor`, the highest id in view
    fn next(&self, kind: EntityKind, floor: i64) -> i64 {
        let mut last = lock(&self.last);
        let value = last.entry(kind).or_insert(0);
        *value = (*value).max(floor) + 1;
        *value
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: BTreeMap<EntityKind, BTreeMap<i64, Record>>,
}

impl Tables {
    fn rows(&self, kind: EntityKind) -> impl Iterator<Item = &Record> {
        self.rows.get(&kind).into_iter().flat_map(|table| table.values())
    }

    fn get(&self, kind: EntityKind, id: i64) -> Option<&Record> {
        self.rows.get(&kind).and_then(|table| table.get(&id))
    }

    fn table_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<i64, Record> {
        self.rows.entry(kind).or_default()
    }

    fn max_id(&self, kind: EntityKind) -> i64 {
        self.rows
            .get(&kind)
            .and_then(|table| table.keys().next_back())
            .copied()
            .unwrap_or(0)
    }

    /// Apply `changes` to a copy, leaving `self` untouched on failure.
    ///
    /// Generated ids are drawn from `ids` and written back into the insert
    /// changes.
    fn apply_batch(&self, changes: &mut [Change], ids: &Sequences) -> AppResult<(Tables, u64)> {
        let mut next = self.clone();
        let mut affected = 0;
        for change in changes.iter_mut() {
            affected += next.apply(change, ids)?;
        }
        Ok((next, affected))
    }

    fn apply(&mut self, change: &mut Change, ids: &Sequences) -> AppResult<u64> {
        match change {
            Change::Insert(record) => {
                let kind = record.kind();
                if record.id() == 0 {
                    record.set_id(ids.next(kind, self.max_id(kind)));
                } else if self.get(kind, record.id()).is_some() {
                    return Err(AppError::duplicate(format!(
                        "{} row {}",
                        kind.table_name(),
                        record.id()
                    )));
                }
                self.check_constraints(record)?;
                self.table_mut(kind).insert(record.id(), detached(record.clone()));
                Ok(1)
            }
            Change::Update(record) => {
                let kind = record.kind();
                if self.get(kind, record.id()).is_none() {
                    return Ok(0);
                }
                self.check_constraints(record)?;
                self.table_mut(kind).insert(record.id(), detached(record.clone()));
                Ok(1)
            }
            Change::Delete { kind, id } => {
                let (kind, id) = (*kind, *id);
                if self.table_mut(kind).remove(&id).is_none() {
                    return Ok(0);
                }
                if kind == EntityKind::User {
                    for dependent in [EntityKind::RoleAssignment, EntityKind::Booking, EntityKind::Review] {
                        self.table_mut(dependent)
                            .retain(|_, row| row.owner_id() != Some(id));
                    }
                }
                Ok(1)
            }
        }
    }

    /// Drop journaled grants of a `(user_id, role)` pair that is already
    /// committed and not deleted by the same journal
    fn settle_concurrent_grants(&self, changes: Vec<Change>) -> Vec<Change> {
        let deleted: Vec<i64> = changes
            .iter()
            .filter_map(|change| match change {
                Change::Delete {
                    kind: EntityKind::RoleAssignment,
                    id,
                } => Some(*id),
                _ => None,
            })
            .collect();

        changes
            .into_iter()
            .filter(|change| {
                let Change::Insert(Record::RoleAssignment(grant)) = change else {
                    return true;
                };
                let granted = self.rows(EntityKind::RoleAssignment).any(|row| {
                    matches!(row, Record::RoleAssignment(other)
                        if other.id != grant.id
                            && other.user_id == grant.user_id
                            && other.role == grant.role
                            && !deleted.contains(&other.id))
                });
                if granted {
                    debug!(
                        user_id = grant.user_id,
                        role = %grant.role,
                        "Role already granted by another transaction"
                    );
                }
                !granted
            })
            .collect()
    }

    fn check_constraints(&self, record: &Record) -> AppResult<()> {
        if let Some(user_id) = record.owner_id() {
            if self.get(EntityKind::User, user_id).is_none() {
                return Err(AppError::Persistence(DbErr::Custom(format!(
                    "insert or update on {} violates foreign key: user {} does not exist",
                    record.kind().table_name(),
                    user_id
                ))));
            }
        }

        let mut others = self
            .rows(record.kind())
            .filter(|row| row.id() != record.id());

        let clash = match record {
            Record::User(user) => others.find_map(|row| match row {
                Record::User(other) if other.email.to_lowercase() == user.email.to_lowercase() => {
                    Some(format!("user with email {}", user.email))
                }
                Record::User(other) if user.username.is_some() && other.username == user.username => {
                    Some(format!(
                        "user with username {}",
                        user.username.as_deref().unwrap_or_default()
                    ))
                }
                _ => None,
            }),
            Record::RoleAssignment(assignment) => others.find_map(|row| match row {
                Record::RoleAssignment(other)
                    if other.user_id == assignment.user_id && other.role == assignment.role =>
                {
                    Some(format!(
                        "role {} for user {}",
                        assignment.role, assignment.user_id
                    ))
                }
                _ => None,
            }),
            Record::Booking(booking) => others.find_map(|row| match row {
                Record::Booking(other) if other.reservation_number == booking.reservation_number => {
                    Some(format!("booking {}", booking.reservation_number))
                }
                _ => None,
            }),
            Record::Review(_) => None,
        };

        match clash {
            Some(what) => Err(AppError::Duplicate(what)),
            None => Ok(()),
        }
    }
}

/// Eager-loaded relations are never stored with the owning row
fn detached(record: Record) -> Record {
    match record {
        Record::User(mut user) => {
            user.bookings.clear();
            user.reviews.clear();
            Record::User(user)
        }
        other => other,
    }
}

#[derive(Debug)]
struct Journal {
    handle: TransactionHandle,
    changes: Vec<Change>,
}

#[derive(Debug, Default)]
struct StoreState {
    pending: Vec<Change>,
    journal: Option<Journal>,
}

/// One unit of work's view of an `InMemoryDatabase`.
#[derive(Debug)]
pub struct InMemoryStore {
    db: InMemoryDatabase,
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    fn journaled(&self) -> Option<Vec<Change>> {
        lock(&self.state)
            .journal
            .as_ref()
            .map(|journal| journal.changes.clone())
    }

    /// Committed tables plus this store's flushed-but-uncommitted writes
    fn snapshot(&self) -> AppResult<Tables> {
        let journaled = self.journaled();
        let committed = lock(&self.db.shared.tables).clone();
        match journaled {
            Some(changes) => {
                let mut changes = committed.settle_concurrent_grants(changes);
                committed
                    .apply_batch(&mut changes, &self.db.shared.sequences)
                    .map(|(view, _)| view)
            }
            None => Ok(committed),
        }
    }

    fn flush(&self) -> AppResult<u64> {
        let mut batch = std::mem::take(&mut lock(&self.state).pending);
        if batch.is_empty() {
            return Ok(0);
        }

        let ids = &self.db.shared.sequences;
        match self.journaled() {
            None => {
                let mut tables = lock(&self.db.shared.tables);
                let (next, affected) = tables.apply_batch(&mut batch, ids)?;
                *tables = next;
                debug!(changes = batch.len(), affected, "Flushed batch");
                Ok(affected)
            }
            Some(journaled) => {
                let committed = lock(&self.db.shared.tables).clone();
                let mut journaled = committed.settle_concurrent_grants(journaled);
                let (view, _) = committed.apply_batch(&mut journaled, ids)?;
                let (_, affected) = view.apply_batch(&mut batch, ids)?;
                debug!(changes = batch.len(), affected, "Flushed batch inside transaction");
                if let Some(journal) = lock(&self.state).journal.as_mut() {
                    journal.changes.extend(batch);
                }
                Ok(affected)
            }
        }
    }

    fn commit_now(&self) -> AppResult<()> {
        if !self.in_transaction() {
            return self.flush().map(|_| ());
        }

        if let Err(err) = self.flush() {
            warn!(error = %err, "Flush failed during commit, rolling back");
            self.discard();
            return Err(err);
        }

        let Some(journal) = lock(&self.state).journal.take() else {
            return Ok(());
        };

        if self.db.take_commit_failure() {
            warn!(transaction = journal.handle.id(), "Commit failed, transaction rolled back");
            return Err(AppError::Persistence(DbErr::Custom(
                "commit failed: connection lost".to_string(),
            )));
        }

        let mut tables = lock(&self.db.shared.tables);
        let mut changes = tables.settle_concurrent_grants(journal.changes);
        let (next, _) = tables.apply_batch(&mut changes, &self.db.shared.sequences)?;
        *tables = next;
        debug!(transaction = journal.handle.id(), "Transaction committed");
        Ok(())
    }

    fn discard(&self) {
        let mut state = lock(&self.state);
        state.pending.clear();
        if let Some(journal) = state.journal.take() {
            debug!(transaction = journal.handle.id(), "Transaction rolled back");
        }
    }

    fn select(&self, kind: EntityKind, spec: &QuerySpec) -> AppResult<Vec<Record>> {
        check_filter(kind, &spec.filter)?;
        check_order(kind, &spec.order_by)?;

        let tables = self.snapshot()?;
        let mut rows: Vec<Record> = tables
            .rows(kind)
            .filter(|row| matches(row, &spec.filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| compare_rows(a, b, &spec.order_by));

        let skip = usize::try_from(spec.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let take = spec
            .take
            .map_or(usize::MAX, |take| usize::try_from(take).unwrap_or(usize::MAX));
        Ok(rows.into_iter().skip(skip).take(take).collect())
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn begin_transaction(&self) -> AppResult<TransactionHandle> {
        let mut state = lock(&self.state);
        if let Some(journal) = &state.journal {
            return Err(AppError::conflict(format!(
                "transaction {} is already open",
                journal.handle.id()
            )));
        }
        let handle = self.db.next_handle();
        state.journal = Some(Journal {
            handle,
            changes: Vec::new(),
        });
        debug!(transaction = handle.id(), "Transaction started");
        Ok(handle)
    }

    async fn commit(&self) -> AppResult<()> {
        tokio::task::yield_now().await;
        self.commit_now()
    }

    async fn rollback(&self) -> AppResult<()> {
        self.discard();
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        lock(&self.state).journal.is_some()
    }

    fn stage(&self, change: Change) {
        lock(&self.state).pending.push(change);
    }

    fn pending_changes(&self) -> usize {
        lock(&self.state).pending.len()
    }

    async fn save_changes(&self) -> AppResult<u64> {
        tokio::task::yield_now().await;
        self.flush()
    }

    async fn query(&self, kind: EntityKind, spec: &QuerySpec) -> AppResult<Vec<Record>> {
        tokio::task::yield_now().await;
        self.select(kind, spec)
    }

    async fn count(&self, kind: EntityKind, filter: &Filter) -> AppResult<u64> {
        tokio::task::yield_now().await;
        check_filter(kind, filter)?;
        let tables = self.snapshot()?;
        Ok(tables.rows(kind).filter(|row| matches(row, filter)).count() as u64)
    }

    fn abandon(&self) {
        self.discard();
    }
}

fn unknown_field(kind: EntityKind, field: &str) -> AppError {
    AppError::invalid_argument(format!(
        "unknown field `{}` on {}",
        field,
        kind.table_name()
    ))
}

fn check_filter(kind: EntityKind, filter: &Filter) -> AppResult<()> {
    match filter {
        Filter::All => Ok(()),
        Filter::Eq(field, _)
        | Filter::Ne(field, _)
        | Filter::EqIgnoreCase(field, _)
        | Filter::Gt(field, _)
        | Filter::Lt(field, _)
        | Filter::In(field, _)
        | Filter::IsNull(field) => {
            if kind.has_column(field) {
                Ok(())
            } else {
                Err(unknown_field(kind, field))
            }
        }
        Filter::And(parts) | Filter::Or(parts) => {
            parts.iter().try_for_each(|part| check_filter(kind, part))
        }
        Filter::Not(inner) => check_filter(kind, inner),
    }
}

fn check_order(kind: EntityKind, order: &[OrderBy]) -> AppResult<()> {
    match order.iter().find(|key| !kind.has_column(&key.field)) {
        Some(key) => Err(unknown_field(kind, &key.field)),
        None => Ok(()),
    }
}

fn value_of(row: &Record, field: &str) -> FieldValue {
    row.field(field).unwrap_or(FieldValue::Null)
}

/// Ordering of two non-null values of the same type
fn compare_same_type(left: &FieldValue, right: &FieldValue) -> Option<Ordering> {
    if left == &FieldValue::Null || right == &FieldValue::Null {
        return None;
    }
    if std::mem::discriminant(left) != std::mem::discriminant(right) {
        return None;
    }
    Some(left.cmp(right))
}

fn matches(row: &Record, filter: &Filter) -> bool {
    match filter {
        Filter::All => true,
        Filter::Eq(field, FieldValue::Null) | Filter::IsNull(field) => {
            value_of(row, field) == FieldValue::Null
        }
        Filter::Eq(field, value) => &value_of(row, field) == value,
        Filter::Ne(field, FieldValue::Null) => value_of(row, field) != FieldValue::Null,
        Filter::Ne(field, value) => {
            let current = value_of(row, field);
            current != FieldValue::Null && &current != value
        }
        Filter::EqIgnoreCase(field, expected) => match value_of(row, field) {
            FieldValue::Text(text) => text.to_lowercase() == expected.to_lowercase(),
            _ => false,
        },
        Filter::Gt(field, value) => {
            compare_same_type(&value_of(row, field), value) == Some(Ordering::Greater)
        }
        Filter::Lt(field, value) => {
            compare_same_type(&value_of(row, field), value) == Some(Ordering::Less)
        }
        Filter::In(field, values) => {
            let current = value_of(row, field);
            current != FieldValue::Null && values.contains(&current)
        }
        Filter::And(parts) => parts.iter().all(|part| matches(row, part)),
        Filter::Or(parts) => parts.iter().any(|part| matches(row, part)),
        Filter::Not(inner) => !matches(row, inner),
    }
}

/// Nulls sort last ascending and first descending, as in PostgreSQL
fn compare_values(left: &FieldValue, right: &FieldValue) -> Ordering {
    match (left, right) {
        (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
        (FieldValue::Null, _) => Ordering::Greater,
        (_, FieldValue::Null) => Ordering::Less,
        _ => left.cmp(right),
    }
}

fn compare_rows(a: &Record, b: &Record, order: &[OrderBy]) -> Ordering {
    for key in order {
        let ordering = compare_values(&value_of(a, &key.field), &value_of(b, &key.field));
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.id().cmp(&b.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{Role, RoleAssignment, User};

    use crate::query::fields;

    fn user(email: &str) -> Record {
        Record::User(User::new(email, None, "hash".to_string()))
    }

    fn assignment(user_id: i64, role: Role) -> Record {
        Record::RoleAssignment(RoleAssignment::new(user_id, role, Utc::now()))
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let db = InMemoryDatabase::new();
        let store = db.store();
        store.stage(Change::Insert(user("a@example.com")));
        store.stage(Change::Insert(user("b@example.com")));
        assert_eq!(store.save_changes().await.unwrap(), 2);

        let rows = store.query(EntityKind::User, &QuerySpec::new()).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(Record::id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_failed_batch_is_discarded_whole() {
        let db = InMemoryDatabase::new();
        let store = db.store();
        store.stage(Change::Insert(user("a@example.com")));
        store.save_changes().await.unwrap();

        store.stage(Change::Insert(user("c@example.com")));
        store.stage(Change::Insert(user("A@Example.com")));
        let err = store.save_changes().await.unwrap_err();

        assert!(matches!(err, AppError::Duplicate(_)));
        assert_eq!(store.pending_changes(), 0);
        assert_eq!(db.row_count(EntityKind::User), 1);
    }

    #[tokio::test]
    async fn test_duplicate_role_pair_rejected() {
        let db = InMemoryDatabase::new();
        let store = db.store();
        store.stage(Change::Insert(user("a@example.com")));
        store.stage(Change::Insert(assignment(1, Role::Admin)));
        store.save_changes().await.unwrap();

        store.stage(Change::Insert(assignment(1, Role::Admin)));
        assert!(matches!(
            store.save_changes().await,
            Err(AppError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_foreign_key_enforced() {
        let store = InMemoryDatabase::new().store();
        store.stage(Change::Insert(assignment(42, Role::Admin)));
        assert!(matches!(
            store.save_changes().await,
            Err(AppError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_user_delete_cascades() {
        let db = InMemoryDatabase::new();
        let store = db.store();
        store.stage(Change::Insert(user("a@example.com")));
        store.stage(Change::Insert(assignment(1, Role::SuperAdmin)));
        store.save_changes().await.unwrap();

        store.stage(Change::Delete {
            kind: EntityKind::User,
            id: 1,
        });
        assert_eq!(store.save_changes().await.unwrap(), 1);
        assert_eq!(db.row_count(EntityKind::RoleAssignment), 0);
    }

    #[tokio::test]
    async fn test_transaction_writes_isolated_until_commit() {
        let db = InMemoryDatabase::new();
        let writer = db.store();
        let reader = db.store();

        writer.begin_transaction().await.unwrap();
        writer.stage(Change::Insert(user("a@example.com")));
        writer.save_changes().await.unwrap();

        assert_eq!(writer.count(EntityKind::User, &Filter::All).await.unwrap(), 1);
        assert_eq!(reader.count(EntityKind::User, &Filter::All).await.unwrap(), 0);

        writer.commit().await.unwrap();
        assert!(!writer.in_transaction());
        assert_eq!(reader.count(EntityKind::User, &Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_transactions_draw_distinct_ids() {
        let db = InMemoryDatabase::new();
        let first = db.store();
        let second = db.store();
        first.begin_transaction().await.unwrap();
        second.begin_transaction().await.unwrap();

        first.stage(Change::Insert(user("a@example.com")));
        second.stage(Change::Insert(user("b@example.com")));
        first.save_changes().await.unwrap();
        second.save_changes().await.unwrap();

        first.commit().await.unwrap();
        second.commit().await.unwrap();

        let rows = first.query(EntityKind::User, &QuerySpec::new()).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(Record::id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_journaled_grant_settles_on_committed_row() {
        let db = InMemoryDatabase::new();
        let seed = db.store();
        seed.stage(Change::Insert(user("a@example.com")));
        seed.save_changes().await.unwrap();

        let first = db.store();
        let second = db.store();
        first.begin_transaction().await.unwrap();
        second.begin_transaction().await.unwrap();
        first.stage(Change::Insert(assignment(1, Role::Admin)));
        second.stage(Change::Insert(assignment(1, Role::Admin)));
        first.save_changes().await.unwrap();
        second.save_changes().await.unwrap();

        first.commit().await.unwrap();
        // the loser's view already reads the winner's row
        assert_eq!(
            second.count(EntityKind::RoleAssignment, &Filter::All).await.unwrap(),
            1
        );
        second.commit().await.unwrap();
        assert_eq!(db.row_count(EntityKind::RoleAssignment), 1);
    }

    #[tokio::test]
    async fn test_regrant_after_journaled_delete_is_kept() {
        let db = InMemoryDatabase::new();
        let store = db.store();
        store.stage(Change::Insert(user("a@example.com")));
        store.stage(Change::Insert(assignment(1, Role::Admin)));
        store.save_changes().await.unwrap();

        store.begin_transaction().await.unwrap();
        store.stage(Change::Delete {
            kind: EntityKind::RoleAssignment,
            id: 1,
        });
        store.stage(Change::Insert(assignment(1, Role::Admin)));
        store.save_changes().await.unwrap();
        store.commit().await.unwrap();

        let rows = store
            .query(EntityKind::RoleAssignment, &QuerySpec::new())
            .await
            .unwrap();
        assert_eq!(rows.iter().map(Record::id).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn test_unflushed_writes_invisible() {
        let store = InMemoryDatabase::new().store();
        store.stage(Change::Insert(user("a@example.com")));
        assert_eq!(store.count(EntityKind::User, &Filter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_second_begin_conflicts() {
        let store = InMemoryDatabase::new().store();
        store.begin_transaction().await.unwrap();
        assert!(matches!(
            store.begin_transaction().await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_commit_failure_rolls_back() {
        let db = InMemoryDatabase::new();
        let store = db.store();
        store.begin_transaction().await.unwrap();
        store.stage(Change::Insert(user("a@example.com")));
        db.fail_next_commit();

        assert!(store.commit().await.is_err());
        assert!(!store.in_transaction());
        assert_eq!(db.row_count(EntityKind::User), 0);
    }

    #[tokio::test]
    async fn test_unknown_field_rejected() {
        let store = InMemoryDatabase::new().store();
        let spec = QuerySpec::filtered(Filter::equals("nickname", "x"));
        assert!(matches!(
            store.query(EntityKind::User, &spec).await,
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_nulls_sort_last() {
        let store = InMemoryDatabase::new().store();
        store.stage(Change::Insert(user("a@example.com")));
        store.stage(Change::Insert(Record::User(User::new(
            "b@example.com",
            Some("bee".to_string()),
            "hash".to_string(),
        ))));
        store.save_changes().await.unwrap();

        let spec = QuerySpec::new().order_by(OrderBy::asc(fields::user::USERNAME));
        let rows = store.query(EntityKind::User, &spec).await.unwrap();
        assert_eq!(rows.iter().map(Record::id).collect::<Vec<_>>(), vec![2, 1]);

        let spec = QuerySpec::filtered(Filter::is_null(fields::user::USERNAME));
        let rows = store.query(EntityKind::User, &spec).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id(), 1);
    }
}
