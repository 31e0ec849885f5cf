//! PostgreSQL entity store on SeaORM.
//!
//! Each flush runs in its own database transaction, or in a savepoint when
//! an explicit transaction is open, so a failing statement never leaves a
//! half-applied batch behind.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr,
    TransactionTrait, Value,
};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, warn};

use common::{AppError, AppResult};
use domain::RoleAssignment;

use super::{Change, EntityKind, EntityStore, Record, TransactionHandle};
use crate::query::{fields, FieldValue, Filter, QuerySpec, SortDirection};
use crate::repository::entities::{booking, review, role_assignment, user};

static NEXT_TRANSACTION: AtomicU64 = AtomicU64::new(1);

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => Value::String(None),
            FieldValue::Bool(v) => v.into(),
            FieldValue::Int(v) => v.into(),
            FieldValue::Text(v) => v.into(),
            FieldValue::Date(v) => v.into(),
            FieldValue::Timestamp(v) => v.into(),
        }
    }
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// Unique violations become `Duplicate`, everything else stays a store error
pub(crate) fn map_db_err(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::Duplicate(detail),
        _ => AppError::Persistence(err),
    }
}

struct OpenTransaction {
    handle: TransactionHandle,
    txn: DatabaseTransaction,
}

/// Entity store backed by a pooled PostgreSQL connection.
pub struct SeaOrmStore {
    db: DatabaseConnection,
    txn: AsyncMutex<Option<OpenTransaction>>,
    open: AtomicBool,
    pending: Mutex<Vec<Change>>,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            txn: AsyncMutex::new(None),
            open: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Vec<Change>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn take_transaction(&self) -> Option<OpenTransaction> {
        let open = self.txn.lock().await.take();
        self.open.store(false, AtomicOrdering::SeqCst);
        open
    }
}

#[async_trait]
impl EntityStore for SeaOrmStore {
    async fn begin_transaction(&self) -> AppResult<TransactionHandle> {
        let mut slot = self.txn.lock().await;
        if let Some(open) = slot.as_ref() {
            return Err(AppError::conflict(format!(
                "transaction {} is already open",
                open.handle.id()
            )));
        }

        let txn = self.db.begin().await.map_err(map_db_err)?;
        let handle = TransactionHandle::new(NEXT_TRANSACTION.fetch_add(1, AtomicOrdering::SeqCst));
        *slot = Some(OpenTransaction { handle, txn });
        self.open.store(true, AtomicOrdering::SeqCst);
        debug!(transaction = handle.id(), "Transaction started");
        Ok(handle)
    }

    async fn commit(&self) -> AppResult<()> {
        if !self.in_transaction() {
            return self.save_changes().await.map(|_| ());
        }

        if let Err(err) = self.save_changes().await {
            warn!(error = %err, "Flush failed during commit, rolling back");
            if let Err(rollback_err) = self.rollback().await {
                error!("Transaction rollback failed: {}", rollback_err);
            }
            return Err(err);
        }

        let Some(open) = self.take_transaction().await else {
            return Ok(());
        };
        let id = open.handle.id();
        open.txn.commit().await.map_err(|err| {
            warn!(transaction = id, error = %err, "Commit failed, transaction rolled back");
            map_db_err(err)
        })?;
        debug!(transaction = id, "Transaction committed");
        Ok(())
    }

    async fn rollback(&self) -> AppResult<()> {
        self.pending().clear();
        if let Some(open) = self.take_transaction().await {
            let id = open.handle.id();
            open.txn.rollback().await.map_err(map_db_err)?;
            debug!(transaction = id, "Transaction rolled back");
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.open.load(AtomicOrdering::SeqCst)
    }

    fn stage(&self, change: Change) {
        self.pending().push(change);
    }

    fn pending_changes(&self) -> usize {
        self.pending().len()
    }

    async fn save_changes(&self) -> AppResult<u64> {
        let batch = std::mem::take(&mut *self.pending());
        if batch.is_empty() {
            return Ok(0);
        }

        let slot = self.txn.lock().await;
        let batch_txn = match slot.as_ref() {
            Some(open) => open.txn.begin().await,
            None => self.db.begin().await,
        }
        .map_err(map_db_err)?;

        let mut affected = 0;
        for change in &batch {
            match apply(&batch_txn, change).await {
                Ok(rows) => affected += rows,
                Err(err) => {
                    warn!(table = change.kind().table_name(), error = %err, "Batch statement failed");
                    if let Err(rollback_err) = batch_txn.rollback().await {
                        error!("Batch rollback failed: {}", rollback_err);
                    }
                    return Err(err);
                }
            }
        }

        batch_txn.commit().await.map_err(map_db_err)?;
        debug!(changes = batch.len(), affected, "Flushed batch");
        Ok(affected)
    }

    async fn query(&self, kind: EntityKind, spec: &QuerySpec) -> AppResult<Vec<Record>> {
        let slot = self.txn.lock().await;
        match slot.as_ref() {
            Some(open) => query_on(&open.txn, kind, spec).await,
            None => query_on(&self.db, kind, spec).await,
        }
    }

    async fn count(&self, kind: EntityKind, filter: &Filter) -> AppResult<u64> {
        let slot = self.txn.lock().await;
        match slot.as_ref() {
            Some(open) => count_on(&open.txn, kind, filter).await,
            None => count_on(&self.db, kind, filter).await,
        }
    }

    fn abandon(&self) {
        self.pending().clear();
        // The driver rolls back a transaction dropped without commit
        if let Ok(mut slot) = self.txn.try_lock() {
            if let Some(open) = slot.take() {
                debug!(transaction = open.handle.id(), "Transaction abandoned");
            }
        }
        self.open.store(false, AtomicOrdering::SeqCst);
    }
}

fn column<E: EntityTrait>(kind: EntityKind, name: &str) -> AppResult<E::Column> {
    E::Column::from_str(name).map_err(|_| {
        AppError::invalid_argument(format!(
            "unknown field `{}` on {}",
            name,
            kind.table_name()
        ))
    })
}

/// Translate a filter into a SeaORM condition over `E`
pub(crate) fn condition<E: EntityTrait>(kind: EntityKind, filter: &Filter) -> AppResult<Condition> {
    let single = |expr| Condition::all().add(expr);
    Ok(match filter {
        Filter::All => Condition::all(),
        Filter::Eq(field, FieldValue::Null) | Filter::IsNull(field) => {
            single(column::<E>(kind, field)?.is_null())
        }
        Filter::Eq(field, value) => single(column::<E>(kind, field)?.eq(value.clone())),
        Filter::Ne(field, FieldValue::Null) => single(column::<E>(kind, field)?.is_not_null()),
        Filter::Ne(field, value) => single(column::<E>(kind, field)?.ne(value.clone())),
        Filter::EqIgnoreCase(field, value) => {
            let col = column::<E>(kind, field)?;
            single(Expr::expr(Func::lower(Expr::col(col))).eq(value.to_lowercase()))
        }
        Filter::Gt(field, value) => single(column::<E>(kind, field)?.gt(value.clone())),
        Filter::Lt(field, value) => single(column::<E>(kind, field)?.lt(value.clone())),
        Filter::In(field, values) => single(column::<E>(kind, field)?.is_in(values.iter().cloned())),
        Filter::And(parts) => parts.iter().try_fold(Condition::all(), |acc, part| {
            condition::<E>(kind, part).map(|c| acc.add(c))
        })?,
        Filter::Or(parts) => parts.iter().try_fold(Condition::any(), |acc, part| {
            condition::<E>(kind, part).map(|c| acc.add(c))
        })?,
        Filter::Not(inner) => condition::<E>(kind, inner)?.not(),
    })
}

async fn select<E, C>(conn: &C, kind: EntityKind, spec: &QuerySpec) -> AppResult<Vec<E::Model>>
where
    E: EntityTrait,
    E::Model: Send + Sync + 'static,
    C: ConnectionTrait,
{
    let mut query = E::find().filter(condition::<E>(kind, &spec.filter)?);
    for key in &spec.order_by {
        query = query.order_by(column::<E>(kind, &key.field)?, key.direction.into());
    }
    query = query.order_by_asc(column::<E>(kind, fields::ID)?);
    if let Some(skip) = spec.skip {
        query = query.offset(skip);
    }
    if let Some(take) = spec.take {
        query = query.limit(take);
    }
    query.all(conn).await.map_err(map_db_err)
}

async fn query_on<C: ConnectionTrait>(
    conn: &C,
    kind: EntityKind,
    spec: &QuerySpec,
) -> AppResult<Vec<Record>> {
    let rows: Vec<Record> = match kind {
        EntityKind::User => select::<user::Entity, _>(conn, kind, spec)
            .await?
            .into_iter()
            .map(|model| Record::User(model.into()))
            .collect(),
        EntityKind::RoleAssignment => select::<role_assignment::Entity, _>(conn, kind, spec)
            .await?
            .into_iter()
            .map(|model| RoleAssignment::try_from(model).map(Record::RoleAssignment))
            .collect::<Result<Vec<_>, _>>()?,
        EntityKind::Booking => select::<booking::Entity, _>(conn, kind, spec)
            .await?
            .into_iter()
            .map(|model| Record::Booking(model.into()))
            .collect(),
        EntityKind::Review => select::<review::Entity, _>(conn, kind, spec)
            .await?
            .into_iter()
            .map(|model| Record::Review(model.into()))
            .collect(),
    };
    Ok(rows)
}

async fn count_rows<E, C>(conn: &C, kind: EntityKind, filter: &Filter) -> AppResult<u64>
where
    E: EntityTrait,
    E::Model: Send + Sync + 'static,
    C: ConnectionTrait,
{
    E::find()
        .filter(condition::<E>(kind, filter)?)
        .count(conn)
        .await
        .map_err(map_db_err)
}

async fn count_on<C: ConnectionTrait>(conn: &C, kind: EntityKind, filter: &Filter) -> AppResult<u64> {
    match kind {
        EntityKind::User => count_rows::<user::Entity, _>(conn, kind, filter).await,
        EntityKind::RoleAssignment => count_rows::<role_assignment::Entity, _>(conn, kind, filter).await,
        EntityKind::Booking => count_rows::<booking::Entity, _>(conn, kind, filter).await,
        EntityKind::Review => count_rows::<review::Entity, _>(conn, kind, filter).await,
    }
}

async fn apply<C: ConnectionTrait>(conn: &C, change: &Change) -> AppResult<u64> {
    match change {
        Change::Insert(record) => insert(conn, record).await.map(|_| 1),
        Change::Update(record) => update(conn, record).await,
        Change::Delete { kind, id } => delete(conn, *kind, *id).await,
    }
}

async fn insert<C: ConnectionTrait>(conn: &C, record: &Record) -> AppResult<()> {
    match record {
        Record::User(row) => {
            user::Entity::insert(user::ActiveModel::from_domain(row))
                .exec(conn)
                .await
                .map_err(map_db_err)?;
        }
        Record::RoleAssignment(row) => {
            role_assignment::Entity::insert(role_assignment::ActiveModel::from_domain(row))
                .exec(conn)
                .await
                .map_err(map_db_err)?;
        }
        Record::Booking(row) => {
            booking::Entity::insert(booking::ActiveModel::from_domain(row))
                .exec(conn)
                .await
                .map_err(map_db_err)?;
        }
        Record::Review(row) => {
            review::Entity::insert(review::ActiveModel::from_domain(row))
                .exec(conn)
                .await
                .map_err(map_db_err)?;
        }
    }
    Ok(())
}

/// Full-row replace; a missing id affects no rows
async fn update<C: ConnectionTrait>(conn: &C, record: &Record) -> AppResult<u64> {
    let result = match record {
        Record::User(row) => {
            let mut model = user::ActiveModel::from_domain(row);
            model.id = NotSet;
            user::Entity::update_many()
                .set(model)
                .filter(user::Column::Id.eq(row.id))
                .exec(conn)
                .await
        }
        Record::RoleAssignment(row) => {
            let mut model = role_assignment::ActiveModel::from_domain(row);
            model.id = NotSet;
            role_assignment::Entity::update_many()
                .set(model)
                .filter(role_assignment::Column::Id.eq(row.id))
                .exec(conn)
                .await
        }
        Record::Booking(row) => {
            let mut model = booking::ActiveModel::from_domain(row);
            model.id = NotSet;
            booking::Entity::update_many()
                .set(model)
                .filter(booking::Column::Id.eq(row.id))
                .exec(conn)
                .await
        }
        Record::Review(row) => {
            let mut model = review::ActiveModel::from_domain(row);
            model.id = NotSet;
            review::Entity::update_many()
                .set(model)
                .filter(review::Column::Id.eq(row.id))
                .exec(conn)
                .await
        }
    };
    Ok(result.map_err(map_db_err)?.rows_affected)
}

async fn delete<C: ConnectionTrait>(conn: &C, kind: EntityKind, id: i64) -> AppResult<u64> {
    let result = match kind {
        EntityKind::User => user::Entity::delete_by_id(id).exec(conn).await,
        EntityKind::RoleAssignment => role_assignment::Entity::delete_by_id(id).exec(conn).await,
        EntityKind::Booking => booking::Entity::delete_by_id(id).exec(conn).await,
        EntityKind::Review => review::Entity::delete_by_id(id).exec(conn).await,
    };
    Ok(result.map_err(map_db_err)?.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, QueryTrait};

    fn users_sql(filter: &Filter) -> String {
        let condition = condition::<user::Entity>(EntityKind::User, filter).unwrap();
        user::Entity::find()
            .filter(condition)
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn test_ignore_case_lowers_both_sides() {
        let sql = users_sql(&Filter::equals_ignore_case(fields::user::EMAIL, "Ann@Example.COM"));
        assert!(sql.contains(r#"LOWER("email") = 'ann@example.com'"#), "{}", sql);
    }

    #[test]
    fn test_null_equality_becomes_is_null() {
        let sql = users_sql(&Filter::equals(fields::user::USERNAME, FieldValue::Null));
        assert!(sql.contains(r#""users"."username" IS NULL"#), "{}", sql);
    }

    #[test]
    fn test_membership_and_negation() {
        let filter = Filter::one_of(fields::ID, [1i64, 2])
            .and(Filter::negate(Filter::equals(fields::user::IS_ADMIN, true)));
        let sql = users_sql(&filter);
        assert!(sql.contains(r#""users"."id" IN (1, 2)"#), "{}", sql);
        assert!(sql.contains("NOT"), "{}", sql);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let result = condition::<user::Entity>(EntityKind::User, &Filter::equals("nickname", "x"));
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn test_other_errors_stay_persistence() {
        let err = map_db_err(DbErr::Custom("boom".to_string()));
        assert!(matches!(err, AppError::Persistence(_)));
    }
}
