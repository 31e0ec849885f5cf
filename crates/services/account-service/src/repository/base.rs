//! Generic repository over any store-managed entity.
//!
//! Reads go straight to the store. Writes are staged on the store and reach
//! the database when the owning unit of work saves or commits.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use common::{AppError, AppResult, Paginated, PaginationParams};

use crate::query::{fields, FieldValue, Filter, QuerySpec, Relation};
use crate::store::{Change, Entity, EntityStore, Record};

/// CRUD, predicate and paged access to one entity type.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn get_by_id(&self, id: i64) -> AppResult<Option<T>>;

    async fn get_all(&self) -> AppResult<Vec<T>>;

    async fn find(&self, filter: Filter) -> AppResult<Vec<T>>;

    /// The only match, `None` if nothing matches.
    ///
    /// Fails with `MultipleResults` when more than one row matches.
    async fn single_or_default(&self, filter: Filter) -> AppResult<Option<T>>;

    async fn exists(&self, filter: Filter) -> AppResult<bool>;

    /// Row count, optionally filtered
    async fn count(&self, filter: Option<Filter>) -> AppResult<u64>;

    /// Filter, includes, ordering, then skip/take as given in `spec`
    async fn query(&self, spec: QuerySpec) -> AppResult<Vec<T>>;

    /// One page of `spec`: skips `(page - 1) * page_size` rows, takes `page_size`.
    ///
    /// `page` and `page_size` must both be at least 1.
    async fn get_paged(&self, page: u64, page_size: u64, spec: QuerySpec) -> AppResult<Vec<T>>;

    /// Like `get_paged` but with totals
    async fn paginate(&self, params: PaginationParams, spec: QuerySpec) -> AppResult<Paginated<T>>;

    /// Stage an insert. The entity must not carry an id already in the store.
    async fn add(&self, entity: T) -> AppResult<()>;

    /// Stage several inserts; nothing is staged if any entity is rejected
    async fn add_range(&self, entities: Vec<T>) -> AppResult<()>;

    /// Stage a full-row replace. The entity must carry its id.
    fn update(&self, entity: T) -> AppResult<()>;

    /// Stage a delete. Unsaved entities are ignored.
    fn remove(&self, entity: &T);

    fn remove_range(&self, entities: &[T]);
}

/// `Repository` implementation over a shared entity store
pub struct StoreRepository<T> {
    store: Arc<dyn EntityStore>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for StoreRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> StoreRepository<T> {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Repository for another entity over the same store
    pub(crate) fn sibling<U: Entity>(&self) -> StoreRepository<U> {
        StoreRepository::new(self.store.clone())
    }

    async fn ensure_unbound(&self, entity: &T) -> AppResult<()> {
        let id = entity.id();
        if id != 0 && self.exists(Filter::equals(fields::ID, id)).await? {
            return Err(AppError::invalid_argument(format!(
                "{} row {} is already stored",
                T::KIND.table_name(),
                id
            )));
        }
        Ok(())
    }

    async fn load_includes(&self, rows: &mut [T], include: &[Relation]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        for relation in include {
            let (kind, foreign_key) = T::relation(*relation).ok_or_else(|| {
                AppError::invalid_argument(format!(
                    "{} cannot include {:?}",
                    T::KIND.table_name(),
                    relation
                ))
            })?;

            let owners: Vec<i64> = rows.iter().map(Entity::id).collect();
            let spec = QuerySpec::filtered(Filter::one_of(foreign_key, owners));
            let mut grouped: HashMap<i64, Vec<Record>> = HashMap::new();
            for record in self.store.query(kind, &spec).await? {
                if let Some(FieldValue::Int(owner)) = record.field(foreign_key) {
                    grouped.entry(owner).or_default().push(record);
                }
            }

            for row in rows.iter_mut() {
                let related = grouped.remove(&row.id()).unwrap_or_default();
                row.attach(*relation, related);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for StoreRepository<T> {
    async fn get_by_id(&self, id: i64) -> AppResult<Option<T>> {
        let mut rows = self
            .query(QuerySpec::filtered(Filter::equals(fields::ID, id)).take(1))
            .await?;
        Ok(rows.pop())
    }

    async fn get_all(&self) -> AppResult<Vec<T>> {
        self.query(QuerySpec::new()).await
    }

    async fn find(&self, filter: Filter) -> AppResult<Vec<T>> {
        self.query(QuerySpec::filtered(filter)).await
    }

    async fn single_or_default(&self, filter: Filter) -> AppResult<Option<T>> {
        let mut rows = self.query(QuerySpec::filtered(filter).take(2)).await?;
        if rows.len() > 1 {
            return Err(AppError::multiple_results(T::KIND.table_name()));
        }
        Ok(rows.pop())
    }

    async fn exists(&self, filter: Filter) -> AppResult<bool> {
        Ok(self.store.count(T::KIND, &filter).await? > 0)
    }

    async fn count(&self, filter: Option<Filter>) -> AppResult<u64> {
        self.store.count(T::KIND, &filter.unwrap_or_default()).await
    }

    async fn query(&self, spec: QuerySpec) -> AppResult<Vec<T>> {
        let records = self.store.query(T::KIND, &spec).await?;
        let mut rows: Vec<T> = records.into_iter().filter_map(T::from_record).collect();
        self.load_includes(&mut rows, &spec.include).await?;
        Ok(rows)
    }

    async fn get_paged(&self, page: u64, page_size: u64, spec: QuerySpec) -> AppResult<Vec<T>> {
        let params = PaginationParams::new(page, page_size);
        params.validate()?;
        self.query(spec.skip(params.offset()).take(page_size)).await
    }

    async fn paginate(&self, params: PaginationParams, spec: QuerySpec) -> AppResult<Paginated<T>> {
        params.validate()?;
        let total = self.count(Some(spec.filter.clone())).await?;
        let per_page = params.limit();
        let data = self.get_paged(params.page, per_page, spec).await?;
        Ok(Paginated::new(data, params.page, per_page, total))
    }

    async fn add(&self, entity: T) -> AppResult<()> {
        self.ensure_unbound(&entity).await?;
        self.store.stage(Change::Insert(entity.into_record()));
        Ok(())
    }

    async fn add_range(&self, entities: Vec<T>) -> AppResult<()> {
        for entity in &entities {
            self.ensure_unbound(entity).await?;
        }
        for entity in entities {
            self.store.stage(Change::Insert(entity.into_record()));
        }
        Ok(())
    }

    fn update(&self, entity: T) -> AppResult<()> {
        if entity.id() == 0 {
            return Err(AppError::invalid_argument(format!(
                "cannot update an unsaved {} row",
                T::KIND.table_name()
            )));
        }
        self.store.stage(Change::Update(entity.into_record()));
        Ok(())
    }

    fn remove(&self, entity: &T) {
        if entity.id() != 0 {
            self.store.stage(Change::Delete {
                kind: T::KIND,
                id: entity.id(),
            });
        }
    }

    fn remove_range(&self, entities: &[T]) {
        for entity in entities {
            self.remove(entity);
        }
    }
}
