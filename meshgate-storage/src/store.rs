//! Async entity store contract.
//!
//! The pipeline never talks to a database directly. It hands the store a
//! compiled [`StoreQuery`] for the root rows and batched column lookups for
//! every eager-load hop the expansion plan asks for.

use ::async_trait::async_trait;
use meshgate_core::{
    EntityId, EntityRecord, EntityStatus, FilterSpecification, MeshResult, Timestamp,
};

/// Which lifecycle states a query admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    /// `ok` only. Listings and every expanded relation.
    Active,
    /// `ok` or `pending`. Single-object fetches.
    ActiveOrPending,
    /// `ok` or `deleted`. Incremental (`since`) listings.
    ActiveOrDeleted,
    /// Every row. Namespace parent lookups.
    Any,
}

impl StatusFilter {
    pub fn admits(&self, status: EntityStatus) -> bool {
        match self {
            StatusFilter::Any => true,
            StatusFilter::Active => status == EntityStatus::Ok,
            StatusFilter::ActiveOrPending => {
                matches!(status, EntityStatus::Ok | EntityStatus::Pending)
            }
            StatusFilter::ActiveOrDeleted => {
                matches!(status, EntityStatus::Ok | EntityStatus::Deleted)
            }
        }
    }
}

/// Row ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RowOrdering {
    /// The store's natural order (ascending id).
    #[default]
    Natural,
    /// Last-modified ascending, ties broken by id.
    UpdatedAscending,
}

/// Root-row query handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub entity_type: &'static str,
    pub id: Option<EntityId>,
    pub filter: FilterSpecification,
    pub status: StatusFilter,
    /// Only rows modified strictly after this instant.
    pub updated_after: Option<Timestamp>,
    pub ordering: RowOrdering,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl StoreQuery {
    pub fn new(entity_type: &'static str) -> Self {
        Self {
            entity_type,
            id: None,
            filter: FilterSpecification::default(),
            status: StatusFilter::Active,
            updated_after: None,
            ordering: RowOrdering::Natural,
            skip: 0,
            limit: None,
        }
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_filter(mut self, filter: FilterSpecification) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn updated_after(mut self, since: Timestamp) -> Self {
        self.updated_after = Some(since);
        self.ordering = RowOrdering::UpdatedAscending;
        self
    }

    pub fn slice(mut self, skip: usize, limit: Option<usize>) -> Self {
        self.skip = skip;
        self.limit = limit;
        self
    }
}

/// Entity store used by the expansion executor.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Root rows: filtered, status-checked, ordered, then sliced.
    async fn query(&self, query: &StoreQuery) -> MeshResult<Vec<EntityRecord>>;

    /// Rows of `tag` whose `column` holds one of `keys`, in natural order.
    async fn fetch_by_column(
        &self,
        tag: &'static str,
        column: &'static str,
        keys: &[EntityId],
        status: StatusFilter,
    ) -> MeshResult<Vec<EntityRecord>>;

    /// Rows of `tag` by primary key, in natural order.
    async fn fetch_by_ids(
        &self,
        tag: &'static str,
        ids: &[EntityId],
        status: StatusFilter,
    ) -> MeshResult<Vec<EntityRecord>> {
        self.fetch_by_column(tag, "id", ids, status).await
    }
}
