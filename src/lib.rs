//! # Oikos
//!
//! *οἶκος — Ancient Greek for "house" or "household".*
//!
//! Oikos is the persistence engine of a content-management backend: a
//! **filtered-query engine** and a **transactional aggregate writer** for
//! PostgreSQL, built once and reused by every entity module instead of being
//! hand-rolled per table.
//!
//! ## What's inside
//!
//! ### Filtered list queries
//! Every listable entity takes the same inbound filter: optional exact id,
//! optional case-insensitive search, page/limit, an allow-listed sort key and
//! direction. The engine renders one query per list call that returns the
//! parent rows *with every owned child collection already nested* as JSON
//! (images, line items, sub-plans, and their own children), plus a matching
//! count for total pages. Placeholder numbers are assigned at render time
//! from the live parameter stack, so optional fragments can come and go
//! without renumbering bugs.
//!
//! ### Transactional aggregate writes
//! Creates insert the parent, capture its generated id, and bulk-insert each
//! child collection inside one transaction. Updates apply a partial SET
//! clause (absent fields stay untouched) and *reconcile* each submitted child
//! collection against what is stored: unmatched stored rows are deleted,
//! unmatched submitted rows inserted, with the equality rule supplied per
//! collection (file name for attachments, descriptive fields for line
//! items). File-backed rows leaving a collection produce best-effort
//! deletion requests to the storage collaborator; those never fail the
//! transaction.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use oikos::{Engine, ListFilter};
//!
//! let engine = Engine::from_pool(pool);
//!
//! // List with filters, sorted and paginated.
//! let page = engine.find_page::<Promotion>(&filter).await?;
//!
//! // Create parent + children atomically, then return the canonical shape.
//! let mut scope = engine.begin().await?;
//! let id = scope
//!     .insert_returning_id("insert promotion", "promotions", COLUMNS, values)
//!     .await?;
//! scope
//!     .insert_child_rows("insert promotion images", "promotion_images",
//!         "promotion_id", id, &["filename", "url"], image_rows)
//!     .await?;
//! scope.commit().await?;
//! let created = engine.find_by_id::<Promotion>(id).await?;
//! ```

pub mod aggregate;
pub mod error;
pub mod files;
pub mod filter;
pub mod query;
pub mod write;

use std::time::Instant;

use metrics::histogram;
use sqlx::PgPool;

pub use crate::aggregate::{Aggregate, Attachment, ChildSpec, Page};
pub use crate::error::Error;
pub use crate::files::{DeleteFileReq, FileReq, FileRes, FileStore};
pub use crate::filter::{ListFilter, PageDefaults};
pub use crate::query::{
    PageWindow, ParamStack, Predicate, PredicateSet, SortDir, SortSpec, SqlParam, total_pages,
};
pub use crate::write::{ChildSync, Reconciliation, SetClause, TxScope, TxState, attachment_sync, diff};

use crate::aggregate::fetch;

/// The Engine is the shared entry point for list queries, single fetches,
/// counts and write transactions. It holds no per-request state; every call
/// builds its query from scratch.
#[derive(Clone)]
pub struct Engine {
    pool: PgPool,
}

impl Engine {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ==================== Reads ====================

    /// Filtered, sorted, paginated list with nested child collections and
    /// page totals.
    pub async fn find_page<A: Aggregate>(&self, filter: &ListFilter) -> Result<Page<A>, Error> {
        self.find_page_where::<A>(filter, PredicateSet::new()).await
    }

    /// Same as [`find_page`](Self::find_page) with entity-specific extra
    /// predicates (e.g. scoping house models to one project).
    pub async fn find_page_where<A: Aggregate>(
        &self,
        filter: &ListFilter,
        extra: PredicateSet,
    ) -> Result<Page<A>, Error> {
        let start = Instant::now();
        let page = fetch::fetch_page::<A>(&self.pool, filter, extra).await?;
        histogram!("oikos.find_page.duration_ms",
            "table" => A::TABLE
        )
        .record(start.elapsed().as_millis() as f64);
        Ok(page)
    }

    /// Fetches one aggregate by id. Zero rows is [`Error::NotFound`].
    pub async fn find_by_id<A: Aggregate>(&self, id: i64) -> Result<A, Error> {
        let start = Instant::now();
        let found = fetch::fetch_one::<A>(&self.pool, id).await?;
        histogram!("oikos.find_one.duration_ms",
            "table" => A::TABLE
        )
        .record(start.elapsed().as_millis() as f64);
        Ok(found)
    }

    /// Row count under the same predicate logic as the page fetch.
    pub async fn count<A: Aggregate>(&self, filter: &ListFilter) -> Result<i64, Error> {
        fetch::fetch_count::<A>(&self.pool, filter, PredicateSet::new()).await
    }

    pub async fn count_where<A: Aggregate>(
        &self,
        filter: &ListFilter,
        extra: PredicateSet,
    ) -> Result<i64, Error> {
        fetch::fetch_count::<A>(&self.pool, filter, extra).await
    }

    // ==================== Writes ====================

    /// Opens a transaction scope; all write steps run on its single handle.
    pub async fn begin(&self) -> Result<TxScope, Error> {
        TxScope::begin(&self.pool).await
    }

    /// Deletes the parent row; child rows go with it through the schema's
    /// FK cascade. Physical file cleanup for attachment collections is the
    /// caller's out-of-band step
    /// (see [`files::delete_stored_files`](crate::files::delete_stored_files)).
    pub async fn delete_by_id<A: Aggregate>(&self, id: i64) -> Result<(), Error> {
        let op = format!("delete {}", A::TABLE);
        let sql = format!(r#"DELETE FROM "{}" WHERE "id" = $1;"#, A::TABLE);
        let done = fetch::with_timeout(
            &op,
            fetch::STATEMENT_TIMEOUT,
            sqlx::query(&sql).bind(id).execute(&self.pool),
        )
        .await?;
        if done.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}
