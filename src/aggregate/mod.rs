pub mod fetch;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::filter::PageDefaults;
use crate::query::SortSpec;

/// One child collection of an aggregate, shaped as a correlated sub-select
/// that lands in the parent document under `field`.
///
/// `columns` empty means "project everything". `children` nests further
/// levels (a plan owns its own items and images).
#[derive(Debug, Clone, Copy)]
pub struct ChildSpec {
    pub field: &'static str,
    pub table: &'static str,
    pub alias: &'static str,
    /// Foreign-key column referencing the parent's `id`.
    pub fk: &'static str,
    pub columns: &'static [&'static str],
    pub children: &'static [ChildSpec],
}

/// A root entity plus its owned child collections, fetched as one nested
/// JSON document. The consts drive query shaping; serde does the decoding.
pub trait Aggregate: DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;
    const ALIAS: &'static str;
    /// Text columns the `search` filter matches against, unqualified.
    const SEARCH_COLUMNS: &'static [&'static str];
    const CHILDREN: &'static [ChildSpec];
    const SORT: SortSpec;
    const PAGE: PageDefaults = PageDefaults::DEFAULT;
}

/// A page of results together with the totals the caller needs to render
/// pagination controls.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total_item: i64,
    pub total_page: i64,
}

/// The uniform image/file child row: `{ id, filename, url }` owned by exactly
/// one parent. Reconciliation identity is the file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attachment {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "filename")]
    #[sqlx(rename = "filename")]
    pub file_name: String,
    pub url: String,
}

impl Attachment {
    pub fn same_file(a: &Attachment, b: &Attachment) -> bool {
        a.file_name == b.file_name
    }
}
