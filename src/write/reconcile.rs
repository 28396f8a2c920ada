use std::sync::Arc;

use sqlx::postgres::PgRow;

use crate::aggregate::Attachment;
use crate::error::Error;
use crate::files::{DeleteFileReq, FileStore, delete_stored_files};
use crate::query::SqlParam;
use crate::write::tx::{STEP_TIMEOUT, TxScope};

/// The insert/delete split for one child collection.
#[derive(Debug, PartialEq)]
pub struct Reconciliation<'a, T> {
    pub to_insert: Vec<&'a T>,
    pub to_delete: Vec<&'a T>,
}

/// Set difference of stored vs. submitted rows under a caller-supplied
/// equality rule. O(existing × incoming); child collections are small.
pub fn diff<'a, T>(
    existing: &'a [T],
    incoming: &'a [T],
    eq: fn(&T, &T) -> bool,
) -> Reconciliation<'a, T> {
    let to_delete = existing
        .iter()
        .filter(|&stored| !incoming.iter().any(|new| eq(stored, new)))
        .collect();
    let to_insert = incoming
        .iter()
        .filter(|&new| !existing.iter().any(|stored| eq(stored, new)))
        .collect();
    Reconciliation {
        to_insert,
        to_delete,
    }
}

/// Everything the engine needs to reconcile one child collection:
/// where the rows live, how to read and write them, and what makes two rows
/// the same. `file_destination` marks file-backed rows whose removal must
/// also reach the storage collaborator.
pub struct ChildSync<T> {
    pub table: &'static str,
    pub fk: &'static str,
    pub select_columns: &'static [&'static str],
    /// Columns written on insert, excluding the foreign key.
    pub insert_columns: &'static [&'static str],
    pub row_id: fn(&T) -> i64,
    pub eq: fn(&T, &T) -> bool,
    pub insert_params: fn(&T) -> Vec<SqlParam>,
    pub file_destination: Option<fn(&T) -> String>,
}

/// The standard attachment collection, keyed by file name.
pub fn attachment_sync(
    table: &'static str,
    fk: &'static str,
    file_destination: fn(&Attachment) -> String,
) -> ChildSync<Attachment> {
    ChildSync {
        table,
        fk,
        select_columns: &["id", "filename", "url"],
        insert_columns: &["filename", "url"],
        row_id: |a| a.id,
        eq: Attachment::same_file,
        insert_params: |a| vec![a.file_name.clone().into(), a.url.clone().into()],
        file_destination: Some(file_destination),
    }
}

impl TxScope {
    /// Reconciles one child collection against what is stored for
    /// `parent_id`: unmatched stored rows are deleted (file-backed ones also
    /// produce best-effort storage deletions first), unmatched submitted rows
    /// are inserted. An empty `incoming` set skips reconciliation: only a
    /// submitted collection triggers it.
    pub async fn sync_children<T>(
        &mut self,
        op: &str,
        spec: &ChildSync<T>,
        parent_id: i64,
        incoming: &[T],
        files: Option<&Arc<dyn FileStore>>,
    ) -> Result<(), Error>
    where
        T: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
    {
        if incoming.is_empty() {
            return Ok(());
        }

        let columns: Vec<String> = spec
            .select_columns
            .iter()
            .map(|c| format!(r#""{}""#, c))
            .collect();
        let select = format!(
            r#"SELECT {} FROM "{}" WHERE "{}" = $1;"#,
            columns.join(", "),
            spec.table,
            spec.fk,
        );

        let load_op = format!("{}: retrieve existing {}", op, spec.table);
        let conn = self.conn()?;
        let loaded = tokio::time::timeout(
            STEP_TIMEOUT,
            sqlx::query_as::<_, T>(&select)
                .bind(parent_id)
                .fetch_all(&mut *conn),
        )
        .await;
        let existing: Vec<T> = match loaded {
            Err(_) => {
                self.rollback_quiet().await;
                return Err(Error::Timeout(load_op));
            }
            Ok(res) => self.guard(&load_op, res).await?,
        };

        let plan = diff(&existing, incoming, spec.eq);

        if let (Some(destination), Some(store)) = (spec.file_destination, files) {
            let requests: Vec<DeleteFileReq> = plan
                .to_delete
                .iter()
                .map(|&row| DeleteFileReq {
                    destination: destination(row),
                })
                .collect();
            delete_stored_files(store, requests).await;
        }

        let delete_op = format!("{}: delete {} row", op, spec.table);
        for &row in &plan.to_delete {
            self.delete_by_id(&delete_op, spec.table, (spec.row_id)(row))
                .await?;
        }

        let insert_op = format!("{}: insert {} rows", op, spec.table);
        let rows: Vec<Vec<SqlParam>> = plan
            .to_insert
            .iter()
            .map(|&row| (spec.insert_params)(row))
            .collect();
        self.insert_child_rows(
            &insert_op,
            spec.table,
            spec.fk,
            parent_id,
            spec.insert_columns,
            rows,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(id: i64, name: &str) -> Attachment {
        Attachment {
            id,
            file_name: name.to_string(),
            url: format!("https://cdn.test/{}", name),
        }
    }

    #[test]
    fn unmatched_rows_split_into_insert_and_delete() {
        let existing = vec![img(1, "a.webp"), img(2, "b.webp")];
        let incoming = vec![img(0, "b.webp"), img(0, "c.webp")];

        let plan = diff(&existing, &incoming, Attachment::same_file);
        assert_eq!(plan.to_delete, vec![&existing[0]]);
        assert_eq!(plan.to_insert, vec![&incoming[1]]);
    }

    #[test]
    fn identical_sets_produce_no_work() {
        let existing = vec![img(1, "a.webp"), img(2, "b.webp")];
        let incoming = vec![img(0, "b.webp"), img(0, "a.webp")];

        let plan = diff(&existing, &incoming, Attachment::same_file);
        assert!(plan.to_insert.is_empty());
        assert!(plan.to_delete.is_empty());
    }

    #[test]
    fn diff_is_idempotent() {
        let existing = vec![img(1, "a.webp"), img(2, "b.webp"), img(3, "c.webp")];
        let incoming = vec![img(0, "c.webp"), img(0, "d.webp")];

        let first = diff(&existing, &incoming, Attachment::same_file);
        let second = diff(&existing, &incoming, Attachment::same_file);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_existing_inserts_everything() {
        let existing: Vec<Attachment> = vec![];
        let incoming = vec![img(0, "a.webp")];
        let plan = diff(&existing, &incoming, Attachment::same_file);
        assert_eq!(plan.to_insert.len(), 1);
        assert!(plan.to_delete.is_empty());
    }

    #[derive(Debug, PartialEq)]
    struct FreeItem {
        id: i64,
        description: String,
    }

    #[test]
    fn equality_rule_is_caller_defined() {
        let existing = vec![
            FreeItem {
                id: 1,
                description: "air conditioner".to_string(),
            },
            FreeItem {
                id: 2,
                description: "kitchen set".to_string(),
            },
        ];
        let incoming = vec![FreeItem {
            id: 0,
            description: "kitchen set".to_string(),
        }];

        let plan = diff(&existing, &incoming, |a, b| a.description == b.description);
        assert_eq!(plan.to_delete, vec![&existing[0]]);
        assert!(plan.to_insert.is_empty());
    }
}
