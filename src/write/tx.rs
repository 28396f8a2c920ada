use std::time::Duration;

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::error::Error;
use crate::query::{ParamStack, SqlParam};
use crate::write::set::SetClause;

/// Deadline for one write statement inside a scope.
pub(crate) const STEP_TIMEOUT: Duration = Duration::from_secs(15);
/// Deadline for multi-row batch statements.
pub(crate) const BATCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Open,
    Committed,
    RolledBack,
}

/// The begin/commit/rollback unit bounding one write operation.
///
/// Every step runs on the same transaction handle, so the database's own
/// isolation level governs visibility. The first failing step rolls the
/// scope back and no further steps may run; dropping an open scope rolls
/// back as well.
pub struct TxScope {
    tx: Option<Transaction<'static, Postgres>>,
    state: TxState,
}

impl TxScope {
    pub async fn begin(pool: &PgPool) -> Result<Self, Error> {
        let tx = pool
            .begin()
            .await
            .map_err(|err| Error::storage("begin transaction", err))?;
        Ok(Self {
            tx: Some(tx),
            state: TxState::Open,
        })
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// The scope's connection; steps against a closed scope are refused.
    pub fn conn(&mut self) -> Result<&mut PgConnection, Error> {
        match self.state {
            TxState::Open => {}
            TxState::Committed => {
                return Err(Error::Transaction(
                    "transaction scope already committed".to_string(),
                ));
            }
            TxState::RolledBack => {
                return Err(Error::Transaction(
                    "transaction scope already rolled back".to_string(),
                ));
            }
        }
        self.tx
            .as_deref_mut()
            .ok_or_else(|| Error::Transaction("transaction scope is closed".to_string()))
    }

    pub(crate) async fn rollback_quiet(&mut self) {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.ok();
        }
        self.state = TxState::RolledBack;
    }

    /// Folds a step result into the scope: failures roll back immediately and
    /// come back wrapped with the step name.
    pub async fn guard<T>(
        &mut self,
        op: &str,
        result: Result<T, sqlx::Error>,
    ) -> Result<T, Error> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.rollback_quiet().await;
                Err(Error::step(op, err))
            }
        }
    }

    async fn guard_timed<T>(
        &mut self,
        op: &str,
        result: Result<Result<T, sqlx::Error>, tokio::time::error::Elapsed>,
    ) -> Result<T, Error> {
        match result {
            Err(_) => {
                self.rollback_quiet().await;
                Err(Error::Timeout(op.to_string()))
            }
            Ok(inner) => self.guard(op, inner).await,
        }
    }

    /// Explicit abort for caller-driven failure paths.
    pub async fn rollback(mut self) -> Result<(), Error> {
        self.rollback_quiet().await;
        Ok(())
    }

    /// Commits; only reachable when every step so far succeeded.
    pub async fn commit(mut self) -> Result<(), Error> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => {
                return Err(Error::Transaction(
                    "transaction scope is closed".to_string(),
                ));
            }
        };
        match tx.commit().await {
            Ok(()) => {
                self.state = TxState::Committed;
                Ok(())
            }
            Err(err) => {
                self.state = TxState::RolledBack;
                Err(Error::step("commit transaction", err))
            }
        }
    }

    /* ---------------- WRITE STEPS ---------------- */

    /// Parent (or sub-parent) insert capturing the generated id.
    pub async fn insert_returning_id(
        &mut self,
        op: &str,
        table: &str,
        columns: &[&str],
        values: Vec<SqlParam>,
    ) -> Result<i64, Error> {
        debug_assert_eq!(columns.len(), values.len());

        let mut stack = ParamStack::new();
        let placeholders: Vec<String> = values
            .into_iter()
            .map(|value| format!("${}", stack.push(value)))
            .collect();
        let column_list: Vec<String> = columns.iter().map(|c| format!(r#""{}""#, c)).collect();
        let sql = format!(
            r#"
	INSERT INTO "{}" ({})
	VALUES ({})
	RETURNING "id";"#,
            table,
            column_list.join(", "),
            placeholders.join(", "),
        );

        let conn = self.conn()?;
        let result = tokio::time::timeout(
            STEP_TIMEOUT,
            stack
                .bind_scalar(sqlx::query_scalar::<_, i64>(&sql))
                .fetch_one(&mut *conn),
        )
        .await;
        self.guard_timed(op, result).await
    }

    /// One multi-row `VALUES` insert for a child collection. The parent id is
    /// bound once per row ahead of the row's own values. No-op on an empty
    /// row set.
    pub async fn insert_child_rows(
        &mut self,
        op: &str,
        table: &str,
        fk: &str,
        parent_id: i64,
        columns: &[&str],
        rows: Vec<Vec<SqlParam>>,
    ) -> Result<(), Error> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut stack = ParamStack::new();
        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            debug_assert_eq!(columns.len(), row.len());
            let mut marks = Vec::with_capacity(row.len() + 1);
            marks.push(format!("${}", stack.push(parent_id)));
            for value in row {
                marks.push(format!("${}", stack.push(value)));
            }
            tuples.push(format!("({})", marks.join(", ")));
        }

        let mut column_list = vec![format!(r#""{}""#, fk)];
        column_list.extend(columns.iter().map(|c| format!(r#""{}""#, c)));
        let sql = format!(
            r#"
	INSERT INTO "{}" ({})
	VALUES
		{};"#,
            table,
            column_list.join(", "),
            tuples.join(",\n\t\t"),
        );

        let conn = self.conn()?;
        let result = tokio::time::timeout(
            BATCH_TIMEOUT,
            stack.bind(sqlx::query(&sql)).execute(&mut *conn),
        )
        .await;
        self.guard_timed(op, result).await?;
        Ok(())
    }

    /// Partial update of the row with `id`. An empty clause is a no-op:
    /// nothing was submitted, nothing changes.
    pub async fn update_by_id(
        &mut self,
        op: &str,
        table: &str,
        set: &SetClause,
        id: i64,
    ) -> Result<(), Error> {
        if set.is_empty() {
            return Ok(());
        }

        let mut stack = ParamStack::new();
        let assignments = set.render(&mut stack);
        let id_idx = stack.push(id);
        let sql = format!(
            r#"
	UPDATE "{}" SET {}
	WHERE "id" = ${};"#,
            table, assignments, id_idx,
        );

        let conn = self.conn()?;
        let result = tokio::time::timeout(
            STEP_TIMEOUT,
            stack.bind(sqlx::query(&sql)).execute(&mut *conn),
        )
        .await;
        self.guard_timed(op, result).await?;
        Ok(())
    }

    /// Deletes one row by id, reporting how many rows went away.
    pub async fn delete_by_id(
        &mut self,
        op: &str,
        table: &str,
        id: i64,
    ) -> Result<u64, Error> {
        let sql = format!(r#"DELETE FROM "{}" WHERE "id" = $1;"#, table);

        let conn = self.conn()?;
        let result = tokio::time::timeout(
            STEP_TIMEOUT,
            sqlx::query(&sql).bind(id).execute(&mut *conn),
        )
        .await;
        let done = self.guard_timed(op, result).await?;
        Ok(done.rows_affected())
    }
}
