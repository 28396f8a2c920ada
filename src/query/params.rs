use chrono::{DateTime, Utc};
use sqlx::{
    Postgres,
    postgres::PgArguments,
    query::{Query as PgQuery, QueryScalar},
};

/// A value bound into a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        SqlParam::Int(v as i64)
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Float(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Bool(v)
    }
}

impl From<DateTime<Utc>> for SqlParam {
    fn from(v: DateTime<Utc>) -> Self {
        SqlParam::Timestamp(v)
    }
}

/// Ordered bound values plus the cursor that numbers positional placeholders.
///
/// Placeholder indices come from the stack's live length at the moment a
/// value is pushed, so fragments can be added or skipped in any order and
/// the numbering stays 1..N with no gaps.
#[derive(Debug, Default)]
pub struct ParamStack {
    values: Vec<SqlParam>,
}

impl ParamStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value and returns its placeholder index.
    pub fn push(&mut self, value: impl Into<SqlParam>) -> usize {
        self.values.push(value.into());
        self.values.len()
    }

    /// The index the next pushed value will receive.
    pub fn next_index(&self) -> usize {
        self.values.len() + 1
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[SqlParam] {
        &self.values
    }

    /// Replays the stack onto a query in push order.
    pub fn bind<'q>(
        &'q self,
        mut query: PgQuery<'q, Postgres, PgArguments>,
    ) -> PgQuery<'q, Postgres, PgArguments> {
        for value in &self.values {
            query = match value {
                SqlParam::Int(v) => query.bind(v),
                SqlParam::Float(v) => query.bind(v),
                SqlParam::Text(v) => query.bind(v),
                SqlParam::Bool(v) => query.bind(v),
                SqlParam::Timestamp(v) => query.bind(v),
            };
        }
        query
    }

    /// Same as [`bind`](Self::bind) for scalar queries.
    pub fn bind_scalar<'q, O>(
        &'q self,
        mut query: QueryScalar<'q, Postgres, O, PgArguments>,
    ) -> QueryScalar<'q, Postgres, O, PgArguments> {
        for value in &self.values {
            query = match value {
                SqlParam::Int(v) => query.bind(v),
                SqlParam::Float(v) => query.bind(v),
                SqlParam::Text(v) => query.bind(v),
                SqlParam::Bool(v) => query.bind(v),
                SqlParam::Timestamp(v) => query.bind(v),
            };
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_push_order() {
        let mut stack = ParamStack::new();
        assert_eq!(stack.next_index(), 1);
        assert_eq!(stack.push(7i64), 1);
        assert_eq!(stack.push("seven"), 2);
        assert_eq!(stack.push(true), 3);
        assert_eq!(stack.next_index(), 4);
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn values_keep_their_types() {
        let mut stack = ParamStack::new();
        stack.push(1i32);
        stack.push(2.5f64);
        stack.push("x".to_string());
        assert_eq!(
            stack.values(),
            &[
                SqlParam::Int(1),
                SqlParam::Float(2.5),
                SqlParam::Text("x".to_string()),
            ]
        );
    }
}
