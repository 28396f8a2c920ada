use crate::query::params::{ParamStack, SqlParam};

/// One optional boolean fragment of a WHERE clause.
///
/// The SQL is written with `?` markers; real placeholder numbers are assigned
/// when the owning [`PredicateSet`] is rendered against a [`ParamStack`], so
/// numbering stays correct no matter which optional fragments are present.
#[derive(Debug, Clone)]
pub struct Predicate {
    sql: String,
    params: Vec<SqlParam>,
}

impl Predicate {
    /// A raw fragment. The number of `?` markers must match `params`.
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        let sql = sql.into();
        debug_assert_eq!(
            sql.matches('?').count(),
            params.len(),
            "predicate marker count must match its params"
        );
        Self { sql, params }
    }

    /// Exact match on a column expression.
    pub fn eq(column: &str, value: impl Into<SqlParam>) -> Self {
        Self::new(format!("{} = ?", column), vec![value.into()])
    }

    /// Case-insensitive substring match across one or more text columns.
    pub fn search(alias: &str, columns: &[&str], term: &str) -> Self {
        let needle = format!("%{}%", term.to_lowercase());
        let conditions: Vec<String> = columns
            .iter()
            .map(|col| format!(r#"LOWER("{}"."{}") LIKE ?"#, alias, col))
            .collect();
        let params = vec![SqlParam::Text(needle); columns.len()];
        Self::new(format!("({})", conditions.join(" OR ")), params)
    }
}

/// The optional fragments of one query, in insertion order.
///
/// A set is immutable once built and can be rendered any number of times;
/// each render works against a fresh stack, so an instance never leaks state
/// between invocations.
#[derive(Debug, Clone, Default)]
pub struct PredicateSet {
    items: Vec<Predicate>,
}

impl PredicateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.items.push(predicate);
    }

    /// Adds the fragment only when `guard` holds.
    pub fn push_if(&mut self, guard: bool, predicate: impl FnOnce() -> Predicate) {
        if guard {
            self.items.push(predicate());
        }
    }

    pub fn extend(&mut self, other: PredicateSet) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Renders `AND ...` fragments, pushing each fragment's values onto the
    /// stack and numbering its markers from the stack's live length.
    pub fn render(&self, stack: &mut ParamStack) -> String {
        let mut out = String::new();
        for predicate in &self.items {
            out.push_str("\n\t\tAND ");
            let mut segments = predicate.sql.split('?');
            if let Some(first) = segments.next() {
                out.push_str(first);
            }
            for (segment, param) in segments.zip(predicate.params.iter().cloned()) {
                let index = stack.push(param);
                out.push('$');
                out.push_str(&index.to_string());
                out.push_str(segment);
            }
        }
        out
    }
}
