use std::fmt::Display;

#[derive(Debug)]
pub enum Error {
    /// A single-entity fetch matched zero rows.
    NotFound,
    /// Filter input that could not be coerced (almost everything else is
    /// normalized instead of rejected).
    Validation(String),
    /// Unique-key or foreign-key violation reported by the store.
    Constraint(String),
    /// A step inside a transaction scope failed; the scope has been rolled back.
    Transaction(String),
    /// A statement exceeded its deadline.
    Timeout(String),
    Storage(String),
    Deserialize(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound => write!(f, "Not found"),
            Error::Validation(err) => write!(f, "Validation error: {}", err),
            Error::Constraint(err) => write!(f, "Constraint violation: {}", err),
            Error::Transaction(err) => write!(f, "Transaction failed: {}", err),
            Error::Timeout(op) => write!(f, "{} timed out", op),
            Error::Storage(err) => write!(f, "Storage error: {}", err),
            Error::Deserialize(err) => write!(f, "Deserialization error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Wraps a database error with the name of the operation that produced it,
    /// classifying constraint violations along the way.
    pub(crate) fn storage(op: &str, err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return Error::NotFound;
        }
        if let Some(db) = err.as_database_error() {
            use sqlx::error::ErrorKind;
            match db.kind() {
                ErrorKind::UniqueViolation | ErrorKind::ForeignKeyViolation => {
                    return Error::Constraint(format!("{} failed: {}", op, db.message()));
                }
                _ => {}
            }
        }
        Error::Storage(format!("{} failed: {}", op, err))
    }

    /// Same classification for a failed transaction step; anything that is
    /// not a constraint violation surfaces as a transaction failure.
    pub(crate) fn step(op: &str, err: sqlx::Error) -> Self {
        if let Some(db) = err.as_database_error() {
            use sqlx::error::ErrorKind;
            match db.kind() {
                ErrorKind::UniqueViolation | ErrorKind::ForeignKeyViolation => {
                    return Error::Constraint(format!("{} failed: {}", op, db.message()));
                }
                _ => {}
            }
        }
        Error::Transaction(format!("{} failed: {}", op, err))
    }

    pub(crate) fn decode(op: &str, err: serde_json::Error) -> Self {
        Error::Deserialize(format!("{} failed: {}", op, err))
    }
}
