/// Failures reported by a [`LabelDb`](crate::db::LabelDb) backend.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The statement matched no rows. Read paths collapse this into an empty
    /// result instead of surfacing it.
    #[error("no rows in result set")]
    NoRows,

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("data store failure: {0}")]
    Backend(String),

    #[error("label row parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NoRows,
            sqlx::Error::Database(db) if db.constraint().is_some() => {
                Self::Constraint(db.message().to_string())
            }
            other => Self::Backend(other.to_string()),
        }
    }
}
