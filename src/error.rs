use thiserror::Error;

/// Every failure the mapper can surface.
///
/// Raw driver failures (`Driver`, `Postgres`) are re-wrapped into `Sql` at the
/// mapper boundary; the remaining kinds pass through unchanged.
#[derive(Debug, Error)]
pub enum OrmError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] postgres::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("{operation} failed: {message}")]
    Sql {
        operation: &'static str,
        message: String,
    },

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Driver error: {0}")]
    Driver(String),
}

impl OrmError {
    /// Wrap a raw driver failure with the name of the operation that hit it.
    ///
    /// Errors that already belong to one of the mapper's own kinds are returned
    /// untouched so nothing is wrapped twice.
    #[must_use]
    pub fn into_sql(self, operation: &'static str) -> Self {
        match self {
            OrmError::Driver(message) => OrmError::Sql { operation, message },
            #[cfg(feature = "postgres")]
            OrmError::Postgres(err) => OrmError::Sql {
                operation,
                message: err.to_string(),
            },
            other => other,
        }
    }

    /// True for configuration and connection failures, which callers cannot recover from locally.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, OrmError::Config(_) | OrmError::Connection(_))
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Config(format!("invalid configuration document: {err}"))
    }
}
