use crate::model::RecordId;

/// A field that failed parsing or a domain check.
///
/// The `Display` output doubles as the per-row failure reason in import
/// reports, e.g. `invalid temperature`.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {0}")]
    Invalid(&'static str),
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
}

impl ValidationError {
    pub(crate) fn out_of_range(field: &'static str, value: impl ToString) -> Self {
        Self::OutOfRange {
            field,
            value: value.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("record not found: {0}")]
    NotFound(RecordId),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("malformed file: {0}")]
    FatalFormat(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("stored record is unreadable: {0}")]
    Corrupt(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Connectivity failures abort a whole operation; everything else is item-level.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::BackendUnavailable(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err)
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() =>
            {
                Error::Conflict(db_err.message().to_owned())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Error::BackendUnavailable(err.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Error::Corrupt(err.to_string())
            }
            other => Error::Database(other),
        }
    }
}
