use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Unit of work already committed or rolled back")]
    TransactionClosed,

    #[error("Stock of drug {drug_id} at pharmacy {pharmacy_id} would exceed {max} units", max = i32::MAX)]
    StockLimitExceeded { pharmacy_id: i64, drug_id: i64 },

    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl DatabaseError {
    /// True when the failure means the database could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        match self {
            DatabaseError::ConnectionFailed(_) => true,
            DatabaseError::SqlxError(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_count_as_unavailable() {
        assert!(DatabaseError::SqlxError(sqlx::Error::PoolTimedOut).is_unavailable());
        assert!(DatabaseError::ConnectionFailed("refused".into()).is_unavailable());
        assert!(!DatabaseError::QueryFailed("syntax".into()).is_unavailable());
        assert!(!DatabaseError::TransactionClosed.is_unavailable());
    }
}
