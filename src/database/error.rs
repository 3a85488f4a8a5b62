use thiserror::Error;

/// Classified database failure, carrying whether a retry could help.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    retryable: bool,
}

#[derive(Debug, Error)]
pub enum DatabaseErrorKind {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("connection error: {message}")]
    Connection { message: String },

    #[error("query error: {message}")]
    Query { message: String },
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        let retryable = matches!(kind, DatabaseErrorKind::Connection { .. });
        Self { kind, retryable }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::new(DatabaseErrorKind::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        })
    }

    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::new(DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: "unknown".to_string(),
            }),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::new(DatabaseErrorKind::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                })
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::new(DatabaseErrorKind::Connection {
                    message: err.to_string(),
                })
            }
            _ => Self::new(DatabaseErrorKind::Query {
                message: err.to_string(),
            }),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::NotFound { .. })
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::UniqueViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_are_retryable() {
        let err = DatabaseError::new(DatabaseErrorKind::Connection {
            message: "pool timed out".to_string(),
        });
        assert!(err.is_retryable());
    }

    #[test]
    fn not_found_is_classified() {
        let err = DatabaseError::not_found("Order", "TRK123");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("TRK123"));
    }
}
