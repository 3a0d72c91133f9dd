//! Database error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("unsupported db_type {0:?}, expected sqlite3 or mysql")]
    UnsupportedBackend(String),

    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
}
