//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `ledgers` - Ledger rows and status flags
//! - `transactions` - Transaction payload persistence
//! - `relations` - Transaction-ledger relation rows
//! - `links` - Ledger link CRUD and pair queries
//! - `config` - Per-app auto-ledger configuration
//! - `dedup` - Notification dedup records
//!
//! Each submodule also provides the [`crate::store`] trait implementation
//! for its domain, so a `Database` can back every engine component.

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod config;
mod dedup;
mod ledgers;
mod links;
mod relations;
mod transactions;

#[cfg(test)]
mod tests;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a stored RFC 3339 datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool at the given path
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because each pooled
    /// connection would otherwise open its own private in-memory database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!(
            "{}/ledgerlink_test_{}_{}.db",
            std::env::temp_dir().display(),
            std::process::id(),
            id
        );

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: better concurrency, readers don't block writers
            PRAGMA journal_mode = WAL;

            -- Synchronous NORMAL: good balance of safety and performance
            PRAGMA synchronous = NORMAL;

            -- Ledgers (logical transaction partitions)
            CREATE TABLE IF NOT EXISTS ledgers (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_default INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ledgers_user ON ledgers(user_id);

            -- Transaction payloads, persisted against their primary ledger
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT PRIMARY KEY,
                ledger_id TEXT NOT NULL REFERENCES ledgers(id),
                account_id TEXT NOT NULL,
                category_id TEXT NOT NULL,
                amount_cents INTEGER NOT NULL,
                note TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_ledger ON transactions(ledger_id);

            -- One row per (transaction, ledger) association.
            -- The pair is unique: a transaction is related to a ledger at most once.
            CREATE TABLE IF NOT EXISTS transaction_ledger_relations (
                id TEXT PRIMARY KEY,
                transaction_id TEXT NOT NULL,
                ledger_id TEXT NOT NULL,
                relation_type TEXT NOT NULL,
                sync_source_ledger_id TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (transaction_id, ledger_id)
            );

            CREATE INDEX IF NOT EXISTS idx_relations_transaction
                ON transaction_ledger_relations(transaction_id);
            CREATE INDEX IF NOT EXISTS idx_relations_ledger
                ON transaction_ledger_relations(ledger_id);

            -- Directed links between ledger pairs with a propagation mode
            CREATE TABLE IF NOT EXISTS ledger_links (
                id TEXT PRIMARY KEY,
                parent_ledger_id TEXT NOT NULL,
                child_ledger_id TEXT NOT NULL,
                sync_mode TEXT NOT NULL,
                auto_sync_enabled INTEGER NOT NULL DEFAULT 1,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_links_parent ON ledger_links(parent_ledger_id);
            CREATE INDEX IF NOT EXISTS idx_links_child ON ledger_links(child_ledger_id);

            -- Per source-application auto-ledger settings.
            -- blacklist/whitelist are JSON arrays of keywords.
            CREATE TABLE IF NOT EXISTS app_auto_ledger_configs (
                package_name TEXT PRIMARY KEY,
                mode INTEGER NOT NULL DEFAULT 1,
                blacklist TEXT,
                whitelist TEXT,
                confidence_threshold REAL NOT NULL DEFAULT 0.6,
                amount_window_sec INTEGER,
                default_account_id TEXT,
                default_category_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Accepted notification events, keyed by fingerprint.
            -- The primary key on event_key backs the check-then-insert race:
            -- of two racing inserts only one can succeed.
            CREATE TABLE IF NOT EXISTS dedup_records (
                event_key TEXT PRIMARY KEY,
                package_name TEXT NOT NULL,
                amount_cents INTEGER NOT NULL,
                post_time INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_dedup_package_time
                ON dedup_records(package_name, post_time);
            "#,
        )?;

        info!("Database migrations complete");
        Ok(())
    }
}
