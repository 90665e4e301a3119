//! Store trait boundaries
//!
//! The engines only ever touch persistence through these narrow collaborator
//! contracts, so tests (and alternative backends) can swap implementations.
//! The bundled SQLite [`Database`](crate::db::Database) implements all of
//! them. Every operation is async: callers must treat each call as
//! potentially blocking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    AppAutoLedgerConfig, DedupRecord, DedupStats, Ledger, LedgerLink, RelationType, SyncMode,
    Transaction, TransactionLedgerRelation,
};

/// Ledger lookup, supplied by the external ledger repository
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_ledger(&self, id: &str) -> Result<Option<Ledger>>;
}

/// Transaction persistence
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persist a transaction payload; returns the stored transaction id
    async fn add_transaction(&self, transaction: &Transaction) -> Result<String>;

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>>;

    /// Transactions persisted against `ledger_id`
    async fn transactions_by_ledger(&self, ledger_id: &str) -> Result<Vec<Transaction>>;
}

/// Transaction-ledger relation persistence
#[async_trait]
pub trait RelationStore: Send + Sync {
    async fn insert_relation(&self, relation: &TransactionLedgerRelation) -> Result<()>;

    async fn relations_for_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<TransactionLedgerRelation>>;

    async fn relations_for_ledger(&self, ledger_id: &str)
        -> Result<Vec<TransactionLedgerRelation>>;

    async fn relation_for_transaction_in_ledger(
        &self,
        transaction_id: &str,
        ledger_id: &str,
    ) -> Result<Option<TransactionLedgerRelation>>;

    async fn relations_for_ledger_by_type(
        &self,
        ledger_id: &str,
        relation_type: RelationType,
    ) -> Result<Vec<TransactionLedgerRelation>>;

    async fn delete_relation(&self, relation_id: &str) -> Result<()>;
}

/// Ledger link persistence
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn insert_link(&self, link: &LedgerLink) -> Result<()>;

    async fn get_link(&self, id: &str) -> Result<Option<LedgerLink>>;

    async fn update_sync_mode(&self, id: &str, sync_mode: SyncMode) -> Result<()>;

    async fn set_auto_sync_enabled(&self, id: &str, enabled: bool) -> Result<()>;

    async fn delete_link(&self, id: &str) -> Result<()>;

    /// Remove every link where the ledger is parent or child; returns the
    /// number of deleted rows
    async fn delete_links_for_ledger(&self, ledger_id: &str) -> Result<u64>;

    /// The active link between an unordered pair of ledgers, if any
    async fn link_between(&self, a: &str, b: &str) -> Result<Option<LedgerLink>>;

    /// All links touching the ledger, as parent or child, active or not
    async fn links_for_ledger(&self, ledger_id: &str) -> Result<Vec<LedgerLink>>;

    /// Links where the ledger is the parent
    async fn child_links(&self, ledger_id: &str) -> Result<Vec<LedgerLink>>;

    /// All active links in the store
    async fn active_links(&self) -> Result<Vec<LedgerLink>>;
}

/// Per-app auto-ledger config persistence
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn config_for_package(&self, package_name: &str)
        -> Result<Option<AppAutoLedgerConfig>>;

    async fn upsert_config(&self, config: &AppAutoLedgerConfig) -> Result<()>;
}

/// Dedup record persistence
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn event_key_exists(&self, event_key: &str) -> Result<bool>;

    /// Atomic insert-if-absent keyed by event key. Returns true when the row
    /// was inserted; false when the key already existed. Of two racing
    /// inserts with the same key, exactly one returns true.
    async fn insert_record(&self, record: &DedupRecord) -> Result<bool>;

    /// Count of records for `package_name` with post_time in
    /// `[start_ms, end_ms]`, endpoints inclusive
    async fn count_in_window(&self, package_name: &str, start_ms: i64, end_ms: i64)
        -> Result<u64>;

    /// Delete records created before `cutoff`; returns the deleted count
    async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn clear_all(&self) -> Result<u64>;

    async fn stats(&self) -> Result<DedupStats>;
}
