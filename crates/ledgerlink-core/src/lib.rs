//! Ledgerlink Core Library
//!
//! Shared functionality for the Ledgerlink multi-ledger engine:
//! - Database access and migrations
//! - Ledger link registry (parent/child links with sync modes)
//! - Transaction sync engine (primary relation plus link-graph fan-out)
//! - Ledger-scoped transaction views with sync provenance
//! - Notification dedup gate for automatic transaction capture
//! - Deterministic event fingerprints

pub mod db;
pub mod dedup;
pub mod error;
pub mod event_key;
pub mod links;
pub mod models;
pub mod store;
pub mod sync;
pub mod view;

#[cfg(test)]
mod test_support;

pub use db::Database;
pub use dedup::DedupGate;
pub use error::{Error, Result};
pub use links::LinkRegistry;
pub use models::{
    AppAutoLedgerConfig, AutoLedgerMode, BatchCreateResult, BatchTransactionError,
    CreateLinkedTransactionResult, CreateTransactionRequest, DedupRecord, DedupStats, Ledger,
    LedgerLink, PackageDedupStats, PaymentDirection, PaymentNotification, ProcessDecision,
    RawNotificationEvent, RelationType, SyncMode, Transaction, TransactionFilterMode,
    TransactionLedgerRelation, TransactionSyncType, TransactionWithSyncInfo,
};
pub use store::{
    ConfigStore, DedupStore, LedgerStore, LinkStore, RelationStore, TransactionStore,
};
pub use sync::SyncEngine;
pub use view::TransactionView;
