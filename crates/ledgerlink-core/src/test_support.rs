//! Shared test fixtures
//!
//! Every engine test runs against a real throwaway [`Database`], wired up
//! through the store traits exactly as production callers would wire it.

use std::sync::Arc;

use chrono::Utc;

use crate::db::Database;
use crate::dedup::DedupGate;
use crate::links::LinkRegistry;
use crate::models::Ledger;
use crate::sync::SyncEngine;
use crate::view::TransactionView;

/// Insert a ledger row directly, bypassing engine validation
pub fn seed_ledger(db: &Database, id: &str, user_id: &str, is_active: bool) {
    let now = Utc::now();
    db.upsert_ledger(&Ledger {
        id: id.to_string(),
        user_id: user_id.to_string(),
        name: format!("Ledger {}", id),
        is_active,
        is_default: false,
        created_at: now,
        updated_at: now,
    })
    .unwrap();
}

pub fn registry_for(db: &Database) -> LinkRegistry {
    LinkRegistry::new(Arc::new(db.clone()), Arc::new(db.clone()))
}

pub fn sync_engine_for(db: &Database) -> SyncEngine {
    SyncEngine::new(
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        Arc::new(db.clone()),
    )
}

pub fn view_for(db: &Database) -> TransactionView {
    TransactionView::new(
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        Arc::new(db.clone()),
    )
}

pub fn gate_for(db: &Database) -> DedupGate {
    DedupGate::new(Arc::new(db.clone()), Arc::new(db.clone()))
}
