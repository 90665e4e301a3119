//! Ledger row operations
//!
//! Ledger CRUD belongs to the surrounding application; the engines only need
//! lookup. The write helpers here exist so the store can be seeded (and
//! tested) without another component.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::Ledger;
use crate::store::LedgerStore;

fn ledger_from_row(row: &Row<'_>) -> rusqlite::Result<Ledger> {
    Ok(Ledger {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        is_active: row.get::<_, i64>(3)? != 0,
        is_default: row.get::<_, i64>(4)? != 0,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        updated_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

const LEDGER_COLUMNS: &str = "id, user_id, name, is_active, is_default, created_at, updated_at";

impl Database {
    /// Insert or replace a ledger row
    pub fn upsert_ledger(&self, ledger: &Ledger) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO ledgers (id, user_id, name, is_active, is_default, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                name = excluded.name,
                is_active = excluded.is_active,
                is_default = excluded.is_default,
                updated_at = excluded.updated_at
            "#,
            params![
                ledger.id,
                ledger.user_id,
                ledger.name,
                ledger.is_active as i64,
                ledger.is_default as i64,
                ledger.created_at.to_rfc3339(),
                ledger.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_ledger_row(&self, id: &str) -> Result<Option<Ledger>> {
        let conn = self.conn()?;
        let ledger = conn
            .query_row(
                &format!("SELECT {} FROM ledgers WHERE id = ?", LEDGER_COLUMNS),
                params![id],
                ledger_from_row,
            )
            .optional()?;
        Ok(ledger)
    }

    /// Flip the active flag on a ledger
    pub fn set_ledger_active(&self, id: &str, is_active: bool) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE ledgers SET is_active = ?, updated_at = ? WHERE id = ?",
            params![is_active as i64, Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn list_ledgers_for_user(&self, user_id: &str) -> Result<Vec<Ledger>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ledgers WHERE user_id = ? ORDER BY created_at",
            LEDGER_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id], ledger_from_row)?;
        let mut ledgers = Vec::new();
        for row in rows {
            ledgers.push(row?);
        }
        Ok(ledgers)
    }
}

#[async_trait]
impl LedgerStore for Database {
    async fn get_ledger(&self, id: &str) -> Result<Option<Ledger>> {
        self.get_ledger_row(id)
    }
}
