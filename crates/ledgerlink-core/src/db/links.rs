//! Ledger link operations

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{LedgerLink, SyncMode};
use crate::store::LinkStore;

const LINK_COLUMNS: &str = "id, parent_ledger_id, child_ledger_id, sync_mode, auto_sync_enabled, is_active, created_at, updated_at";

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerLink> {
    let mode_str: String = row.get(3)?;
    let sync_mode = mode_str.parse::<SyncMode>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(LedgerLink {
        id: row.get(0)?,
        parent_ledger_id: row.get(1)?,
        child_ledger_id: row.get(2)?,
        sync_mode,
        auto_sync_enabled: row.get::<_, i64>(4)? != 0,
        is_active: row.get::<_, i64>(5)? != 0,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

impl Database {
    fn query_links(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<LedgerLink>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, link_from_row)?;
        let mut links = Vec::new();
        for row in rows {
            links.push(row?);
        }
        Ok(links)
    }
}

#[async_trait]
impl LinkStore for Database {
    async fn insert_link(&self, link: &LedgerLink) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO ledger_links
                (id, parent_ledger_id, child_ledger_id, sync_mode, auto_sync_enabled, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                link.id,
                link.parent_ledger_id,
                link.child_ledger_id,
                link.sync_mode.as_str(),
                link.auto_sync_enabled as i64,
                link.is_active as i64,
                link.created_at.to_rfc3339(),
                link.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn get_link(&self, id: &str) -> Result<Option<LedgerLink>> {
        let conn = self.conn()?;
        let link = conn
            .query_row(
                &format!("SELECT {} FROM ledger_links WHERE id = ?", LINK_COLUMNS),
                params![id],
                link_from_row,
            )
            .optional()?;
        Ok(link)
    }

    async fn update_sync_mode(&self, id: &str, sync_mode: SyncMode) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE ledger_links SET sync_mode = ?, updated_at = ? WHERE id = ?",
            params![sync_mode.as_str(), Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    async fn set_auto_sync_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE ledger_links SET auto_sync_enabled = ?, updated_at = ? WHERE id = ?",
            params![enabled as i64, Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    async fn delete_link(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM ledger_links WHERE id = ?", params![id])?;
        Ok(())
    }

    async fn delete_links_for_ledger(&self, ledger_id: &str) -> Result<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM ledger_links WHERE parent_ledger_id = ? OR child_ledger_id = ?",
            params![ledger_id, ledger_id],
        )?;
        Ok(deleted as u64)
    }

    async fn link_between(&self, a: &str, b: &str) -> Result<Option<LedgerLink>> {
        let conn = self.conn()?;
        let link = conn
            .query_row(
                &format!(
                    r#"
                    SELECT {} FROM ledger_links
                    WHERE is_active = 1
                      AND ((parent_ledger_id = ?1 AND child_ledger_id = ?2)
                        OR (parent_ledger_id = ?2 AND child_ledger_id = ?1))
                    "#,
                    LINK_COLUMNS
                ),
                params![a, b],
                link_from_row,
            )
            .optional()?;
        Ok(link)
    }

    async fn links_for_ledger(&self, ledger_id: &str) -> Result<Vec<LedgerLink>> {
        self.query_links(
            &format!(
                "SELECT {} FROM ledger_links WHERE parent_ledger_id = ?1 OR child_ledger_id = ?1 ORDER BY created_at, id",
                LINK_COLUMNS
            ),
            &[&ledger_id],
        )
    }

    async fn child_links(&self, ledger_id: &str) -> Result<Vec<LedgerLink>> {
        self.query_links(
            &format!(
                "SELECT {} FROM ledger_links WHERE parent_ledger_id = ? ORDER BY created_at, id",
                LINK_COLUMNS
            ),
            &[&ledger_id],
        )
    }

    async fn active_links(&self) -> Result<Vec<LedgerLink>> {
        self.query_links(
            &format!(
                "SELECT {} FROM ledger_links WHERE is_active = 1 ORDER BY created_at, id",
                LINK_COLUMNS
            ),
            &[],
        )
    }
}
