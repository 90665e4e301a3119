//! Per-app auto-ledger configuration

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{AppAutoLedgerConfig, AutoLedgerMode};
use crate::store::ConfigStore;

const CONFIG_COLUMNS: &str = "package_name, mode, blacklist, whitelist, confidence_threshold, amount_window_sec, default_account_id, default_category_id, created_at, updated_at";

/// Keyword lists are stored as JSON arrays; a missing or malformed column
/// reads back as an empty list.
fn keywords_from_json(json: Option<String>) -> Vec<String> {
    json.and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
        .unwrap_or_default()
}

fn config_from_row(row: &Row<'_>) -> rusqlite::Result<AppAutoLedgerConfig> {
    Ok(AppAutoLedgerConfig {
        package_name: row.get(0)?,
        mode: AutoLedgerMode::from_i64(row.get(1)?),
        blacklist: keywords_from_json(row.get(2)?),
        whitelist: keywords_from_json(row.get(3)?),
        confidence_threshold: row.get(4)?,
        amount_window_sec: row.get::<_, Option<i64>>(5)?.map(|v| v as u32),
        default_account_id: row.get(6)?,
        default_category_id: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

#[async_trait]
impl ConfigStore for Database {
    async fn config_for_package(
        &self,
        package_name: &str,
    ) -> Result<Option<AppAutoLedgerConfig>> {
        let conn = self.conn()?;
        let config = conn
            .query_row(
                &format!(
                    "SELECT {} FROM app_auto_ledger_configs WHERE package_name = ?",
                    CONFIG_COLUMNS
                ),
                params![package_name],
                config_from_row,
            )
            .optional()?;
        Ok(config)
    }

    async fn upsert_config(&self, config: &AppAutoLedgerConfig) -> Result<()> {
        let blacklist = serde_json::to_string(&config.blacklist)?;
        let whitelist = serde_json::to_string(&config.whitelist)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO app_auto_ledger_configs
                (package_name, mode, blacklist, whitelist, confidence_threshold,
                 amount_window_sec, default_account_id, default_category_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(package_name) DO UPDATE SET
                mode = excluded.mode,
                blacklist = excluded.blacklist,
                whitelist = excluded.whitelist,
                confidence_threshold = excluded.confidence_threshold,
                amount_window_sec = excluded.amount_window_sec,
                default_account_id = excluded.default_account_id,
                default_category_id = excluded.default_category_id,
                updated_at = excluded.updated_at
            "#,
            params![
                config.package_name,
                config.mode.as_i64(),
                blacklist,
                whitelist,
                config.confidence_threshold,
                config.amount_window_sec.map(|v| v as i64),
                config.default_account_id,
                config.default_category_id,
                config.created_at.to_rfc3339(),
                config.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}
