//! Notification dedup records

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{DedupRecord, DedupStats, PackageDedupStats};
use crate::store::DedupStore;

#[async_trait]
impl DedupStore for Database {
    async fn event_key_exists(&self, event_key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM dedup_records WHERE event_key = ?",
            params![event_key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn insert_record(&self, record: &DedupRecord) -> Result<bool> {
        let conn = self.conn()?;
        // INSERT OR IGNORE against the event_key primary key: the loser of a
        // racing insert sees 0 changed rows, never a constraint error.
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO dedup_records
                (event_key, package_name, amount_cents, post_time, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                record.event_key,
                record.package_name,
                record.amount_cents,
                record.post_time,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }

    async fn count_in_window(
        &self,
        package_name: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM dedup_records WHERE package_name = ? AND post_time BETWEEN ? AND ?",
            params![package_name, start_ms, end_ms],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.conn()?;
        // created_at is stored as RFC 3339, which sorts lexicographically
        // in UTC, so a string comparison is a time comparison.
        let deleted = conn.execute(
            "DELETE FROM dedup_records WHERE created_at < ?",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(deleted as u64)
    }

    async fn clear_all(&self) -> Result<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM dedup_records", [])?;
        Ok(deleted as u64)
    }

    async fn stats(&self) -> Result<DedupStats> {
        let conn = self.conn()?;
        let total_records: i64 =
            conn.query_row("SELECT COUNT(*) FROM dedup_records", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT package_name, COUNT(*) AS record_count
            FROM dedup_records
            GROUP BY package_name
            ORDER BY record_count DESC, package_name
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PackageDedupStats {
                package_name: row.get(0)?,
                record_count: row.get::<_, i64>(1)? as u64,
            })
        })?;
        let mut package_stats = Vec::new();
        for row in rows {
            package_stats.push(row?);
        }

        Ok(DedupStats {
            total_records: total_records as u64,
            package_stats,
        })
    }
}

impl Database {
    /// Fetch one dedup record by key (test/diagnostic helper)
    pub fn get_dedup_record(&self, event_key: &str) -> Result<Option<DedupRecord>> {
        use rusqlite::OptionalExtension;

        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT event_key, package_name, amount_cents, post_time, created_at FROM dedup_records WHERE event_key = ?",
                params![event_key],
                |row| {
                    Ok(DedupRecord {
                        event_key: row.get(0)?,
                        package_name: row.get(1)?,
                        amount_cents: row.get(2)?,
                        post_time: row.get(3)?,
                        created_at: parse_datetime(&row.get::<_, String>(4)?),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}
