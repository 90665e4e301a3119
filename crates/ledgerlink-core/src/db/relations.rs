//! Transaction-ledger relation operations

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{RelationType, TransactionLedgerRelation};
use crate::store::RelationStore;

const RELATION_COLUMNS: &str =
    "id, transaction_id, ledger_id, relation_type, sync_source_ledger_id, created_at";

fn relation_from_row(row: &Row<'_>) -> rusqlite::Result<TransactionLedgerRelation> {
    let type_str: String = row.get(3)?;
    let relation_type = type_str.parse::<RelationType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(TransactionLedgerRelation {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        ledger_id: row.get(2)?,
        relation_type,
        sync_source_ledger_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

impl Database {
    pub fn insert_relation_row(&self, relation: &TransactionLedgerRelation) -> Result<()> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO transaction_ledger_relations
                (id, transaction_id, ledger_id, relation_type, sync_source_ledger_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                relation.id,
                relation.transaction_id,
                relation.ledger_id,
                relation.relation_type.as_str(),
                relation.sync_source_ledger_id,
                relation.created_at.to_rfc3339(),
            ],
        )?;

        // The (transaction, ledger) pair is unique; a second relation for the
        // same pair is a caller error, not a silent no-op.
        if inserted == 0 {
            return Err(Error::AlreadyInLedger(format!(
                "transaction {} in ledger {}",
                relation.transaction_id, relation.ledger_id
            )));
        }
        Ok(())
    }

    pub fn relations_for_transaction_rows(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<TransactionLedgerRelation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transaction_ledger_relations WHERE transaction_id = ? ORDER BY created_at, id",
            RELATION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![transaction_id], relation_from_row)?;
        let mut relations = Vec::new();
        for row in rows {
            relations.push(row?);
        }
        Ok(relations)
    }

    pub fn relations_for_ledger_rows(
        &self,
        ledger_id: &str,
    ) -> Result<Vec<TransactionLedgerRelation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transaction_ledger_relations WHERE ledger_id = ? ORDER BY created_at, id",
            RELATION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![ledger_id], relation_from_row)?;
        let mut relations = Vec::new();
        for row in rows {
            relations.push(row?);
        }
        Ok(relations)
    }
}

#[async_trait]
impl RelationStore for Database {
    async fn insert_relation(&self, relation: &TransactionLedgerRelation) -> Result<()> {
        self.insert_relation_row(relation)
    }

    async fn relations_for_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<TransactionLedgerRelation>> {
        self.relations_for_transaction_rows(transaction_id)
    }

    async fn relations_for_ledger(
        &self,
        ledger_id: &str,
    ) -> Result<Vec<TransactionLedgerRelation>> {
        self.relations_for_ledger_rows(ledger_id)
    }

    async fn relation_for_transaction_in_ledger(
        &self,
        transaction_id: &str,
        ledger_id: &str,
    ) -> Result<Option<TransactionLedgerRelation>> {
        let conn = self.conn()?;
        let relation = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transaction_ledger_relations WHERE transaction_id = ? AND ledger_id = ?",
                    RELATION_COLUMNS
                ),
                params![transaction_id, ledger_id],
                relation_from_row,
            )
            .optional()?;
        Ok(relation)
    }

    async fn relations_for_ledger_by_type(
        &self,
        ledger_id: &str,
        relation_type: RelationType,
    ) -> Result<Vec<TransactionLedgerRelation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transaction_ledger_relations WHERE ledger_id = ? AND relation_type = ? ORDER BY created_at, id",
            RELATION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![ledger_id, relation_type.as_str()], relation_from_row)?;
        let mut relations = Vec::new();
        for row in rows {
            relations.push(row?);
        }
        Ok(relations)
    }

    async fn delete_relation(&self, relation_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM transaction_ledger_relations WHERE id = ?",
            params![relation_id],
        )?;
        Ok(())
    }
}
