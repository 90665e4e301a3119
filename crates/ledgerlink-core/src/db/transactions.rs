//! Transaction payload operations

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::Transaction;
use crate::store::TransactionStore;

const TX_COLUMNS: &str =
    "id, ledger_id, account_id, category_id, amount_cents, note, created_at, updated_at";

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        ledger_id: row.get(1)?,
        account_id: row.get(2)?,
        category_id: row.get(3)?,
        amount_cents: row.get(4)?,
        note: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

impl Database {
    pub fn insert_transaction(&self, tx: &Transaction) -> Result<String> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions
                (id, ledger_id, account_id, category_id, amount_cents, note, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.id,
                tx.ledger_id,
                tx.account_id,
                tx.category_id,
                tx.amount_cents,
                tx.note,
                tx.created_at.to_rfc3339(),
                tx.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(tx.id.clone())
    }

    pub fn get_transaction_row(&self, id: &str) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!("SELECT {} FROM transactions WHERE id = ?", TX_COLUMNS),
                params![id],
                transaction_from_row,
            )
            .optional()?;
        Ok(tx)
    }

    /// Transactions persisted against a ledger, newest first
    pub fn transactions_by_ledger_rows(&self, ledger_id: &str) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE ledger_id = ? ORDER BY created_at DESC, id",
            TX_COLUMNS
        ))?;
        let rows = stmt.query_map(params![ledger_id], transaction_from_row)?;
        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row?);
        }
        Ok(transactions)
    }
}

#[async_trait]
impl TransactionStore for Database {
    async fn add_transaction(&self, transaction: &Transaction) -> Result<String> {
        self.insert_transaction(transaction)
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        self.get_transaction_row(id)
    }

    async fn transactions_by_ledger(&self, ledger_id: &str) -> Result<Vec<Transaction>> {
        self.transactions_by_ledger_rows(ledger_id)
    }
}
