//! Ledger-scoped transaction views
//!
//! Read-side queries over the relation table: which transactions a ledger
//! sees under each filter mode, and where each one came from.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{
    RelationType, TransactionFilterMode, TransactionSyncType, TransactionWithSyncInfo,
};
use crate::store::{LinkStore, RelationStore, TransactionStore};

pub struct TransactionView {
    transactions: Arc<dyn TransactionStore>,
    relations: Arc<dyn RelationStore>,
    links: Arc<dyn LinkStore>,
}

impl TransactionView {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        relations: Arc<dyn RelationStore>,
        links: Arc<dyn LinkStore>,
    ) -> Self {
        Self {
            transactions,
            relations,
            links,
        }
    }

    /// Transactions visible to a ledger under the given filter mode,
    /// annotated with sync provenance
    ///
    /// `LocalOnly` returns only transactions whose PRIMARY relation is in
    /// this ledger. `LocalWithSynced` adds synced copies. `AllRelated` also
    /// pulls in everything visible to actively linked ledgers, deduplicated
    /// by transaction id with this ledger's own relation winning.
    pub async fn filtered_transactions(
        &self,
        ledger_id: &str,
        mode: TransactionFilterMode,
    ) -> Result<Vec<TransactionWithSyncInfo>> {
        if ledger_id.trim().is_empty() {
            return Err(Error::InvalidRequest("ledger id cannot be empty".into()));
        }

        let mut items = Vec::new();
        let mut seen = BTreeSet::new();

        let own = self.relations.relations_for_ledger(ledger_id).await?;
        for relation in &own {
            if mode == TransactionFilterMode::LocalOnly
                && relation.relation_type != RelationType::Primary
            {
                continue;
            }
            if let Some(item) = self.annotate(ledger_id, relation).await? {
                seen.insert(item.transaction.id.clone());
                items.push(item);
            }
        }

        if mode == TransactionFilterMode::AllRelated {
            let links = self.links.links_for_ledger(ledger_id).await?;
            for link in links.iter().filter(|l| l.is_active) {
                let Some(other) = link.other_ledger_id(ledger_id) else {
                    continue;
                };
                let neighbor_relations = self.relations.relations_for_ledger(other).await?;
                for relation in &neighbor_relations {
                    if seen.contains(&relation.transaction_id) {
                        continue;
                    }
                    if let Some(item) = self.annotate(other, relation).await? {
                        seen.insert(item.transaction.id.clone());
                        items.push(item);
                    }
                }
            }
        }

        debug!(
            ledger_id = %ledger_id,
            mode = ?mode,
            count = items.len(),
            "Filtered ledger transactions"
        );
        Ok(items)
    }

    /// Provenance of one transaction relative to one ledger
    pub async fn transaction_sync_status(
        &self,
        transaction_id: &str,
        ledger_id: &str,
    ) -> Result<TransactionSyncType> {
        if transaction_id.trim().is_empty() || ledger_id.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "transaction id and ledger id cannot be empty".into(),
            ));
        }

        let relation = self
            .relations
            .relation_for_transaction_in_ledger(transaction_id, ledger_id)
            .await?;
        Ok(match relation {
            None => TransactionSyncType::Unrelated,
            Some(r) if r.relation_type == RelationType::Primary => TransactionSyncType::Primary,
            Some(_) => TransactionSyncType::Synced,
        })
    }

    /// Every ledger a transaction is related to, primary ledger included
    pub async fn transaction_sync_network(&self, transaction_id: &str) -> Result<BTreeSet<String>> {
        if transaction_id.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "transaction id cannot be empty".into(),
            ));
        }

        let relations = self.relations.relations_for_transaction(transaction_id).await?;
        Ok(relations.into_iter().map(|r| r.ledger_id).collect())
    }

    /// Resolve one relation row to an annotated transaction. Returns None
    /// when the payload is missing, which means the relation is an orphan.
    async fn annotate(
        &self,
        viewing_ledger_id: &str,
        relation: &crate::models::TransactionLedgerRelation,
    ) -> Result<Option<TransactionWithSyncInfo>> {
        let Some(transaction) = self
            .transactions
            .get_transaction(&relation.transaction_id)
            .await?
        else {
            debug!(
                transaction_id = %relation.transaction_id,
                "Skipping orphan relation with no transaction payload"
            );
            return Ok(None);
        };

        let (sync_type, source_ledger_id, target_ledger_ids) = match relation.relation_type {
            RelationType::Primary => {
                let network = self
                    .transaction_sync_network(&relation.transaction_id)
                    .await?;
                let targets = network
                    .into_iter()
                    .filter(|id| id != viewing_ledger_id)
                    .collect();
                (
                    TransactionSyncType::Primary,
                    viewing_ledger_id.to_string(),
                    targets,
                )
            }
            _ => {
                let source = relation
                    .sync_source_ledger_id
                    .clone()
                    .unwrap_or_else(|| transaction.ledger_id.clone());
                (TransactionSyncType::Synced, source, Vec::new())
            }
        };

        Ok(Some(TransactionWithSyncInfo {
            transaction,
            sync_type,
            source_ledger_id,
            target_ledger_ids,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{CreateTransactionRequest, SyncMode};
    use crate::test_support::{registry_for, seed_ledger, sync_engine_for, view_for};

    async fn linked_pair(db: &Database) {
        seed_ledger(db, "main", "user1", true);
        seed_ledger(db, "work", "user1", true);
        registry_for(db)
            .create_link("main", "work", SyncMode::Bidirectional, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_local_only_is_subset_of_local_with_synced() {
        let db = Database::in_memory().unwrap();
        linked_pair(&db).await;
        let engine = sync_engine_for(&db);
        let view = view_for(&db);

        // One transaction born in each ledger, both fanned out
        engine
            .create_linked_transaction(&CreateTransactionRequest::new(
                "main", "acc1", 100, "cat1",
            ))
            .await
            .unwrap();
        engine
            .create_linked_transaction(&CreateTransactionRequest::new(
                "work", "acc1", 200, "cat1",
            ))
            .await
            .unwrap();

        let local = view
            .filtered_transactions("main", TransactionFilterMode::LocalOnly)
            .await
            .unwrap();
        let with_synced = view
            .filtered_transactions("main", TransactionFilterMode::LocalWithSynced)
            .await
            .unwrap();

        assert_eq!(local.len(), 1);
        assert_eq!(with_synced.len(), 2);

        let with_synced_ids: BTreeSet<_> = with_synced
            .iter()
            .map(|t| t.transaction.id.clone())
            .collect();
        for item in &local {
            assert!(with_synced_ids.contains(&item.transaction.id));
            assert_eq!(item.sync_type, TransactionSyncType::Primary);
        }
    }

    #[tokio::test]
    async fn test_synced_item_carries_source_ledger() {
        let db = Database::in_memory().unwrap();
        linked_pair(&db).await;
        let engine = sync_engine_for(&db);
        let view = view_for(&db);

        engine
            .create_linked_transaction(&CreateTransactionRequest::new(
                "main", "acc1", 100, "cat1",
            ))
            .await
            .unwrap();

        let items = view
            .filtered_transactions("work", TransactionFilterMode::LocalWithSynced)
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sync_type, TransactionSyncType::Synced);
        assert_eq!(items[0].source_ledger_id, "main");
        assert!(items[0].target_ledger_ids.is_empty());
    }

    #[tokio::test]
    async fn test_primary_item_lists_sync_targets() {
        let db = Database::in_memory().unwrap();
        linked_pair(&db).await;
        seed_ledger(&db, "extra", "user1", true);
        registry_for(&db)
            .create_link("main", "extra", SyncMode::Bidirectional, true)
            .await
            .unwrap();
        let engine = sync_engine_for(&db);
        let view = view_for(&db);

        engine
            .create_linked_transaction(&CreateTransactionRequest::new(
                "main", "acc1", 100, "cat1",
            ))
            .await
            .unwrap();

        let items = view
            .filtered_transactions("main", TransactionFilterMode::LocalOnly)
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        let mut targets = items[0].target_ledger_ids.clone();
        targets.sort();
        assert_eq!(targets, vec!["extra".to_string(), "work".to_string()]);
    }

    #[tokio::test]
    async fn test_all_related_pulls_in_linked_ledger_without_duplicates() {
        let db = Database::in_memory().unwrap();
        linked_pair(&db).await;
        let engine = sync_engine_for(&db);
        let view = view_for(&db);

        // Shared transaction, visible to both ledgers
        engine
            .create_linked_transaction(&CreateTransactionRequest::new(
                "main", "acc1", 100, "cat1",
            ))
            .await
            .unwrap();
        // Unshared transaction in work only
        engine
            .create_linked_transaction(
                &CreateTransactionRequest::new("work", "acc1", 200, "cat1").with_auto_sync(false),
            )
            .await
            .unwrap();

        let items = view
            .filtered_transactions("main", TransactionFilterMode::AllRelated)
            .await
            .unwrap();
        assert_eq!(items.len(), 2);

        let ids: Vec<_> = items.iter().map(|t| t.transaction.id.clone()).collect();
        let unique: BTreeSet<_> = ids.iter().cloned().collect();
        assert_eq!(ids.len(), unique.len());
    }

    #[tokio::test]
    async fn test_sync_status_and_network() {
        let db = Database::in_memory().unwrap();
        linked_pair(&db).await;
        let engine = sync_engine_for(&db);
        let view = view_for(&db);

        let result = engine
            .create_linked_transaction(&CreateTransactionRequest::new(
                "main", "acc1", 100, "cat1",
            ))
            .await
            .unwrap();
        let tx_id = &result.transaction.id;

        assert_eq!(
            view.transaction_sync_status(tx_id, "main").await.unwrap(),
            TransactionSyncType::Primary
        );
        assert_eq!(
            view.transaction_sync_status(tx_id, "work").await.unwrap(),
            TransactionSyncType::Synced
        );
        assert_eq!(
            view.transaction_sync_status(tx_id, "elsewhere")
                .await
                .unwrap(),
            TransactionSyncType::Unrelated
        );

        let network = view.transaction_sync_network(tx_id).await.unwrap();
        let expected: BTreeSet<String> = ["main".to_string(), "work".to_string()].into();
        assert_eq!(network, expected);
    }

    #[tokio::test]
    async fn test_empty_ledger_id_rejected() {
        let db = Database::in_memory().unwrap();
        let view = view_for(&db);

        let err = view
            .filtered_transactions("", TransactionFilterMode::LocalOnly)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
