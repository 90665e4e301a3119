//! Transaction sync engine
//!
//! Creates a transaction in one ledger and fans it out to linked ledgers.
//! The PRIMARY relation is always durably recorded before fan-out is
//! attempted, so a transaction is never observable with SYNCED relations but
//! no PRIMARY relation. Fan-out is best-effort: failures are collected and
//! surfaced on the result, never rolled back.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    BatchCreateResult, BatchTransactionError, CreateLinkedTransactionResult,
    CreateTransactionRequest, RelationType, Transaction, TransactionLedgerRelation,
};
use crate::store::{LedgerStore, LinkStore, RelationStore, TransactionStore};

pub struct SyncEngine {
    ledgers: Arc<dyn LedgerStore>,
    transactions: Arc<dyn TransactionStore>,
    relations: Arc<dyn RelationStore>,
    links: Arc<dyn LinkStore>,
}

impl SyncEngine {
    pub fn new(
        ledgers: Arc<dyn LedgerStore>,
        transactions: Arc<dyn TransactionStore>,
        relations: Arc<dyn RelationStore>,
        links: Arc<dyn LinkStore>,
    ) -> Self {
        Self {
            ledgers,
            transactions,
            relations,
            links,
        }
    }

    /// Pre-flight validation, identical to what `create_linked_transaction`
    /// runs internally
    pub async fn validate_transaction_request(
        &self,
        primary_ledger_id: &str,
        account_id: &str,
        category_id: &str,
        amount_cents: i64,
    ) -> Result<()> {
        if primary_ledger_id.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "primary ledger id cannot be empty".into(),
            ));
        }
        if account_id.trim().is_empty() {
            return Err(Error::InvalidRequest("account id cannot be empty".into()));
        }
        if category_id.trim().is_empty() {
            return Err(Error::InvalidRequest("category id cannot be empty".into()));
        }
        if amount_cents == 0 {
            return Err(Error::InvalidRequest(
                "transaction amount cannot be zero".into(),
            ));
        }

        let ledger = self
            .ledgers
            .get_ledger(primary_ledger_id)
            .await?
            .ok_or_else(|| {
                Error::LedgerNotFound(format!("primary ledger {}", primary_ledger_id))
            })?;
        if !ledger.is_active {
            return Err(Error::LedgerNotActive(format!(
                "primary ledger {}",
                primary_ledger_id
            )));
        }
        Ok(())
    }

    /// Create a transaction in the primary ledger and propagate it
    ///
    /// With `specific_target_ledgers` set, only those ledgers are synchronized
    /// via the manual path; otherwise the link graph decides the fan-out.
    /// The two paths are mutually exclusive for a single call.
    pub async fn create_linked_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<CreateLinkedTransactionResult> {
        self.validate_transaction_request(
            &request.primary_ledger_id,
            &request.account_id,
            &request.category_id,
            request.amount_cents,
        )
        .await?;

        let now = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            ledger_id: request.primary_ledger_id.clone(),
            account_id: request.account_id.clone(),
            category_id: request.category_id.clone(),
            amount_cents: request.amount_cents,
            note: request.note.as_ref().map(|n| n.trim().to_string()),
            created_at: now,
            updated_at: now,
        };
        let transaction_id = self.transactions.add_transaction(&transaction).await?;

        let primary_relation = TransactionLedgerRelation {
            id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id.clone(),
            ledger_id: request.primary_ledger_id.clone(),
            relation_type: RelationType::Primary,
            sync_source_ledger_id: None,
            created_at: now,
        };
        self.relations.insert_relation(&primary_relation).await?;

        debug!(
            transaction_id = %transaction_id,
            ledger_id = %request.primary_ledger_id,
            "Created transaction with primary relation"
        );

        let mut synced_relations = Vec::new();
        let mut sync_errors = Vec::new();

        if request.auto_sync {
            match &request.specific_target_ledgers {
                Some(targets) => {
                    for target in targets {
                        if target == &request.primary_ledger_id {
                            continue;
                        }
                        match self
                            .manual_sync_transaction(
                                &transaction_id,
                                &request.primary_ledger_id,
                                target,
                            )
                            .await
                        {
                            Ok(relation) => synced_relations.push(relation),
                            Err(e) => {
                                warn!(
                                    transaction_id = %transaction_id,
                                    target = %target,
                                    error = %e,
                                    "Manual sync target failed"
                                );
                                sync_errors.push(format!("sync to ledger {} failed: {}", target, e));
                            }
                        }
                    }
                }
                None => {
                    let (relations, errors) = self
                        .fan_out(&transaction_id, &request.primary_ledger_id)
                        .await;
                    synced_relations = relations;
                    sync_errors = errors;
                }
            }
        }

        info!(
            transaction_id = %transaction_id,
            synced = synced_relations.len(),
            failed = sync_errors.len(),
            "Linked transaction created"
        );

        Ok(CreateLinkedTransactionResult {
            transaction,
            primary_relation,
            synced_relations,
            sync_errors,
        })
    }

    /// Create exactly one SYNCED relation in the target ledger, attributed to
    /// the source ledger
    ///
    /// Works with or without a link between the two ledgers; when a link
    /// exists it only determines how the relation direction is named.
    pub async fn manual_sync_transaction(
        &self,
        transaction_id: &str,
        source_ledger_id: &str,
        target_ledger_id: &str,
    ) -> Result<TransactionLedgerRelation> {
        if transaction_id.trim().is_empty()
            || source_ledger_id.trim().is_empty()
            || target_ledger_id.trim().is_empty()
        {
            return Err(Error::InvalidRequest(
                "transaction id and ledger ids cannot be empty".into(),
            ));
        }
        if source_ledger_id == target_ledger_id {
            return Err(Error::InvalidRequest(
                "source and target ledger cannot be the same".into(),
            ));
        }

        if self
            .relations
            .relation_for_transaction_in_ledger(transaction_id, target_ledger_id)
            .await?
            .is_some()
        {
            return Err(Error::AlreadyInLedger(format!(
                "transaction {} in ledger {}",
                transaction_id, target_ledger_id
            )));
        }

        let link = self
            .links
            .link_between(source_ledger_id, target_ledger_id)
            .await?;
        let relation_type = match link {
            Some(ref l) if l.is_child(source_ledger_id) => RelationType::SyncedFromChild,
            _ => RelationType::SyncedFromParent,
        };

        let relation = sync_relation(
            transaction_id,
            target_ledger_id,
            source_ledger_id,
            relation_type,
        );
        self.relations.insert_relation(&relation).await?;

        debug!(
            transaction_id = %transaction_id,
            source = %source_ledger_id,
            target = %target_ledger_id,
            "Manually synced transaction"
        );
        Ok(relation)
    }

    /// Process each request independently and sequentially; a failure on one
    /// request is recorded and processing continues. Dropping the returned
    /// future between items cancels the rest of the batch while leaving
    /// completed items' effects intact.
    pub async fn batch_create_linked_transactions(
        &self,
        requests: Vec<CreateTransactionRequest>,
    ) -> BatchCreateResult {
        let mut batch = BatchCreateResult::default();

        for (index, request) in requests.into_iter().enumerate() {
            match self.create_linked_transaction(&request).await {
                Ok(result) => {
                    batch.success_count += 1;
                    batch.results.push(result);
                }
                Err(e) => {
                    batch.error_count += 1;
                    batch.errors.push(BatchTransactionError {
                        index,
                        request,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            total = batch.total_count(),
            ok = batch.success_count,
            failed = batch.error_count,
            "Batch create finished"
        );
        batch
    }

    /// Delete every SYNCED relation of a transaction, keeping the PRIMARY;
    /// used when a transaction is deleted or about to be re-synced
    pub async fn remove_synced_relations(&self, transaction_id: &str) -> Result<u64> {
        if transaction_id.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "transaction id cannot be empty".into(),
            ));
        }

        let relations = self.relations.relations_for_transaction(transaction_id).await?;
        let mut removed = 0u64;
        for relation in relations.iter().filter(|r| r.relation_type.is_synced()) {
            self.relations.delete_relation(&relation.id).await?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Rebuild a transaction's synced relations after an edit: drop the old
    /// ones and fan out again from the source ledger
    pub async fn resync_transaction(
        &self,
        transaction_id: &str,
        source_ledger_id: &str,
    ) -> Result<Vec<TransactionLedgerRelation>> {
        if transaction_id.trim().is_empty() || source_ledger_id.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "transaction id and source ledger id cannot be empty".into(),
            ));
        }

        self.remove_synced_relations(transaction_id).await?;
        let (relations, errors) = self.fan_out(transaction_id, source_ledger_id).await;
        if !errors.is_empty() {
            warn!(
                transaction_id = %transaction_id,
                failed = errors.len(),
                "Resync completed with failures"
            );
        }
        Ok(relations)
    }

    /// Backfill every PRIMARY transaction of the source ledger into the
    /// target; requires an active link between the two. Transactions already
    /// present in the target are skipped. Returns the number synced.
    pub async fn batch_sync_ledger_transactions(
        &self,
        source_ledger_id: &str,
        target_ledger_id: &str,
    ) -> Result<u64> {
        if source_ledger_id.trim().is_empty() || target_ledger_id.trim().is_empty() {
            return Err(Error::InvalidRequest("ledger id cannot be empty".into()));
        }

        let link = self
            .links
            .link_between(source_ledger_id, target_ledger_id)
            .await?
            .ok_or_else(|| {
                Error::LinkNotFound(format!(
                    "between {} and {}",
                    source_ledger_id, target_ledger_id
                ))
            })?;

        let relation_type = if link.is_child(source_ledger_id) {
            RelationType::SyncedFromChild
        } else {
            RelationType::SyncedFromParent
        };

        let primaries = self
            .relations
            .relations_for_ledger_by_type(source_ledger_id, RelationType::Primary)
            .await?;

        let mut synced = 0u64;
        for primary in &primaries {
            let exists = self
                .relations
                .relation_for_transaction_in_ledger(&primary.transaction_id, target_ledger_id)
                .await?
                .is_some();
            if exists {
                continue;
            }

            let relation = sync_relation(
                &primary.transaction_id,
                target_ledger_id,
                source_ledger_id,
                relation_type,
            );
            self.relations.insert_relation(&relation).await?;
            synced += 1;
        }

        info!(
            source = %source_ledger_id,
            target = %target_ledger_id,
            synced,
            "Ledger backfill complete"
        );
        Ok(synced)
    }

    /// Link-graph fan-out: one SYNCED relation per eligible link. Failures
    /// are collected, not propagated; a partially failed fan-out never undoes
    /// the relations that did land.
    async fn fan_out(
        &self,
        transaction_id: &str,
        source_ledger_id: &str,
    ) -> (Vec<TransactionLedgerRelation>, Vec<String>) {
        let links = match self.links.links_for_ledger(source_ledger_id).await {
            Ok(links) => links,
            Err(e) => {
                warn!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "Link lookup failed during fan-out"
                );
                return (Vec::new(), vec![format!("link lookup failed: {}", e)]);
            }
        };

        let mut synced = Vec::new();
        let mut errors = Vec::new();

        for link in links
            .iter()
            .filter(|l| l.is_active && l.auto_sync_enabled && l.allows_sync_from(source_ledger_id))
        {
            // other_ledger_id is always Some here: the link came from a
            // query scoped to source_ledger_id
            let Some(target) = link.other_ledger_id(source_ledger_id) else {
                continue;
            };
            let relation_type = if link.is_parent(source_ledger_id) {
                RelationType::SyncedFromParent
            } else {
                RelationType::SyncedFromChild
            };

            let relation = sync_relation(transaction_id, target, source_ledger_id, relation_type);
            match self.relations.insert_relation(&relation).await {
                Ok(()) => synced.push(relation),
                Err(e) => {
                    warn!(
                        transaction_id = %transaction_id,
                        target = %target,
                        error = %e,
                        "Fan-out relation insert failed"
                    );
                    errors.push(format!("sync to ledger {} failed: {}", target, e));
                }
            }
        }

        (synced, errors)
    }
}

/// Build a SYNCED relation named from the target's perspective
fn sync_relation(
    transaction_id: &str,
    target_ledger_id: &str,
    source_ledger_id: &str,
    relation_type: RelationType,
) -> TransactionLedgerRelation {
    TransactionLedgerRelation {
        id: Uuid::new_v4().to_string(),
        transaction_id: transaction_id.to_string(),
        ledger_id: target_ledger_id.to_string(),
        relation_type,
        sync_source_ledger_id: Some(source_ledger_id.to_string()),
        created_at: Utc::now(),
    }
}
