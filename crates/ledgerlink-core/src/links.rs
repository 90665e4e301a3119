//! Ledger link registry
//!
//! Manages directed/bidirectional links between pairs of ledgers and their
//! propagation mode. Links only record configuration; they never touch
//! transactions or relations themselves (deleting a link leaves historical
//! relations in place).

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Ledger, LedgerLink, SyncMode};
use crate::store::{LedgerStore, LinkStore};

pub struct LinkRegistry {
    links: Arc<dyn LinkStore>,
    ledgers: Arc<dyn LedgerStore>,
}

impl LinkRegistry {
    pub fn new(links: Arc<dyn LinkStore>, ledgers: Arc<dyn LedgerStore>) -> Self {
        Self { links, ledgers }
    }

    /// Create a link between two ledgers
    ///
    /// Validation order: non-empty ids, distinct ids, both ledgers exist,
    /// both active, same owner, no existing active link for the pair.
    /// The link is not re-validated after creation.
    pub async fn create_link(
        &self,
        parent_ledger_id: &str,
        child_ledger_id: &str,
        sync_mode: SyncMode,
        auto_sync_enabled: bool,
    ) -> Result<LedgerLink> {
        if parent_ledger_id.trim().is_empty() || child_ledger_id.trim().is_empty() {
            return Err(Error::InvalidRequest("ledger id cannot be empty".into()));
        }
        if parent_ledger_id == child_ledger_id {
            return Err(Error::SelfLink);
        }

        let parent = self.require_ledger(parent_ledger_id, "parent").await?;
        let child = self.require_ledger(child_ledger_id, "child").await?;

        if !parent.is_active {
            return Err(Error::LedgerNotActive(format!(
                "parent ledger {}",
                parent_ledger_id
            )));
        }
        if !child.is_active {
            return Err(Error::LedgerNotActive(format!(
                "child ledger {}",
                child_ledger_id
            )));
        }
        if parent.user_id != child.user_id {
            return Err(Error::CrossOwnerLink(
                parent_ledger_id.to_string(),
                child_ledger_id.to_string(),
            ));
        }

        if self
            .links
            .link_between(parent_ledger_id, child_ledger_id)
            .await?
            .is_some()
        {
            return Err(Error::LinkAlreadyExists(
                parent_ledger_id.to_string(),
                child_ledger_id.to_string(),
            ));
        }

        let now = Utc::now();
        let link = LedgerLink {
            id: Uuid::new_v4().to_string(),
            parent_ledger_id: parent_ledger_id.to_string(),
            child_ledger_id: child_ledger_id.to_string(),
            sync_mode,
            auto_sync_enabled,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.links.insert_link(&link).await?;

        info!(
            link_id = %link.id,
            parent = %parent_ledger_id,
            child = %child_ledger_id,
            mode = %sync_mode,
            "Created ledger link"
        );
        Ok(link)
    }

    /// Change the propagation mode of an existing link; idempotent
    pub async fn update_sync_mode(&self, link_id: &str, sync_mode: SyncMode) -> Result<()> {
        self.require_link(link_id).await?;
        self.links.update_sync_mode(link_id, sync_mode).await?;
        debug!(link_id = %link_id, mode = %sync_mode, "Updated link sync mode");
        Ok(())
    }

    /// Enable or disable automatic fan-out on an existing link; idempotent
    pub async fn set_auto_sync_enabled(&self, link_id: &str, enabled: bool) -> Result<()> {
        self.require_link(link_id).await?;
        self.links.set_auto_sync_enabled(link_id, enabled).await?;
        debug!(link_id = %link_id, enabled, "Updated link auto-sync flag");
        Ok(())
    }

    /// Delete the link row only; historical relations stay in place
    pub async fn delete_link(&self, link_id: &str) -> Result<()> {
        self.require_link(link_id).await?;
        self.links.delete_link(link_id).await?;
        info!(link_id = %link_id, "Deleted ledger link");
        Ok(())
    }

    /// Remove every link where the ledger is parent or child
    pub async fn delete_all_links_for_ledger(&self, ledger_id: &str) -> Result<u64> {
        if ledger_id.trim().is_empty() {
            return Err(Error::InvalidRequest("ledger id cannot be empty".into()));
        }
        self.require_ledger(ledger_id, "target").await?;

        let deleted = self.links.delete_links_for_ledger(ledger_id).await?;
        info!(ledger_id = %ledger_id, deleted, "Deleted all links for ledger");
        Ok(deleted)
    }

    /// The active link between an unordered pair of ledgers, if any
    pub async fn get_link_between_ledgers(
        &self,
        ledger_a: &str,
        ledger_b: &str,
    ) -> Result<Option<LedgerLink>> {
        if ledger_a.trim().is_empty() || ledger_b.trim().is_empty() {
            return Err(Error::InvalidRequest("ledger id cannot be empty".into()));
        }
        self.links.link_between(ledger_a, ledger_b).await
    }

    pub async fn has_active_link_between(&self, ledger_a: &str, ledger_b: &str) -> Result<bool> {
        Ok(self
            .get_link_between_ledgers(ledger_a, ledger_b)
            .await?
            .is_some())
    }

    /// All links touching the ledger, as parent or child
    pub async fn get_links_for_ledger(&self, ledger_id: &str) -> Result<Vec<LedgerLink>> {
        self.links.links_for_ledger(ledger_id).await
    }

    /// Links where the ledger is the parent
    pub async fn get_child_links(&self, ledger_id: &str) -> Result<Vec<LedgerLink>> {
        self.links.child_links(ledger_id).await
    }

    /// All active links with automatic fan-out enabled
    pub async fn get_auto_sync_links(&self) -> Result<Vec<LedgerLink>> {
        let links = self.links.active_links().await?;
        Ok(links.into_iter().filter(|l| l.auto_sync_enabled).collect())
    }

    /// Active auto-sync links whose mode permits propagation away from the
    /// given ledger; this is the sync engine's fan-out set
    pub async fn get_outgoing_sync_links(&self, ledger_id: &str) -> Result<Vec<LedgerLink>> {
        let links = self.links.links_for_ledger(ledger_id).await?;
        Ok(links
            .into_iter()
            .filter(|l| l.is_active && l.auto_sync_enabled && l.allows_sync_from(ledger_id))
            .collect())
    }

    /// The three modes in presentation order
    pub fn recommended_sync_modes() -> [SyncMode; 3] {
        [
            SyncMode::Bidirectional,
            SyncMode::ParentToChild,
            SyncMode::ChildToParent,
        ]
    }

    /// Stable display string for a mode
    pub fn sync_mode_description(sync_mode: SyncMode) -> &'static str {
        sync_mode.description()
    }

    async fn require_ledger(&self, ledger_id: &str, role: &str) -> Result<Ledger> {
        self.ledgers
            .get_ledger(ledger_id)
            .await?
            .ok_or_else(|| Error::LedgerNotFound(format!("{} ledger {}", role, ledger_id)))
    }

    async fn require_link(&self, link_id: &str) -> Result<LedgerLink> {
        if link_id.trim().is_empty() {
            return Err(Error::InvalidRequest("link id cannot be empty".into()));
        }
        self.links
            .get_link(link_id)
            .await?
            .ok_or_else(|| Error::LinkNotFound(link_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::test_support::{registry_for, seed_ledger};

    #[tokio::test]
    async fn test_create_link_happy_path() {
        let db = Database::in_memory().unwrap();
        seed_ledger(&db, "main", "user1", true);
        seed_ledger(&db, "work", "user1", true);
        let registry = registry_for(&db);

        let link = registry
            .create_link("main", "work", SyncMode::Bidirectional, true)
            .await
            .unwrap();

        assert_eq!(link.parent_ledger_id, "main");
        assert_eq!(link.child_ledger_id, "work");
        assert!(link.is_active);
        assert!(registry.has_active_link_between("work", "main").await.unwrap());
    }

    #[tokio::test]
    async fn test_self_link_rejected() {
        let db = Database::in_memory().unwrap();
        seed_ledger(&db, "main", "user1", true);
        let registry = registry_for(&db);

        let err = registry
            .create_link("main", "main", SyncMode::Bidirectional, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SelfLink));
    }

    #[tokio::test]
    async fn test_missing_ledgers_distinguished() {
        let db = Database::in_memory().unwrap();
        seed_ledger(&db, "main", "user1", true);
        let registry = registry_for(&db);

        let err = registry
            .create_link("ghost", "main", SyncMode::Bidirectional, true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("parent ledger ghost"), "{err}");

        let err = registry
            .create_link("main", "ghost", SyncMode::Bidirectional, true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("child ledger ghost"), "{err}");
    }

    #[tokio::test]
    async fn test_inactive_and_cross_owner_rejected() {
        let db = Database::in_memory().unwrap();
        seed_ledger(&db, "main", "user1", true);
        seed_ledger(&db, "dormant", "user1", false);
        seed_ledger(&db, "other", "user2", true);
        let registry = registry_for(&db);

        let err = registry
            .create_link("main", "dormant", SyncMode::Bidirectional, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LedgerNotActive(_)));

        let err = registry
            .create_link("main", "other", SyncMode::Bidirectional, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CrossOwnerLink(_, _)));
    }

    #[tokio::test]
    async fn test_duplicate_active_link_rejected_both_orders() {
        let db = Database::in_memory().unwrap();
        seed_ledger(&db, "main", "user1", true);
        seed_ledger(&db, "work", "user1", true);
        let registry = registry_for(&db);

        registry
            .create_link("main", "work", SyncMode::Bidirectional, true)
            .await
            .unwrap();

        // Same unordered pair in either direction hits the existing link
        let err = registry
            .create_link("main", "work", SyncMode::ParentToChild, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LinkAlreadyExists(_, _)));

        let err = registry
            .create_link("work", "main", SyncMode::ParentToChild, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LinkAlreadyExists(_, _)));
    }

    #[tokio::test]
    async fn test_update_and_delete_require_existing_link() {
        let db = Database::in_memory().unwrap();
        seed_ledger(&db, "main", "user1", true);
        seed_ledger(&db, "work", "user1", true);
        let registry = registry_for(&db);

        let err = registry
            .update_sync_mode("nope", SyncMode::ParentToChild)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LinkNotFound(_)));

        let link = registry
            .create_link("main", "work", SyncMode::Bidirectional, true)
            .await
            .unwrap();

        registry
            .update_sync_mode(&link.id, SyncMode::ParentToChild)
            .await
            .unwrap();
        registry.set_auto_sync_enabled(&link.id, false).await.unwrap();

        let stored = registry
            .get_link_between_ledgers("main", "work")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.sync_mode, SyncMode::ParentToChild);
        assert!(!stored.auto_sync_enabled);

        registry.delete_link(&link.id).await.unwrap();
        assert!(!registry.has_active_link_between("main", "work").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_all_links_for_ledger() {
        let db = Database::in_memory().unwrap();
        seed_ledger(&db, "main", "user1", true);
        seed_ledger(&db, "work", "user1", true);
        seed_ledger(&db, "travel", "user1", true);
        let registry = registry_for(&db);

        registry
            .create_link("main", "work", SyncMode::Bidirectional, true)
            .await
            .unwrap();
        registry
            .create_link("travel", "main", SyncMode::ParentToChild, true)
            .await
            .unwrap();

        let deleted = registry.delete_all_links_for_ledger("main").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(registry.get_links_for_ledger("main").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outgoing_sync_links_respect_direction() {
        let db = Database::in_memory().unwrap();
        seed_ledger(&db, "main", "user1", true);
        seed_ledger(&db, "work", "user1", true);
        let registry = registry_for(&db);

        // main is parent, mode parent-to-child: only main has outgoing links
        registry
            .create_link("main", "work", SyncMode::ParentToChild, true)
            .await
            .unwrap();

        assert_eq!(registry.get_outgoing_sync_links("main").await.unwrap().len(), 1);
        assert!(registry.get_outgoing_sync_links("work").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_child_links_only_lists_parent_side() {
        let db = Database::in_memory().unwrap();
        seed_ledger(&db, "main", "user1", true);
        seed_ledger(&db, "work", "user1", true);
        let registry = registry_for(&db);

        registry
            .create_link("main", "work", SyncMode::Bidirectional, true)
            .await
            .unwrap();

        assert_eq!(registry.get_child_links("main").await.unwrap().len(), 1);
        assert!(registry.get_child_links("work").await.unwrap().is_empty());
    }

    #[test]
    fn test_recommended_modes_order() {
        assert_eq!(
            LinkRegistry::recommended_sync_modes(),
            [
                SyncMode::Bidirectional,
                SyncMode::ParentToChild,
                SyncMode::ChildToParent,
            ]
        );
        for mode in LinkRegistry::recommended_sync_modes() {
            assert!(!LinkRegistry::sync_mode_description(mode).is_empty());
        }
    }
}
