//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ConfigStore, DedupStore, LinkStore, RelationStore};
    use crate::test_support::seed_ledger;
    use chrono::{Duration, Utc};
    use rusqlite::params;

    fn relation(
        id: &str,
        transaction_id: &str,
        ledger_id: &str,
        relation_type: RelationType,
    ) -> TransactionLedgerRelation {
        TransactionLedgerRelation {
            id: id.to_string(),
            transaction_id: transaction_id.to_string(),
            ledger_id: ledger_id.to_string(),
            relation_type,
            sync_source_ledger_id: None,
            created_at: Utc::now(),
        }
    }

    fn link(id: &str, parent: &str, child: &str) -> LedgerLink {
        let now = Utc::now();
        LedgerLink {
            id: id.to_string(),
            parent_ledger_id: parent.to_string(),
            child_ledger_id: child.to_string(),
            sync_mode: SyncMode::Bidirectional,
            auto_sync_enabled: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        let ledgers = db.list_ledgers_for_user("nobody").unwrap();
        assert!(ledgers.is_empty());
    }

    #[test]
    fn test_schema_tables_exist() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        for table in [
            "ledgers",
            "transactions",
            "transaction_ledger_relations",
            "ledger_links",
            "app_auto_ledger_configs",
            "dedup_records",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn test_ledger_upsert_and_active_flag() {
        let db = Database::in_memory().unwrap();
        seed_ledger(&db, "main", "user1", true);

        let ledger = db.get_ledger_row("main").unwrap().unwrap();
        assert_eq!(ledger.user_id, "user1");
        assert!(ledger.is_active);

        db.set_ledger_active("main", false).unwrap();
        let ledger = db.get_ledger_row("main").unwrap().unwrap();
        assert!(!ledger.is_active);

        assert!(db.get_ledger_row("ghost").unwrap().is_none());
        assert_eq!(db.list_ledgers_for_user("user1").unwrap().len(), 1);
    }

    #[test]
    fn test_transaction_round_trip() {
        let db = Database::in_memory().unwrap();
        seed_ledger(&db, "main", "user1", true);

        let now = Utc::now();
        let tx = Transaction {
            id: "tx1".into(),
            ledger_id: "main".into(),
            account_id: "acc1".into(),
            category_id: "cat1".into(),
            amount_cents: -2850,
            note: Some("coffee".into()),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(db.insert_transaction(&tx).unwrap(), "tx1");

        let loaded = db.get_transaction_row("tx1").unwrap().unwrap();
        assert_eq!(loaded.amount_cents, -2850);
        assert_eq!(loaded.note.as_deref(), Some("coffee"));

        let by_ledger = db.transactions_by_ledger_rows("main").unwrap();
        assert_eq!(by_ledger.len(), 1);
        assert!(db.transactions_by_ledger_rows("other").unwrap().is_empty());
    }

    #[test]
    fn test_relation_pair_uniqueness() {
        let db = Database::in_memory().unwrap();

        db.insert_relation_row(&relation("r1", "tx1", "main", RelationType::Primary))
            .unwrap();

        // Same (transaction, ledger) pair under a different row id
        let err = db
            .insert_relation_row(&relation("r2", "tx1", "main", RelationType::SyncedFromParent))
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::AlreadyInLedger(_)));

        // Same transaction, different ledger is fine
        db.insert_relation_row(&relation("r3", "tx1", "work", RelationType::SyncedFromParent))
            .unwrap();
        assert_eq!(db.relations_for_transaction_rows("tx1").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_relation_queries_by_ledger_and_type() {
        let db = Database::in_memory().unwrap();

        db.insert_relation_row(&relation("r1", "tx1", "main", RelationType::Primary))
            .unwrap();
        db.insert_relation_row(&relation("r2", "tx2", "main", RelationType::SyncedFromParent))
            .unwrap();

        let all = db.relations_for_ledger("main").await.unwrap();
        assert_eq!(all.len(), 2);

        let primaries = db
            .relations_for_ledger_by_type("main", RelationType::Primary)
            .await
            .unwrap();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].transaction_id, "tx1");

        let found = db
            .relation_for_transaction_in_ledger("tx2", "main")
            .await
            .unwrap();
        assert_eq!(found.unwrap().relation_type, RelationType::SyncedFromParent);

        db.delete_relation("r2").await.unwrap();
        assert_eq!(db.relations_for_ledger("main").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_link_pair_query_is_unordered() {
        let db = Database::in_memory().unwrap();
        db.insert_link(&link("l1", "main", "work")).await.unwrap();

        assert!(db.link_between("main", "work").await.unwrap().is_some());
        assert!(db.link_between("work", "main").await.unwrap().is_some());
        assert!(db.link_between("main", "other").await.unwrap().is_none());

        // Inactive links are invisible to the pair query
        let conn = db.conn().unwrap();
        conn.execute("UPDATE ledger_links SET is_active = 0 WHERE id = 'l1'", [])
            .unwrap();
        assert!(db.link_between("main", "work").await.unwrap().is_none());
        // but still visible to links_for_ledger
        assert_eq!(db.links_for_ledger("main").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_link_updates_and_deletes() {
        let db = Database::in_memory().unwrap();
        db.insert_link(&link("l1", "main", "work")).await.unwrap();
        db.insert_link(&link("l2", "main", "travel")).await.unwrap();

        db.update_sync_mode("l1", SyncMode::ParentToChild).await.unwrap();
        db.set_auto_sync_enabled("l1", false).await.unwrap();
        let loaded = db.get_link("l1").await.unwrap().unwrap();
        assert_eq!(loaded.sync_mode, SyncMode::ParentToChild);
        assert!(!loaded.auto_sync_enabled);

        assert_eq!(db.child_links("main").await.unwrap().len(), 2);
        assert_eq!(db.active_links().await.unwrap().len(), 2);

        db.delete_link("l2").await.unwrap();
        assert!(db.get_link("l2").await.unwrap().is_none());

        assert_eq!(db.delete_links_for_ledger("main").await.unwrap(), 1);
        assert!(db.links_for_ledger("main").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_config_upsert_and_keyword_json() {
        let db = Database::in_memory().unwrap();

        assert!(db.config_for_package("pay.app").await.unwrap().is_none());

        let mut config = AppAutoLedgerConfig::default_for("pay.app");
        config.blacklist = vec!["refund".into(), "cancelled".into()];
        config.amount_window_sec = Some(60);
        db.upsert_config(&config).await.unwrap();

        let loaded = db.config_for_package("pay.app").await.unwrap().unwrap();
        assert_eq!(loaded.blacklist, vec!["refund", "cancelled"]);
        assert_eq!(loaded.amount_window_sec, Some(60));
        assert_eq!(loaded.mode, AutoLedgerMode::Enabled);

        // Second upsert replaces, not duplicates
        config.mode = AutoLedgerMode::Disabled;
        db.upsert_config(&config).await.unwrap();
        let loaded = db.config_for_package("pay.app").await.unwrap().unwrap();
        assert_eq!(loaded.mode, AutoLedgerMode::Disabled);
    }

    #[tokio::test]
    async fn test_config_malformed_keyword_json_reads_empty() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        conn.execute(
            r#"
            INSERT INTO app_auto_ledger_configs
                (package_name, mode, blacklist, whitelist, confidence_threshold, created_at, updated_at)
            VALUES ('pay.app', 1, 'not json', NULL, 0.6, ?, ?)
            "#,
            params![Utc::now().to_rfc3339(), Utc::now().to_rfc3339()],
        )
        .unwrap();
        drop(conn);

        let loaded = db.config_for_package("pay.app").await.unwrap().unwrap();
        assert!(loaded.blacklist.is_empty());
        assert!(loaded.whitelist.is_empty());
    }

    #[tokio::test]
    async fn test_dedup_insert_is_first_writer_wins() {
        let db = Database::in_memory().unwrap();

        let record = DedupRecord {
            event_key: "raw:abc".into(),
            package_name: "pay.app".into(),
            amount_cents: 2850,
            post_time: 1_700_000_000_000,
            created_at: Utc::now(),
        };
        assert!(db.insert_record(&record).await.unwrap());

        // Second insert with the same key loses quietly
        let mut loser = record.clone();
        loser.amount_cents = 9999;
        assert!(!db.insert_record(&loser).await.unwrap());

        // The first writer's row survived
        let stored = db.get_dedup_record("raw:abc").unwrap().unwrap();
        assert_eq!(stored.amount_cents, 2850);
        assert!(db.event_key_exists("raw:abc").await.unwrap());
        assert!(!db.event_key_exists("raw:other").await.unwrap());
    }

    #[tokio::test]
    async fn test_dedup_window_count_is_inclusive() {
        let db = Database::in_memory().unwrap();

        for (i, t) in [1000i64, 2000, 3000].iter().enumerate() {
            db.insert_record(&DedupRecord {
                event_key: format!("raw:k{}", i),
                package_name: "pay.app".into(),
                amount_cents: 100,
                post_time: *t,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }

        assert_eq!(db.count_in_window("pay.app", 1000, 3000).await.unwrap(), 3);
        assert_eq!(db.count_in_window("pay.app", 1001, 2999).await.unwrap(), 1);
        assert_eq!(db.count_in_window("other.app", 0, 10_000).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dedup_cleanup_by_age() {
        let db = Database::in_memory().unwrap();

        let old = DedupRecord {
            event_key: "raw:old".into(),
            package_name: "pay.app".into(),
            amount_cents: 100,
            post_time: 0,
            created_at: Utc::now() - Duration::days(40),
        };
        let fresh = DedupRecord {
            event_key: "raw:fresh".into(),
            package_name: "pay.app".into(),
            amount_cents: 100,
            post_time: 0,
            created_at: Utc::now(),
        };
        db.insert_record(&old).await.unwrap();
        db.insert_record(&fresh).await.unwrap();

        let deleted = db
            .cleanup_older_than(Utc::now() - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(!db.event_key_exists("raw:old").await.unwrap());
        assert!(db.event_key_exists("raw:fresh").await.unwrap());
    }
}
