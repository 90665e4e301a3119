//! Notification dedup gate
//!
//! Decides whether an inbound notification event should flow into automatic
//! transaction creation. The pipeline short-circuits at the first matching
//! stage; `Skip` is the common outcome and carries a human-readable reason.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::event_key::{self, DEFAULT_WINDOW_SEC};
use crate::models::{
    AutoLedgerMode, DedupRecord, DedupStats, PaymentNotification, ProcessDecision,
    RawNotificationEvent,
};
use crate::store::{ConfigStore, DedupStore};

/// Shopping/retail applications whose notifications are order updates,
/// not payments
const ECOMMERCE_PACKAGE_BLACKLIST: &[&str] = &[
    "com.taobao.taobao",
    "com.tmall.wireless",
    "com.jingdong.app.mall",
    "com.suning.mobile.ebuy",
    "com.xunmeng.pinduoduo",
    "com.amazon.mShop.android.shopping",
    "com.dangdang.buy2",
];

/// Order/purchase/shipping vocabulary that marks an event as an e-commerce
/// order notification
const ECOMMERCE_ORDER_KEYWORDS: &[&str] = &[
    "订单",
    "下单",
    "已下单",
    "商品",
    "订单确认",
    "购物",
    "发货",
    "物流",
    "包裹",
    "配送",
    "签收",
    "order confirmed",
    "order placed",
    "shipped",
    "out for delivery",
    "delivered",
    "your package",
];

/// Events at or above this count inside one burst window are anomalous
const DEFAULT_BURST_THRESHOLD: u64 = 3;

/// Default retention horizon for [`DedupGate::cleanup_expired_records`]
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

pub struct DedupGate {
    dedup: Arc<dyn DedupStore>,
    configs: Arc<dyn ConfigStore>,
    burst_threshold: u64,
    default_window_sec: u32,
}

impl DedupGate {
    pub fn new(dedup: Arc<dyn DedupStore>, configs: Arc<dyn ConfigStore>) -> Self {
        Self {
            dedup,
            configs,
            burst_threshold: DEFAULT_BURST_THRESHOLD,
            default_window_sec: DEFAULT_WINDOW_SEC,
        }
    }

    pub fn with_burst_threshold(mut self, threshold: u64) -> Self {
        self.burst_threshold = threshold.max(1);
        self
    }

    pub fn with_default_window(mut self, window_sec: u32) -> Self {
        self.default_window_sec = event_key::clamp_window_sec(window_sec);
        self
    }

    /// Run the decision pipeline for one inbound event
    ///
    /// Stage order: source blacklist, keyword blacklist, group-summary
    /// filter, fingerprint, exact duplicate, per-app config, burst window.
    /// Store faults during the later stages become `ProcessDecision::Error`,
    /// never a panic or a propagated error.
    pub async fn should_process(&self, event: &RawNotificationEvent) -> ProcessDecision {
        if ECOMMERCE_PACKAGE_BLACKLIST.contains(&event.package_name.as_str()) {
            debug!(package = %event.package_name, "Skipping blacklisted source application");
            return ProcessDecision::Skip(
                "non-payment application, ignoring order notification".into(),
            );
        }

        let content = event.content().to_lowercase();
        if ECOMMERCE_ORDER_KEYWORDS.iter().any(|k| content.contains(k)) {
            debug!(package = %event.package_name, "Skipping event with order keywords");
            return ProcessDecision::Skip("contains e-commerce order keywords".into());
        }

        if event.is_group_summary {
            return ProcessDecision::Skip("group summary notification, ignoring".into());
        }

        match self.evaluate_stores(event).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(package = %event.package_name, error = %e, "Dedup pipeline store fault");
                ProcessDecision::Error(format!("dedup check exception: {}", e))
            }
        }
    }

    /// Stages that touch the store; any error here is converted by the
    /// caller into `ProcessDecision::Error`
    async fn evaluate_stores(&self, event: &RawNotificationEvent) -> Result<ProcessDecision> {
        let config = self.configs.config_for_package(&event.package_name).await?;

        let window_sec = config
            .as_ref()
            .and_then(|c| c.amount_window_sec)
            .map(event_key::clamp_window_sec)
            .unwrap_or(self.default_window_sec);

        let key = event_key::for_raw_event(event, window_sec);
        if self.dedup.event_key_exists(&key).await? {
            debug!(package = %event.package_name, "Exact duplicate event");
            return Ok(ProcessDecision::Skip("event already processed, dedup hit".into()));
        }

        if let Some(config) = &config {
            if config.mode == AutoLedgerMode::Disabled {
                return Ok(ProcessDecision::Skip(
                    "application has disabled auto-ledger".into(),
                ));
            }
            let content = event.content().to_lowercase();
            if config
                .blacklist
                .iter()
                .any(|k| !k.is_empty() && content.contains(&k.to_lowercase()))
            {
                return Ok(ProcessDecision::Skip(
                    "matched application custom blacklist".into(),
                ));
            }
        }

        let window_ms = i64::from(window_sec) * 1000;
        let count = self
            .dedup
            .count_in_window(
                &event.package_name,
                event.post_time - window_ms,
                event.post_time + window_ms,
            )
            .await?;
        if count >= self.burst_threshold {
            warn!(
                package = %event.package_name,
                count,
                window_sec,
                "Burst of events in dedup window"
            );
            return Ok(ProcessDecision::Skip(
                "too many events in time window, possibly anomalous".into(),
            ));
        }

        Ok(ProcessDecision::Process(key))
    }

    /// Record an accepted notification against its event key
    ///
    /// Returns false when the key was already recorded, which a caller that
    /// lost the race must treat as an already-processed duplicate.
    pub async fn record_processed(
        &self,
        notification: &PaymentNotification,
        event_key: &str,
    ) -> Result<bool> {
        let record = DedupRecord {
            event_key: event_key.to_string(),
            package_name: notification.source_app.clone(),
            amount_cents: notification.amount_cents,
            post_time: notification.posted_time,
            created_at: Utc::now(),
        };
        let inserted = self.dedup.insert_record(&record).await?;
        if !inserted {
            debug!(package = %notification.source_app, "Lost dedup insert race");
        }
        Ok(inserted)
    }

    /// Delete records older than `days_to_keep` days; returns the count
    pub async fn cleanup_expired_records(&self, days_to_keep: u32) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_to_keep));
        let deleted = self.dedup.cleanup_older_than(cutoff).await?;
        if deleted > 0 {
            info!(deleted, days_to_keep, "Cleaned up expired dedup records");
        }
        Ok(deleted)
    }

    pub async fn statistics(&self) -> Result<DedupStats> {
        self.dedup.stats().await
    }

    /// Drop every dedup record; returns the count
    pub async fn clear_all(&self) -> Result<u64> {
        self.dedup.clear_all().await
    }
}
