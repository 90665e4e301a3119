//! Deterministic event fingerprints
//!
//! Every function here is pure: identical input produces identical output
//! across process restarts, which is what makes the dedup store's
//! key-uniqueness guarantee meaningful.
//!
//! Raw-event keys hash the source package, the normalized notification text,
//! and a post-time bucket, so the same notification redelivered within the
//! window collapses onto one key. Payment-notification keys do the same over
//! the parsed facts (direction, amount, merchant).

use sha2::{Digest, Sha256};

use crate::models::{PaymentNotification, RawNotificationEvent};

/// Default dedup/burst window when no per-app config overrides it
pub const DEFAULT_WINDOW_SEC: u32 = 20;

const MIN_WINDOW_SEC: u32 = 1;
const MAX_WINDOW_SEC: u32 = 600;

/// Clamp a configured window into the supported range
pub fn clamp_window_sec(window_sec: u32) -> u32 {
    window_sec.clamp(MIN_WINDOW_SEC, MAX_WINDOW_SEC)
}

/// Lowercase, trim, and collapse runs of whitespace
fn normalize_text(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bucket an epoch-millisecond post time by the window size, so two events
/// within roughly one window of each other share a bucket
fn time_bucket(post_time_ms: i64, window_sec: u32) -> i64 {
    let window_ms = i64::from(clamp_window_sec(window_sec)) * 1000;
    post_time_ms.div_euclid(window_ms)
}

fn finish(hasher: Sha256, prefix: &str) -> String {
    format!("{}:{}", prefix, hex::encode(hasher.finalize()))
}

/// Fingerprint for a raw notification event
pub fn for_raw_event(event: &RawNotificationEvent, window_sec: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event.package_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalize_text(&event.content()).as_bytes());
    hasher.update([0u8]);
    hasher.update(time_bucket(event.post_time, window_sec).to_be_bytes());
    finish(hasher, "raw")
}

/// Fingerprint for parsed payment facts
pub fn for_payment_notification(notification: &PaymentNotification, window_sec: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(notification.source_app.as_bytes());
    hasher.update([0u8]);
    hasher.update(notification.direction.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(notification.amount_cents.to_be_bytes());
    hasher.update(merchant_hash(&notification.normalized_merchant).as_bytes());
    hasher.update(time_bucket(notification.posted_time, window_sec).to_be_bytes());
    finish(hasher, "pay")
}

/// Stable hash of a notification text body
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    hex::encode(hasher.finalize())
}

/// Stable hash of a normalized merchant name
pub fn merchant_hash(merchant: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(merchant).as_bytes());
    hex::encode(hasher.finalize())
}
