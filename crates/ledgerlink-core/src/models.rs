//! Domain models for Ledgerlink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ledger: a logical partition of transactions (e.g. "personal", "work")
///
/// Owned by a single user account. Immutable except for the status flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Direction(s) a ledger link propagates transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Bidirectional,
    ParentToChild,
    ChildToParent,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bidirectional => "bidirectional",
            Self::ParentToChild => "parent_to_child",
            Self::ChildToParent => "child_to_parent",
        }
    }

    /// Stable human-readable description, used by callers for display only
    pub fn description(&self) -> &'static str {
        match self {
            Self::Bidirectional => {
                "Transactions sync in both directions between the two ledgers"
            }
            Self::ParentToChild => {
                "Transactions created in the parent ledger are copied to the child"
            }
            Self::ChildToParent => {
                "Transactions created in the child ledger are copied to the parent"
            }
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bidirectional" => Ok(Self::Bidirectional),
            "parent_to_child" => Ok(Self::ParentToChild),
            "child_to_parent" => Ok(Self::ChildToParent),
            _ => Err(format!("Unknown sync mode: {}", s)),
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A configured propagation relationship between two ledgers
///
/// At most one active link may exist between any unordered pair of ledgers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerLink {
    pub id: String,
    pub parent_ledger_id: String,
    pub child_ledger_id: String,
    pub sync_mode: SyncMode,
    pub auto_sync_enabled: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerLink {
    pub fn involves(&self, ledger_id: &str) -> bool {
        self.parent_ledger_id == ledger_id || self.child_ledger_id == ledger_id
    }

    pub fn is_parent(&self, ledger_id: &str) -> bool {
        self.parent_ledger_id == ledger_id
    }

    pub fn is_child(&self, ledger_id: &str) -> bool {
        self.child_ledger_id == ledger_id
    }

    /// The ledger on the other end of the link, if `ledger_id` is an endpoint
    pub fn other_ledger_id(&self, ledger_id: &str) -> Option<&str> {
        if self.parent_ledger_id == ledger_id {
            Some(&self.child_ledger_id)
        } else if self.child_ledger_id == ledger_id {
            Some(&self.parent_ledger_id)
        } else {
            None
        }
    }

    /// Whether the configured mode permits propagation away from `source_ledger_id`
    pub fn allows_sync_from(&self, source_ledger_id: &str) -> bool {
        match self.sync_mode {
            SyncMode::Bidirectional => self.involves(source_ledger_id),
            SyncMode::ParentToChild => self.is_parent(source_ledger_id),
            SyncMode::ChildToParent => self.is_child(source_ledger_id),
        }
    }
}

/// Nature of a transaction's association with a ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// The ledger where the transaction was originally created
    Primary,
    /// Propagated copy reference; the source ledger was the parent end of the link
    SyncedFromParent,
    /// Propagated copy reference; the source ledger was the child end of the link
    SyncedFromChild,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::SyncedFromParent => "synced_from_parent",
            Self::SyncedFromChild => "synced_from_child",
        }
    }

    pub fn is_synced(&self) -> bool {
        !matches!(self, Self::Primary)
    }
}

impl std::str::FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "synced_from_parent" => Ok(Self::SyncedFromParent),
            "synced_from_child" => Ok(Self::SyncedFromChild),
            _ => Err(format!("Unknown relation type: {}", s)),
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction payload
///
/// `ledger_id` is the ledger it was persisted against for repository-query
/// purposes; the sync engine otherwise treats the payload as opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub ledger_id: String,
    pub account_id: String,
    pub category_id: String,
    /// Signed amount in minor currency units
    pub amount_cents: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A record associating one transaction with one ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLedgerRelation {
    pub id: String,
    pub transaction_id: String,
    pub ledger_id: String,
    pub relation_type: RelationType,
    /// The ledger that caused the propagation; None for the PRIMARY relation
    pub sync_source_ledger_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Whether auto-ledger is enabled for a source application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoLedgerMode {
    Disabled,
    Enabled,
}

impl AutoLedgerMode {
    pub fn from_i64(v: i64) -> Self {
        if v == 0 {
            Self::Disabled
        } else {
            Self::Enabled
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Disabled => 0,
            Self::Enabled => 1,
        }
    }
}

/// Per source-application auto-ledger settings
///
/// Created lazily on first configuration write; absence means default
/// (enabled, default thresholds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppAutoLedgerConfig {
    pub package_name: String,
    pub mode: AutoLedgerMode,
    /// Custom keyword blacklist; any match skips the event
    pub blacklist: Vec<String>,
    /// Custom keyword whitelist
    pub whitelist: Vec<String>,
    /// Minimum parser confidence to auto-create a transaction
    pub confidence_threshold: f64,
    /// Burst-detection window in seconds; None means the gate default
    pub amount_window_sec: Option<u32>,
    pub default_account_id: Option<String>,
    pub default_category_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppAutoLedgerConfig {
    /// Default config for a package with no stored row
    pub fn default_for(package_name: &str) -> Self {
        let now = Utc::now();
        Self {
            package_name: package_name.to_string(),
            mode: AutoLedgerMode::Enabled,
            blacklist: Vec::new(),
            whitelist: Vec::new(),
            confidence_threshold: 0.6,
            amount_window_sec: None,
            default_account_id: None,
            default_category_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One row per accepted notification event, used for exact-duplicate lookup
/// and time-window burst statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupRecord {
    pub event_key: String,
    pub package_name: String,
    pub amount_cents: i64,
    /// Notification post time, epoch milliseconds
    pub post_time: i64,
    pub created_at: DateTime<Utc>,
}

/// An inbound raw notification, as delivered by the notification source
///
/// Never persisted verbatim; only the derived event key and extracted
/// payment facts are retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNotificationEvent {
    pub package_name: String,
    pub title: Option<String>,
    pub text: Option<String>,
    pub extras: Option<serde_json::Value>,
    /// Epoch milliseconds
    pub post_time: i64,
    pub notification_key: Option<String>,
    pub is_group_summary: bool,
}

impl RawNotificationEvent {
    /// Title and text joined, for keyword matching and fingerprinting
    pub fn content(&self) -> String {
        format!(
            "{} {}",
            self.title.as_deref().unwrap_or(""),
            self.text.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

/// Income or expense, as classified by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentDirection {
    Income,
    Expense,
}

impl PaymentDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

/// Normalized payment facts derived from a raw event by the (external)
/// parsing stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub source_app: String,
    pub direction: PaymentDirection,
    pub amount_cents: i64,
    pub raw_merchant: String,
    pub normalized_merchant: String,
    pub payment_method: Option<String>,
    /// Parser confidence in [0, 1]
    pub confidence: f64,
    pub fingerprint: String,
    pub raw_text: String,
    /// Epoch milliseconds
    pub posted_time: i64,
}

/// Visibility mode for ledger-scoped transaction views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionFilterMode {
    /// Only transactions originally created in this ledger
    LocalOnly,
    /// All transactions associated with this ledger, synced ones included
    LocalWithSynced,
    /// Transactions known to this ledger or to any ledger linked to it
    AllRelated,
}

/// Sync provenance of a transaction relative to one ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSyncType {
    Primary,
    Synced,
    Unrelated,
}

/// A transaction annotated with sync provenance for a ledger-scoped view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionWithSyncInfo {
    pub transaction: Transaction,
    pub sync_type: TransactionSyncType,
    /// For PRIMARY items the viewing ledger itself; for SYNCED items the
    /// ledger that caused the propagation
    pub source_ledger_id: String,
    /// For PRIMARY items, every other ledger in the transaction's network
    pub target_ledger_ids: Vec<String>,
}

/// A request to create one linked transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    pub primary_ledger_id: String,
    pub account_id: String,
    pub amount_cents: i64,
    pub category_id: String,
    pub note: Option<String>,
    pub auto_sync: bool,
    /// When Some, sync only to these ledgers via the manual path and skip
    /// the link-graph fan-out entirely
    pub specific_target_ledgers: Option<Vec<String>>,
}

impl CreateTransactionRequest {
    pub fn new(
        primary_ledger_id: impl Into<String>,
        account_id: impl Into<String>,
        amount_cents: i64,
        category_id: impl Into<String>,
    ) -> Self {
        Self {
            primary_ledger_id: primary_ledger_id.into(),
            account_id: account_id.into(),
            amount_cents,
            category_id: category_id.into(),
            note: None,
            auto_sync: true,
            specific_target_ledgers: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.specific_target_ledgers = Some(targets);
        self
    }
}

/// Result of creating a linked transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLinkedTransactionResult {
    pub transaction: Transaction,
    pub primary_relation: TransactionLedgerRelation,
    pub synced_relations: Vec<TransactionLedgerRelation>,
    /// Fan-out failures; non-fatal to the already-persisted transaction
    pub sync_errors: Vec<String>,
}

impl CreateLinkedTransactionResult {
    /// Number of ledgers the transaction now exists in
    pub fn total_ledger_count(&self) -> usize {
        1 + self.synced_relations.len()
    }

    pub fn has_sync_errors(&self) -> bool {
        !self.sync_errors.is_empty()
    }

    pub fn sync_success_count(&self) -> usize {
        self.synced_relations.len()
    }
}

/// Per-item failure in a batch create
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTransactionError {
    pub index: usize,
    pub request: CreateTransactionRequest,
    pub error: String,
}

/// Aggregate result of a batch create; the batch call itself never fails
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchCreateResult {
    pub success_count: usize,
    pub error_count: usize,
    pub results: Vec<CreateLinkedTransactionResult>,
    pub errors: Vec<BatchTransactionError>,
}

impl BatchCreateResult {
    pub fn total_count(&self) -> usize {
        self.success_count + self.error_count
    }

    /// Fraction of requests that succeeded; 0 when the batch was empty
    pub fn success_rate(&self) -> f64 {
        let total = self.total_count();
        if total == 0 {
            0.0
        } else {
            self.success_count as f64 / total as f64
        }
    }

    pub fn is_all_success(&self) -> bool {
        self.error_count == 0
    }
}

/// Outcome of the dedup gate for one inbound event
///
/// `Skip` is an expected, common outcome. `Error` indicates an unexpected
/// internal fault: do not process, but investigate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessDecision {
    /// Accept; carries the pre-generated event key for later recording
    Process(String),
    Skip(String),
    Error(String),
}

impl ProcessDecision {
    pub fn is_process(&self) -> bool {
        matches!(self, Self::Process(_))
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip(_))
    }
}

/// Per-package dedup record count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDedupStats {
    pub package_name: String,
    pub record_count: u64,
}

/// Aggregate dedup store statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupStats {
    pub total_records: u64,
    pub package_stats: Vec<PackageDedupStats>,
}
