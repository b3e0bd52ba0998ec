use serde::{Deserialize, Serialize};

/// Process-level configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    // =========================
    // Deadline monitor configuration
    // =========================
    /// How often the deadline monitor scans for expired lots and
    /// nomination windows.
    ///
    /// Deadlines are data-plane (stored on the row); the scan interval only
    /// bounds how late a timeout fires, never whether it fires.
    pub monitor_tick_ms: u64,

    /// Maximum number of expired items handled per scan.
    ///
    /// Bounds work per tick; anything left over is picked up on the next
    /// tick since the rows still satisfy the expiry predicate.
    pub monitor_batch_limit: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://auction_dev.db".to_string());

        Self {
            database_url,
            monitor_tick_ms: 1_000,
            monitor_batch_limit: 64,
        }
    }
}

/// Auction mode for a draft. Only `fast` is handled by this engine; `slow`
/// drafts belong to the sibling engine with different timers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionMode {
    Fast,
    Slow,
}

/// What happens when the nominator's clock expires without a nomination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    AutoNominateAndOpenBid,
    AutoNominateNoOpenBid,
    AutoSkipNominator,
}

/// Per-draft settings, stored as a JSON blob on the draft row.
///
/// Every field has a default so partially-specified blobs from older league
/// seasons still parse; unknown keys are ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DraftSettings {
    pub auction_mode: AuctionMode,

    /// Floor for every lot's opening price and the per-slot budget reserve.
    pub min_bid: i64,

    /// Minimum raise over the displayed price for a non-leading bidder.
    pub min_increment: i64,

    /// Initial lot duration and the nominator clock, in seconds.
    pub nomination_seconds: i64,

    /// Timer reset applied on a qualifying bid, in seconds.
    pub reset_on_bid_seconds: i64,

    /// Hard cap on lot lifetime measured from lot creation. `None` = no cap.
    pub max_lot_duration_seconds: Option<i64>,

    pub fast_auction_timeout_action: TimeoutPolicy,

    /// League-level total budget per roster.
    pub auction_budget: i64,

    /// League-level roster size.
    pub roster_slots: i64,

    /// Ceiling for the fallback proxy placed on behalf of an AFK nominator.
    /// `None` disables the fallback; the opening proxy stays at `min_bid`.
    pub smart_max_cap: Option<i64>,
}

impl Default for DraftSettings {
    fn default() -> Self {
        Self {
            auction_mode: AuctionMode::Fast,
            min_bid: 1,
            min_increment: 1,
            nomination_seconds: 60,
            reset_on_bid_seconds: 15,
            max_lot_duration_seconds: None,
            fast_auction_timeout_action: TimeoutPolicy::AutoNominateAndOpenBid,
            auction_budget: 200,
            roster_slots: 15,
            smart_max_cap: None,
        }
    }
}

impl DraftSettings {
    /// Parse the settings blob, falling back to defaults on an empty column.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }

    pub fn nomination_ms(&self) -> i64 {
        self.nomination_seconds * 1_000
    }

    pub fn reset_on_bid_ms(&self) -> i64 {
        self.reset_on_bid_seconds * 1_000
    }

    pub fn max_lot_duration_ms(&self) -> Option<i64> {
        self.max_lot_duration_seconds.map(|s| s * 1_000)
    }
}
