use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LotStatus {
    Active,
    Won,
    Passed,
}

impl LotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Active => "active",
            LotStatus::Won => "won",
            LotStatus::Passed => "passed",
        }
    }

    pub fn parse(raw: &str) -> EngineResult<Self> {
        match raw {
            "active" => Ok(LotStatus::Active),
            "won" => Ok(LotStatus::Won),
            "passed" => Ok(LotStatus::Passed),
            other => Err(EngineError::Internal(format!("unknown lot status: {other}"))),
        }
    }

    /// Terminal states are immutable except for post-settlement
    /// materialization.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LotStatus::Active)
    }
}

/// The unit of contention: one player on the block.
#[derive(Clone, Debug)]
pub struct AuctionLot {
    pub id: Uuid,
    pub draft_id: Uuid,
    pub player_id: Uuid,
    pub nominator_roster_id: Uuid,
    /// Publicly displayed price; monotonically non-decreasing while active.
    pub current_bid: i64,
    /// Current leader, if any.
    pub current_bidder_roster_id: Option<Uuid>,
    /// Increments only when `current_bid` moves.
    pub bid_count: i64,
    /// NULL iff the draft is paused.
    pub bid_deadline_ms: Option<i64>,
    pub status: LotStatus,
    pub winning_roster_id: Option<Uuid>,
    pub winning_bid: Option<i64>,
    pub created_ms: i64,
    pub idempotency_key: Option<String>,
}

impl AuctionLot {
    /// Expired relative to `now`; a paused (NULL-deadline) lot never expires.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.bid_deadline_ms, Some(d) if d <= now_ms)
    }
}

/// A bidder's stored maximum on one lot.
#[derive(Clone, Debug)]
pub struct ProxyBid {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub roster_id: Uuid,
    pub max_bid: i64,
    /// Set on the proxy the engine places for the nominator at lot creation;
    /// cleared the moment the nominator raises through the bid entry point.
    /// A lot whose proxies are all still opening rows has no real bidders.
    pub is_opening: bool,
    pub created_ms: i64,
    pub updated_ms: i64,
}

/// Append-only audit record; doubles as the idempotency ledger.
#[derive(Clone, Debug)]
pub struct BidHistoryEntry {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub roster_id: Uuid,
    pub bid_amount: i64,
    pub is_proxy: bool,
    pub idempotency_key: Option<String>,
    pub created_ms: i64,
}
