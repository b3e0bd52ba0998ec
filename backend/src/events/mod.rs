pub mod bus;
pub mod throttle;

use uuid::Uuid;

use crate::lot::model::AuctionLot;

/// Coarse event families, used to key handler registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    LotStarted,
    Bid,
    Outbid,
    NominatorChanged,
    DraftCompleted,
}

/// Domain events published after a successful commit.
///
/// Ordering relative to the commit is the only delivery guarantee; outbid
/// notices in particular may arrive reordered with respect to the bid event
/// they reference.
#[derive(Clone, Debug)]
pub enum AuctionEvent {
    LotStarted {
        draft_id: Uuid,
        lot: AuctionLot,
        server_time_ms: i64,
        is_auto_nomination: bool,
    },
    Bid {
        draft_id: Uuid,
        lot: AuctionLot,
        server_time_ms: i64,
    },
    /// Targeted to a single user.
    Outbid {
        user_id: Uuid,
        lot_id: Uuid,
        player_id: Uuid,
        new_bid: i64,
    },
    NominatorChanged {
        draft_id: Uuid,
        nominator_roster_id: Uuid,
        nomination_number: i64,
        nomination_deadline_ms: i64,
        timeout_skipped_roster_id: Option<Uuid>,
    },
    DraftCompleted {
        draft_id: Uuid,
        league_id: Uuid,
    },
}

impl AuctionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AuctionEvent::LotStarted { .. } => EventKind::LotStarted,
            AuctionEvent::Bid { .. } => EventKind::Bid,
            AuctionEvent::Outbid { .. } => EventKind::Outbid,
            AuctionEvent::NominatorChanged { .. } => EventKind::NominatorChanged,
            AuctionEvent::DraftCompleted { .. } => EventKind::DraftCompleted,
        }
    }
}

/// In-process publish interface. At-most-once delivery; subscribers needing
/// durability must queue externally.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: AuctionEvent);
}
