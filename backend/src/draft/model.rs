use uuid::Uuid;

use crate::config::{AuctionMode, DraftSettings};
use crate::error::{EngineError, EngineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DraftStatus {
    NotStarted,
    InProgress,
    Paused,
    Completed,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::NotStarted => "not_started",
            DraftStatus::InProgress => "in_progress",
            DraftStatus::Paused => "paused",
            DraftStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> EngineResult<Self> {
        match raw {
            "not_started" => Ok(DraftStatus::NotStarted),
            "in_progress" => Ok(DraftStatus::InProgress),
            "paused" => Ok(DraftStatus::Paused),
            "completed" => Ok(DraftStatus::Completed),
            other => Err(EngineError::Internal(format!(
                "unknown draft status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DraftType {
    Auction,
    Snake,
}

impl DraftType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftType::Auction => "auction",
            DraftType::Snake => "snake",
        }
    }

    pub fn parse(raw: &str) -> EngineResult<Self> {
        match raw {
            "auction" => Ok(DraftType::Auction),
            "snake" => Ok(DraftType::Snake),
            other => Err(EngineError::Internal(format!("unknown draft type: {other}"))),
        }
    }
}

/// One draft for a league season.
#[derive(Clone, Debug)]
pub struct Draft {
    pub id: Uuid,
    pub league_id: Uuid,
    pub status: DraftStatus,
    pub draft_type: DraftType,
    /// Monotonic nomination counter; 0 before the first nomination window.
    pub current_pick: i64,
    /// The roster currently on the clock to nominate.
    pub current_roster_id: Option<Uuid>,
    /// NULL iff the draft is paused (or not started).
    pub pick_deadline_ms: Option<i64>,
    pub settings: DraftSettings,
    pub created_ms: i64,
    pub completed_ms: Option<i64>,
}

impl Draft {
    /// This engine only drives fast auctions; everything else is another
    /// engine's draft.
    pub fn is_fast_auction(&self) -> bool {
        self.draft_type == DraftType::Auction && self.settings.auction_mode == AuctionMode::Fast
    }
}

/// One slot in the (immutable) nomination order.
#[derive(Clone, Debug)]
pub struct DraftOrderEntry {
    pub roster_id: Uuid,
    /// 0-based position within the rotation.
    pub draft_position: i64,
}

/// League membership unit. Only identity and membership are read here.
#[derive(Clone, Debug)]
pub struct Roster {
    pub id: Uuid,
    pub league_id: Uuid,
    pub user_id: Uuid,
}

/// Roster on the clock for a given 1-based pick number.
///
/// Pick `p` maps onto position `(p - 1) mod n`, so pick 1 is the first
/// order entry and the rotation wraps indefinitely.
pub fn roster_at_pick(order: &[DraftOrderEntry], pick: i64) -> Option<&DraftOrderEntry> {
    if order.is_empty() || pick < 1 {
        return None;
    }
    let idx = ((pick - 1) % order.len() as i64) as usize;
    order.get(idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_order(n: usize) -> Vec<DraftOrderEntry> {
        (0..n)
            .map(|i| DraftOrderEntry {
                roster_id: Uuid::new_v4(),
                draft_position: i as i64,
            })
            .collect()
    }

    #[test]
    fn pick_numbers_wrap_around_the_order() {
        let order = mk_order(3);

        assert_eq!(
            roster_at_pick(&order, 1).unwrap().roster_id,
            order[0].roster_id
        );
        assert_eq!(
            roster_at_pick(&order, 3).unwrap().roster_id,
            order[2].roster_id
        );
        assert_eq!(
            roster_at_pick(&order, 4).unwrap().roster_id,
            order[0].roster_id,
            "pick 4 wraps to the first roster"
        );
        assert_eq!(
            roster_at_pick(&order, 8).unwrap().roster_id,
            order[1].roster_id
        );
    }

    #[test]
    fn invalid_picks_yield_none() {
        let order = mk_order(3);
        assert!(roster_at_pick(&order, 0).is_none());
        assert!(roster_at_pick(&[], 1).is_none());
    }

    #[test]
    fn status_round_trips() {
        for s in [
            DraftStatus::NotStarted,
            DraftStatus::InProgress,
            DraftStatus::Paused,
            DraftStatus::Completed,
        ] {
            assert_eq!(DraftStatus::parse(s.as_str()).unwrap(), s);
        }
        assert!(DraftStatus::parse("archived").is_err());
    }

    #[test]
    fn snake_drafts_are_not_fast_auctions() {
        let mut d = Draft {
            id: Uuid::new_v4(),
            league_id: Uuid::new_v4(),
            status: DraftStatus::InProgress,
            draft_type: DraftType::Snake,
            current_pick: 0,
            current_roster_id: None,
            pick_deadline_ms: None,
            settings: DraftSettings::default(),
            created_ms: 0,
            completed_ms: None,
        };
        assert!(!d.is_fast_auction());

        d.draft_type = DraftType::Auction;
        assert!(d.is_fast_auction());

        d.settings.auction_mode = crate::config::AuctionMode::Slow;
        assert!(!d.is_fast_auction());
    }
}
