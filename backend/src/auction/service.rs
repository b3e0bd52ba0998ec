use std::sync::Arc;

use sqlx::AnyPool;
use sqlx::AnyConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::clock::Clock;
use crate::draft::model::{Draft, DraftStatus};
use crate::draft::store::DraftStore;
use crate::error::{EngineError, EngineResult};
use crate::events::throttle::OutbidThrottle;
use crate::events::{AuctionEvent, EventSink};
use crate::finalizer::CompletionFinalizer;
use crate::locks::{LockDomain, LockManager};
use crate::lot::model::AuctionLot;
use crate::lot::store::LotStore;
use crate::pricing::{self, BudgetSnapshot};
use crate::txn::TxnRunner;

/// Budget line for one roster in the draft-state view.
#[derive(Clone, Debug)]
pub struct RosterBudgetView {
    pub roster_id: Uuid,
    pub spent: i64,
    pub won_count: i64,
    pub leading_commitment: i64,
    /// What this roster could put on a fresh lot right now (floored at 0).
    pub max_affordable: i64,
}

/// Snapshot of a draft for clients joining or refreshing.
#[derive(Clone, Debug)]
pub struct DraftStateView {
    pub draft_id: Uuid,
    pub active_lot: Option<AuctionLot>,
    pub current_nominator_roster_id: Option<Uuid>,
    pub nomination_number: i64,
    pub nomination_deadline_ms: Option<i64>,
    pub budgets: Vec<RosterBudgetView>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentNominator {
    pub roster_id: Uuid,
    pub user_id: Uuid,
}

/// Orchestrates the fast auction: nominations, proxy bids, rotation,
/// settlement and completion. All writes go through the locked transaction
/// runner; all events are published after commit.
pub struct AuctionService {
    pub(crate) txn: TxnRunner,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) finalizer: Arc<dyn CompletionFinalizer>,
    pub(crate) throttle: OutbidThrottle,
}

impl AuctionService {
    pub fn new(
        pool: AnyPool,
        locks: Arc<LockManager>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
        finalizer: Arc<dyn CompletionFinalizer>,
    ) -> Self {
        Self {
            txn: TxnRunner::new(pool, locks),
            clock,
            events,
            finalizer,
            throttle: OutbidThrottle::standard(),
        }
    }

    pub fn pool(&self) -> &AnyPool {
        self.txn.pool()
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Publish post-commit events, throttling targeted outbid notices.
    pub(crate) fn publish_all(&self, events: Vec<AuctionEvent>) {
        let now = self.now();
        for event in events {
            if let AuctionEvent::Outbid {
                user_id, lot_id, ..
            } = &event
                && !self.throttle.allow(*user_id, *lot_id, now)
            {
                continue;
            }
            self.events.publish(event);
        }
    }

    pub(crate) async fn require_draft(
        conn: &mut AnyConnection,
        draft_id: Uuid,
    ) -> EngineResult<Draft> {
        DraftStore::fetch(conn, draft_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("draft {draft_id} not found")))
    }

    pub(crate) fn require_fast_auction_in_progress(draft: &Draft) -> EngineResult<()> {
        if draft.status != DraftStatus::InProgress {
            return Err(EngineError::validation("Draft is not in progress"));
        }
        if !draft.is_fast_auction() {
            return Err(EngineError::validation("Draft is not a fast auction"));
        }
        Ok(())
    }

    /* =========================
    Read-side operations
    ========================= */

    /// Full client-facing snapshot of the draft: the lot on the block, the
    /// nominator clock and every roster's budget line.
    #[instrument(skip(self), target = "auction", fields(draft_id = %draft_id))]
    pub async fn get_state(&self, draft_id: Uuid) -> EngineResult<DraftStateView> {
        let mut conn = self.pool().acquire().await?;

        let draft = Self::require_draft(&mut conn, draft_id).await?;
        let active_lot = LotStore::active_lot(&mut conn, draft_id).await?;
        let order = DraftStore::load_order(&mut conn, draft_id).await?;
        let snaps = LotStore::budget_snapshots(&mut conn, draft_id).await?;

        let s = &draft.settings;
        let budgets = order
            .iter()
            .map(|entry| {
                let snap = snaps.get(&entry.roster_id).copied().unwrap_or_default();
                let affordable = pricing::max_affordable_bid(
                    s.auction_budget,
                    s.roster_slots,
                    &snap,
                    0,
                    false,
                    s.min_bid,
                );
                RosterBudgetView {
                    roster_id: entry.roster_id,
                    spent: snap.spent,
                    won_count: snap.won_count,
                    leading_commitment: snap.leading_commitment,
                    max_affordable: affordable.max(0),
                }
            })
            .collect();

        Ok(DraftStateView {
            draft_id,
            active_lot,
            current_nominator_roster_id: draft.current_roster_id,
            nomination_number: draft.current_pick,
            nomination_deadline_ms: draft.pick_deadline_ms,
            budgets,
        })
    }

    pub async fn get_current_nominator(
        &self,
        draft_id: Uuid,
    ) -> EngineResult<Option<CurrentNominator>> {
        let mut conn = self.pool().acquire().await?;

        let draft = match DraftStore::fetch(&mut conn, draft_id).await? {
            Some(d) => d,
            None => return Ok(None),
        };

        let Some(roster_id) = draft.current_roster_id else {
            return Ok(None);
        };

        match DraftStore::roster(&mut conn, roster_id).await? {
            Some(r) => Ok(Some(CurrentNominator {
                roster_id: r.id,
                user_id: r.user_id,
            })),
            None => Ok(None),
        }
    }

    /// Budget snapshot helper used across operations; always computed from
    /// committed state inside the caller's transaction.
    pub(crate) async fn snapshot_for(
        conn: &mut AnyConnection,
        draft_id: Uuid,
        roster_id: Uuid,
    ) -> EngineResult<BudgetSnapshot> {
        LotStore::budget_snapshot(conn, draft_id, roster_id).await
    }

    /* =========================
    Pause / resume
    ========================= */

    /// Suspend the draft: both the nomination clock and any active lot's
    /// clock go NULL, which the monitor and bid path treat as "frozen".
    #[instrument(skip(self), target = "auction", fields(draft_id = %draft_id))]
    pub async fn pause_draft(&self, draft_id: Uuid) -> EngineResult<()> {
        self.txn
            .run_locked(LockDomain::Draft, draft_id, |mut tx| async move {
                let draft = Self::require_draft(&mut tx, draft_id).await?;
                if draft.status != DraftStatus::InProgress {
                    return Err(EngineError::validation("Draft is not in progress"));
                }

                DraftStore::set_paused(&mut tx, draft_id).await?;
                LotStore::set_active_deadline(&mut tx, draft_id, None).await?;

                Ok((tx, ()))
            })
            .await?;

        tracing::info!(draft_id = %draft_id, "draft paused");
        Ok(())
    }

    /// Resume a paused draft with fresh clocks: a full nomination window for
    /// the nominator and a reset-sized window for any lot on the block,
    /// still capped by the lot's maximum duration.
    #[instrument(skip(self), target = "auction", fields(draft_id = %draft_id))]
    pub async fn resume_draft(&self, draft_id: Uuid) -> EngineResult<()> {
        let now = self.now();

        self.txn
            .run_locked(LockDomain::Draft, draft_id, |mut tx| async move {
                let draft = Self::require_draft(&mut tx, draft_id).await?;
                if draft.status != DraftStatus::Paused {
                    return Err(EngineError::validation("Draft is not paused"));
                }

                let s = &draft.settings;
                DraftStore::set_resumed(&mut tx, draft_id, now + s.nomination_ms()).await?;

                if let Some(lot) = LotStore::active_lot(&mut tx, draft_id).await? {
                    let mut deadline = now + s.reset_on_bid_ms();
                    if let Some(cap) = s.max_lot_duration_ms() {
                        deadline = deadline.min(lot.created_ms + cap);
                    }
                    LotStore::set_active_deadline(&mut tx, draft_id, Some(deadline)).await?;
                }

                Ok((tx, ()))
            })
            .await?;

        tracing::info!(draft_id = %draft_id, "draft resumed");
        Ok(())
    }
}
