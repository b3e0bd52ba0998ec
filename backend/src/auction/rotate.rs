use sqlx::AnyConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::draft::model::{Draft, roster_at_pick};
use crate::draft::store::DraftStore;
use crate::error::EngineResult;
use crate::events::AuctionEvent;
use crate::locks::LockDomain;
use crate::lot::store::LotStore;
use crate::players::store::PlayerStore;
use crate::pricing;

use super::service::AuctionService;

/// Result of a rotation attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced {
        nominator_roster_id: Uuid,
        nomination_number: i64,
        nomination_deadline_ms: i64,
    },
    /// No roster can nominate any more; the draft was completed.
    Completed,
    /// Draft is not an in-progress fast auction (paused included); nothing
    /// was changed.
    NotInProgress,
}

impl AuctionService {
    /// Move the nominator clock to the next eligible roster, skipping full
    /// or broke rosters, completing the draft when a full cycle finds none.
    #[instrument(skip(self), target = "auction", fields(draft_id = %draft_id))]
    pub async fn advance_nominator(
        &self,
        draft_id: Uuid,
        timeout_skipped_roster_id: Option<Uuid>,
    ) -> EngineResult<AdvanceOutcome> {
        let now = self.now();
        let finalizer = &self.finalizer;

        let (outcome, events) = self
            .txn
            .run_locked(LockDomain::Draft, draft_id, |mut tx| async move {
                let draft = Self::require_draft(&mut tx, draft_id).await?;

                if Self::require_fast_auction_in_progress(&draft).is_err() {
                    return Ok((tx, (AdvanceOutcome::NotInProgress, Vec::new())));
                }

                // With no player left anywhere there is nothing to rotate
                // toward.
                if !PlayerStore::any_available(&mut tx, draft_id).await? {
                    let events = complete_draft(&mut tx, &draft, finalizer.as_ref(), now).await?;
                    return Ok((tx, (AdvanceOutcome::Completed, events)));
                }

                let order = DraftStore::load_order(&mut tx, draft_id).await?;
                if order.is_empty() {
                    let events = complete_draft(&mut tx, &draft, finalizer.as_ref(), now).await?;
                    return Ok((tx, (AdvanceOutcome::Completed, events)));
                }

                let s = &draft.settings;
                let snaps = LotStore::budget_snapshots(&mut tx, draft_id).await?;

                for step in 1..=order.len() as i64 {
                    let pick = draft.current_pick + step;
                    let Some(entry) = roster_at_pick(&order, pick) else {
                        break;
                    };

                    let snap = snaps.get(&entry.roster_id).copied().unwrap_or_default();
                    if !pricing::assess_nominator_eligibility(
                        &snap,
                        s.auction_budget,
                        s.roster_slots,
                        s.min_bid,
                    )
                    .is_eligible()
                    {
                        continue;
                    }

                    // The batch snapshot can lag a settlement that just
                    // filled this roster; re-read it fresh before handing
                    // over the clock.
                    let fresh =
                        Self::snapshot_for(&mut tx, draft_id, entry.roster_id).await?;
                    if !pricing::assess_nominator_eligibility(
                        &fresh,
                        s.auction_budget,
                        s.roster_slots,
                        s.min_bid,
                    )
                    .is_eligible()
                    {
                        continue;
                    }

                    let deadline = now + s.nomination_ms();
                    DraftStore::update_nominator(
                        &mut tx,
                        draft_id,
                        pick,
                        entry.roster_id,
                        deadline,
                    )
                    .await?;

                    let outcome = AdvanceOutcome::Advanced {
                        nominator_roster_id: entry.roster_id,
                        nomination_number: pick,
                        nomination_deadline_ms: deadline,
                    };
                    let events = vec![AuctionEvent::NominatorChanged {
                        draft_id,
                        nominator_roster_id: entry.roster_id,
                        nomination_number: pick,
                        nomination_deadline_ms: deadline,
                        timeout_skipped_roster_id,
                    }];
                    return Ok((tx, (outcome, events)));
                }

                // Full cycle with no eligible nominator: the auction is done.
                let events = complete_draft(&mut tx, &draft, finalizer.as_ref(), now).await?;
                Ok((tx, (AdvanceOutcome::Completed, events)))
            })
            .await?;

        self.publish_all(events);

        match &outcome {
            AdvanceOutcome::Advanced {
                nominator_roster_id,
                nomination_number,
                ..
            } => {
                tracing::info!(
                    draft_id = %draft_id,
                    roster_id = %nominator_roster_id,
                    pick = nomination_number,
                    "nominator advanced"
                );
            }
            AdvanceOutcome::Completed => {
                tracing::info!(draft_id = %draft_id, "auction completed");
            }
            AdvanceOutcome::NotInProgress => {}
        }

        Ok(outcome)
    }

    /// Admin fallback: same rotation body, invocable without an antecedent
    /// settlement.
    pub async fn force_advance_nominator(&self, draft_id: Uuid) -> EngineResult<AdvanceOutcome> {
        self.advance_nominator(draft_id, None).await
    }
}

/// Terminal transition: flip the draft to completed and run the finalizer on
/// the same transaction so materialization commits atomically with it.
async fn complete_draft(
    conn: &mut AnyConnection,
    draft: &Draft,
    finalizer: &dyn crate::finalizer::CompletionFinalizer,
    now_ms: i64,
) -> EngineResult<Vec<AuctionEvent>> {
    DraftStore::set_completed(conn, draft.id, now_ms).await?;
    finalizer.finalize(conn, draft.id, draft.league_id).await?;

    Ok(vec![AuctionEvent::DraftCompleted {
        draft_id: draft.id,
        league_id: draft.league_id,
    }])
}
