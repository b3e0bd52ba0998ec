use sqlx::AnyConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::config::TimeoutPolicy;
use crate::draft::model::Draft;
use crate::draft::store::DraftStore;
use crate::error::{EngineError, EngineResult};
use crate::events::AuctionEvent;
use crate::locks::LockDomain;
use crate::lot::model::{AuctionLot, LotStatus};
use crate::lot::store::LotStore;
use crate::players::store::PlayerStore;
use crate::pricing::{self, TimeoutDecision};
use crate::txn::on_unique_violation;

use super::service::AuctionService;

/// Result of a user nomination.
#[derive(Clone, Debug)]
pub struct NominatedLot {
    pub lot: AuctionLot,
    pub message: String,
    /// True when an idempotency-key replay returned the earlier lot.
    pub replayed: bool,
}

/// Result of a timeout-driven nomination attempt.
#[derive(Clone, Debug)]
pub enum AutoNominationOutcome {
    LotCreated(AuctionLot),
    /// Policy or circumstances skipped the nominator; the caller advances
    /// the rotation carrying this roster id.
    Skipped { roster_id: Uuid },
    /// Nothing left to nominate anywhere; advancing will complete the draft.
    NoEligiblePlayers,
    /// Draft state moved on before the timeout ran; nothing to do.
    NotApplicable,
}

impl AuctionService {
    /// Put a player on the block for the current nominator.
    ///
    /// Cheap precondition checks run outside the lock for friendly errors;
    /// everything is re-validated under `DRAFT(draft_id)` because those
    /// reads may be stale by the time the lock is held.
    #[instrument(
        skip(self, idempotency_key),
        target = "auction",
        fields(draft_id = %draft_id, user_id = %user_id, player_id = %player_id)
    )]
    pub async fn nominate(
        &self,
        draft_id: Uuid,
        user_id: Uuid,
        player_id: Uuid,
        idempotency_key: Option<String>,
    ) -> EngineResult<NominatedLot> {
        let now = self.now();

        // Fast-path validation outside the lock.
        let roster_id = {
            let mut conn = self.pool().acquire().await?;

            let draft = Self::require_draft(&mut conn, draft_id).await?;
            Self::require_fast_auction_in_progress(&draft)?;

            let roster = DraftStore::roster_by_user(&mut conn, draft.league_id, user_id)
                .await?
                .ok_or_else(|| EngineError::forbidden("You are not a member of this league"))?;

            if draft.current_roster_id != Some(roster.id) {
                return Err(EngineError::forbidden("It is not your turn to nominate"));
            }

            if !PlayerStore::exists(&mut conn, player_id).await? {
                return Err(EngineError::not_found(format!("player {player_id} not found")));
            }

            roster.id
        };

        let key = idempotency_key.clone();
        let (outcome, events) = self
            .txn
            .run_locked(LockDomain::Draft, draft_id, |mut tx| async move {
                // Re-validate everything inside the lock; the checks above
                // were against a snapshot another writer may have replaced.
                let draft = Self::require_draft(&mut tx, draft_id).await?;
                Self::require_fast_auction_in_progress(&draft)?;

                if draft.current_roster_id != Some(roster_id) {
                    return Err(EngineError::forbidden("It is not your turn to nominate"));
                }

                // Retry short-circuit: the earlier attempt already landed.
                if let Some(k) = key.as_deref()
                    && let Some(existing) =
                        LotStore::fetch_by_idempotency_key(&mut tx, draft_id, k).await?
                {
                    let out = NominatedLot {
                        lot: existing,
                        message: "Nomination already recorded".to_string(),
                        replayed: true,
                    };
                    return Ok((tx, (out, Vec::new())));
                }

                if LotStore::active_lot(&mut tx, draft_id).await?.is_some() {
                    return Err(EngineError::validation(
                        "Another lot is already on the block",
                    ));
                }

                if LotStore::live_lot_for_player(&mut tx, draft_id, player_id)
                    .await?
                    .is_some()
                {
                    return Err(EngineError::validation(
                        "Player has already been drafted or nominated",
                    ));
                }

                let s = &draft.settings;
                let snap = Self::snapshot_for(&mut tx, draft_id, roster_id).await?;
                match pricing::assess_nominator_eligibility(
                    &snap,
                    s.auction_budget,
                    s.roster_slots,
                    s.min_bid,
                ) {
                    pricing::NominatorEligibility::Eligible => {}
                    pricing::NominatorEligibility::RosterFull => {
                        return Err(EngineError::validation("Your roster is full"));
                    }
                    pricing::NominatorEligibility::InsufficientBudget => {
                        return Err(EngineError::validation(format!(
                            "Insufficient budget to open a lot at ${}",
                            s.min_bid
                        )));
                    }
                }

                let lot = create_lot(
                    &mut tx,
                    &draft,
                    player_id,
                    roster_id,
                    key.as_deref(),
                    true,
                    s.min_bid,
                    false,
                    now,
                )
                .await?;

                let events = vec![AuctionEvent::LotStarted {
                    draft_id,
                    lot: lot.clone(),
                    server_time_ms: now,
                    is_auto_nomination: false,
                }];

                let out = NominatedLot {
                    message: format!("Player nominated at ${}", lot.current_bid),
                    lot,
                    replayed: false,
                };
                Ok((tx, (out, events)))
            })
            .await?;

        self.publish_all(events);

        if !outcome.replayed {
            tracing::info!(
                draft_id = %draft_id,
                lot_id = %outcome.lot.id,
                player_id = %player_id,
                "lot started"
            );
        }

        Ok(outcome)
    }

    /// Timeout entry point: nominate on behalf of an absent nominator, or
    /// report that the rotation should skip them.
    #[instrument(skip(self), target = "auction", fields(draft_id = %draft_id))]
    pub async fn auto_nominate(&self, draft_id: Uuid) -> EngineResult<AutoNominationOutcome> {
        let now = self.now();

        // Pre-flight outside the lock; cheap disqualifiers first.
        {
            let mut conn = self.pool().acquire().await?;

            let Some(draft) = DraftStore::fetch(&mut conn, draft_id).await? else {
                return Err(EngineError::not_found(format!("draft {draft_id} not found")));
            };
            if Self::require_fast_auction_in_progress(&draft).is_err()
                || draft.current_roster_id.is_none()
            {
                return Ok(AutoNominationOutcome::NotApplicable);
            }
            if LotStore::active_lot(&mut conn, draft_id).await?.is_some() {
                return Ok(AutoNominationOutcome::NotApplicable);
            }
        }

        let (outcome, events) = self
            .txn
            .run_locked(LockDomain::Draft, draft_id, |mut tx| async move {
                let draft = Self::require_draft(&mut tx, draft_id).await?;

                if Self::require_fast_auction_in_progress(&draft).is_err() {
                    return Ok((tx, (AutoNominationOutcome::NotApplicable, Vec::new())));
                }
                let Some(roster_id) = draft.current_roster_id else {
                    return Ok((tx, (AutoNominationOutcome::NotApplicable, Vec::new())));
                };
                // A user nomination may have landed while we waited.
                if LotStore::active_lot(&mut tx, draft_id).await?.is_some() {
                    return Ok((tx, (AutoNominationOutcome::NotApplicable, Vec::new())));
                }

                let s = &draft.settings;
                let policy = s.fast_auction_timeout_action;

                if policy == TimeoutPolicy::AutoSkipNominator {
                    return Ok((tx, (AutoNominationOutcome::Skipped { roster_id }, Vec::new())));
                }

                let player = PlayerStore::best_available(&mut tx, draft_id, roster_id).await?;
                let snap = Self::snapshot_for(&mut tx, draft_id, roster_id).await?;
                let eligibility = pricing::assess_nominator_eligibility(
                    &snap,
                    s.auction_budget,
                    s.roster_slots,
                    s.min_bid,
                );

                let decision =
                    pricing::resolve_timeout_action(policy, player.is_some(), eligibility);

                let outcome = match (decision, player) {
                    (TimeoutDecision::Skip, None) => AutoNominationOutcome::NoEligiblePlayers,
                    (TimeoutDecision::Skip, Some(_)) => {
                        tracing::info!(
                            draft_id = %draft_id,
                            roster_id = %roster_id,
                            reason = eligibility.reason(),
                            "nominator skipped on timeout"
                        );
                        AutoNominationOutcome::Skipped { roster_id }
                    }
                    (TimeoutDecision::CreateLotNoOpenBid, Some(player_id)) => {
                        let lot = create_lot(
                            &mut tx, &draft, player_id, roster_id, None, false, s.min_bid,
                            true, now,
                        )
                        .await?;
                        AutoNominationOutcome::LotCreated(lot)
                    }
                    (TimeoutDecision::CreateLotWithOpenBid, Some(player_id)) => {
                        // Keep the AFK nominator in contention with a
                        // conservative ceiling when one is configured.
                        let affordable = pricing::max_affordable_bid(
                            s.auction_budget,
                            s.roster_slots,
                            &snap,
                            0,
                            false,
                            s.min_bid,
                        );
                        let proxy_max = match s.smart_max_cap {
                            Some(cap) => pricing::smart_fallback_max(affordable, cap, s.min_bid),
                            None => s.min_bid,
                        };

                        let lot = create_lot(
                            &mut tx, &draft, player_id, roster_id, None, true, proxy_max,
                            true, now,
                        )
                        .await?;
                        AutoNominationOutcome::LotCreated(lot)
                    }
                    // `resolve_timeout_action` only creates lots when a
                    // player exists.
                    (_, None) => AutoNominationOutcome::NoEligiblePlayers,
                };

                let events = match &outcome {
                    AutoNominationOutcome::LotCreated(lot) => vec![AuctionEvent::LotStarted {
                        draft_id,
                        lot: lot.clone(),
                        server_time_ms: now,
                        is_auto_nomination: true,
                    }],
                    _ => Vec::new(),
                };

                Ok((tx, (outcome, events)))
            })
            .await?;

        self.publish_all(events);
        Ok(outcome)
    }
}

/// Insert a fresh lot and, when requested, install the nominator as opening
/// bidder (proxy at `proxy_max`, history row at the opening price).
#[allow(clippy::too_many_arguments)]
async fn create_lot(
    conn: &mut AnyConnection,
    draft: &Draft,
    player_id: Uuid,
    nominator_roster_id: Uuid,
    idempotency_key: Option<&str>,
    open_bid: bool,
    proxy_max: i64,
    is_auto: bool,
    now_ms: i64,
) -> EngineResult<AuctionLot> {
    let s = &draft.settings;

    let mut deadline = now_ms + s.nomination_ms();
    if let Some(cap) = s.max_lot_duration_ms() {
        deadline = deadline.min(now_ms + cap);
    }

    let mut lot = AuctionLot {
        id: Uuid::new_v4(),
        draft_id: draft.id,
        player_id,
        nominator_roster_id,
        current_bid: s.min_bid,
        current_bidder_roster_id: None,
        bid_count: 0,
        bid_deadline_ms: Some(deadline),
        status: LotStatus::Active,
        winning_roster_id: None,
        winning_bid: None,
        created_ms: now_ms,
        idempotency_key: idempotency_key.map(str::to_owned),
    };

    // The partial unique indexes on (draft, player) and (draft, key) make
    // any race that slipped past the lock a retryable conflict instead of a
    // corrupted board.
    LotStore::insert(conn, &lot).await.map_err(|e| {
        on_unique_violation(
            e,
            EngineError::conflict("Simultaneous nomination; please retry"),
        )
    })?;

    if open_bid {
        LotStore::set_opening_bidder(conn, lot.id, nominator_roster_id).await?;
        LotStore::upsert_proxy(conn, lot.id, nominator_roster_id, proxy_max, true, now_ms).await?;
        LotStore::append_history(
            conn,
            lot.id,
            nominator_roster_id,
            lot.current_bid,
            is_auto,
            None,
            now_ms,
        )
        .await?;

        lot.current_bidder_roster_id = Some(nominator_roster_id);
    }

    Ok(lot)
}
