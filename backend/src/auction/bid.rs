use tracing::instrument;
use uuid::Uuid;

use crate::draft::store::DraftStore;
use crate::error::{EngineError, EngineResult};
use crate::events::AuctionEvent;
use crate::locks::LockDomain;
use crate::lot::model::{AuctionLot, LotStatus, ProxyBid};
use crate::lot::store::LotStore;
use crate::pricing::{self, ProxyBidEntry};

use super::service::AuctionService;

/// Result of a max-bid submission.
#[derive(Clone, Debug)]
pub struct BidOutcome {
    pub lot: AuctionLot,
    pub proxy: ProxyBid,
    /// Roster ids displaced by this bid (already resolved to events).
    pub outbid_roster_ids: Vec<Uuid>,
    pub message: String,
    /// True when an idempotency-key replay returned the current state.
    pub replayed: bool,
}

impl AuctionService {
    /// Set (or raise) the caller's maximum on an active lot and re-resolve
    /// the second-price outcome.
    ///
    /// Runs under `AUCTION(lot_id)` only; the draft row is read, never
    /// written. The CAS predicate on the price update would catch any
    /// writer that slipped past the lock.
    #[instrument(
        skip(self, idempotency_key),
        target = "auction",
        fields(draft_id = %draft_id, lot_id = %lot_id, user_id = %user_id, max_bid)
    )]
    pub async fn set_max_bid(
        &self,
        draft_id: Uuid,
        user_id: Uuid,
        lot_id: Uuid,
        max_bid: i64,
        idempotency_key: Option<String>,
    ) -> EngineResult<BidOutcome> {
        if max_bid < 0 {
            return Err(EngineError::validation("Bid must be a non-negative amount"));
        }

        let now = self.now();

        // Membership resolves outside the lock; re-checked inside.
        let roster_id = {
            let mut conn = self.pool().acquire().await?;

            let draft = Self::require_draft(&mut conn, draft_id).await?;
            let roster = DraftStore::roster_by_user(&mut conn, draft.league_id, user_id)
                .await?
                .ok_or_else(|| EngineError::forbidden("You are not a member of this league"))?;
            roster.id
        };

        let key = idempotency_key.clone();
        let (outcome, events) = self
            .txn
            .run_locked(LockDomain::Auction, lot_id, |mut tx| async move {
                // Replay short-circuit before any mutation.
                if let Some(k) = key.as_deref()
                    && LotStore::history_replay(&mut tx, lot_id, roster_id, k).await?
                {
                    let lot = LotStore::fetch(&mut tx, lot_id)
                        .await?
                        .ok_or_else(|| EngineError::not_found("Lot not found"))?;
                    let proxy = LotStore::proxy_for(&mut tx, lot_id, roster_id)
                        .await?
                        .ok_or_else(|| {
                            EngineError::Internal("replayed bid has no proxy row".into())
                        })?;

                    let out = BidOutcome {
                        lot,
                        proxy,
                        outbid_roster_ids: Vec::new(),
                        message: "Bid already recorded".to_string(),
                        replayed: true,
                    };
                    return Ok((tx, (out, Vec::new())));
                }

                let lot = LotStore::fetch(&mut tx, lot_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("Lot not found"))?;

                if lot.draft_id != draft_id {
                    return Err(EngineError::not_found("Lot not found in this draft"));
                }
                if lot.status != LotStatus::Active {
                    return Err(EngineError::validation("Lot is no longer active"));
                }
                let Some(deadline) = lot.bid_deadline_ms else {
                    return Err(EngineError::validation(
                        "Draft is paused; bidding is suspended",
                    ));
                };
                if deadline <= now {
                    return Err(EngineError::validation("Lot has expired; please refresh"));
                }

                let draft = Self::require_draft(&mut tx, lot.draft_id).await?;
                let s = &draft.settings;

                // Membership could have been revoked since the fast path.
                let roster = DraftStore::roster(&mut tx, roster_id)
                    .await?
                    .filter(|r| r.league_id == draft.league_id)
                    .ok_or_else(|| EngineError::forbidden("You are not a member of this league"))?;

                // Bid minima depend on who currently leads.
                let leader = lot.current_bidder_roster_id;
                match leader {
                    None => {
                        // No leader yet: the opening price is a floor, not a
                        // hurdle; no increment applies.
                        if max_bid < s.min_bid {
                            return Err(EngineError::validation(format!(
                                "Bid must be at least ${}",
                                s.min_bid
                            )));
                        }
                    }
                    Some(l) if l == roster.id => {
                        // The leader may raise their ceiling but never drop
                        // it below the displayed price.
                        if max_bid < lot.current_bid {
                            return Err(EngineError::validation(format!(
                                "Bid must be at least ${}",
                                lot.current_bid
                            )));
                        }
                    }
                    Some(_) => {
                        let floor = lot.current_bid + s.min_increment;
                        if max_bid < floor {
                            return Err(EngineError::validation(format!(
                                "Bid must be at least ${floor}"
                            )));
                        }
                    }
                }

                // Affordability against committed state.
                let snap = Self::snapshot_for(&mut tx, lot.draft_id, roster.id).await?;
                if snap.won_count >= s.roster_slots {
                    return Err(EngineError::validation("Your roster is full"));
                }

                let is_leading = leader == Some(roster.id);
                let affordable = pricing::max_affordable_bid(
                    s.auction_budget,
                    s.roster_slots,
                    &snap,
                    lot.current_bid,
                    is_leading,
                    s.min_bid,
                );
                if max_bid > affordable {
                    return Err(EngineError::validation(format!(
                        "Maximum affordable bid is ${}",
                        affordable.max(0)
                    )));
                }

                // Record the ceiling and the audit row, then re-resolve.
                // The history row is written even when nothing changes.
                LotStore::upsert_proxy(&mut tx, lot_id, roster.id, max_bid, false, now).await?;
                LotStore::append_history(
                    &mut tx,
                    lot_id,
                    roster.id,
                    max_bid,
                    false,
                    key.as_deref(),
                    now,
                )
                .await?;

                let proxies = LotStore::proxy_bids_ordered(&mut tx, lot_id).await?;
                let entries: Vec<ProxyBidEntry> = proxies
                    .iter()
                    .map(|p| ProxyBidEntry {
                        roster_id: p.roster_id,
                        max_bid: p.max_bid,
                    })
                    .collect();

                let resolution = pricing::resolve_second_price(
                    lot.current_bid,
                    leader,
                    &entries,
                    s.min_bid,
                    s.min_increment,
                    lot.bid_count,
                );

                let mut updated = lot.clone();
                let mut events: Vec<AuctionEvent> = Vec::new();
                let mut outbid_roster_ids = Vec::new();

                if let Some(res) = resolution
                    && (res.price_changed || res.leader_changed)
                {
                    let applied = LotStore::cas_update_price(
                        &mut tx,
                        lot_id,
                        lot.current_bid,
                        lot.current_bidder_roster_id,
                        res.new_price,
                        res.new_leader,
                        res.new_bid_count,
                    )
                    .await?;

                    if !applied {
                        return Err(EngineError::conflict(
                            "Simultaneous bid detected; please retry",
                        ));
                    }

                    updated.current_bid = res.new_price;
                    updated.current_bidder_roster_id = Some(res.new_leader);
                    updated.bid_count = res.new_bid_count;

                    // A qualifying bid resets the clock, bounded by the
                    // lot's maximum duration.
                    let ext = pricing::extended_deadline(
                        now,
                        deadline,
                        lot.created_ms,
                        s.reset_on_bid_ms(),
                        s.max_lot_duration_ms(),
                    );
                    if ext.should_extend {
                        LotStore::extend_deadline(&mut tx, lot_id, ext.new_deadline_ms).await?;
                        updated.bid_deadline_ms = Some(ext.new_deadline_ms);
                    }

                    if let Some(notice) = res.outbid {
                        outbid_roster_ids.push(notice.previous_leader);

                        // Outbid events target the displaced user, not the
                        // roster.
                        if let Some(displaced) =
                            DraftStore::roster(&mut tx, notice.previous_leader).await?
                        {
                            events.push(AuctionEvent::Outbid {
                                user_id: displaced.user_id,
                                lot_id,
                                player_id: lot.player_id,
                                new_bid: notice.new_leading_bid,
                            });
                        }
                    }
                }

                events.insert(
                    0,
                    AuctionEvent::Bid {
                        draft_id: lot.draft_id,
                        lot: updated.clone(),
                        server_time_ms: now,
                    },
                );

                let proxy = LotStore::proxy_for(&mut tx, lot_id, roster.id)
                    .await?
                    .ok_or_else(|| EngineError::Internal("proxy vanished mid-bid".into()))?;

                let message = if updated.current_bidder_roster_id == Some(roster.id) {
                    format!(
                        "You lead at ${} with a maximum of ${}",
                        updated.current_bid, max_bid
                    )
                } else {
                    format!("Maximum bid of ${max_bid} recorded")
                };

                let out = BidOutcome {
                    lot: updated,
                    proxy,
                    outbid_roster_ids,
                    message,
                    replayed: false,
                };
                Ok((tx, (out, events)))
            })
            .await?;

        self.publish_all(events);

        if !outcome.replayed {
            tracing::info!(
                lot_id = %lot_id,
                roster_id = %outcome.proxy.roster_id,
                current_bid = outcome.lot.current_bid,
                "bid recorded"
            );
        }

        Ok(outcome)
    }
}
