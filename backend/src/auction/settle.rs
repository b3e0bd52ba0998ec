use sqlx::AnyConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::config::DraftSettings;
use crate::error::EngineResult;
use crate::locks::LockDomain;
use crate::lot::model::{AuctionLot, LotStatus, ProxyBid};
use crate::lot::store::LotStore;
use crate::pricing::{self, ProxyBidEntry};

use super::service::AuctionService;

/// Result of a settlement attempt.
#[derive(Clone, Debug)]
pub enum SettlementOutcome {
    /// Lot reached a terminal state; the caller should advance the rotation
    /// in a separate `DRAFT` transaction.
    Settled(AuctionLot),
    /// The lot was already settled, extended past `now`, or paused; nothing
    /// was changed.
    NoOp,
}

impl AuctionService {
    /// Settle a lot whose clock has run out.
    ///
    /// Runs under `AUCTION(lot_id)` only, and never touches the draft row;
    /// rotation happens afterwards under `DRAFT` in a fresh transaction so
    /// the two domains are never held together.
    #[instrument(skip(self), target = "auction", fields(lot_id = %lot_id))]
    pub async fn settle_expired_lot(&self, lot_id: Uuid) -> EngineResult<SettlementOutcome> {
        let now = self.now();

        let outcome = self
            .txn
            .run_locked(LockDomain::Auction, lot_id, |mut tx| async move {
                let Some(lot) = LotStore::fetch(&mut tx, lot_id).await? else {
                    return Ok((tx, SettlementOutcome::NoOp));
                };

                // A bid may have extended the clock, a pause may have frozen
                // it, or a previous worker may have settled it already; the
                // locked re-read harmlessly no-ops.
                if lot.status != LotStatus::Active || !lot.is_expired(now) {
                    return Ok((tx, SettlementOutcome::NoOp));
                }

                let draft = Self::require_draft(&mut tx, lot.draft_id).await?;
                let s = &draft.settings;

                let proxies = LotStore::proxy_bids_ordered(&mut tx, lot_id).await?;

                // An untouched opening proxy is the engine bidding on the
                // nominator's behalf, not a real bidder; a lot nobody else
                // touched passes rather than forcing the purchase.
                if proxies.iter().all(|p| p.is_opening) {
                    LotStore::settle(&mut tx, lot_id, LotStatus::Passed, None, None).await?;

                    let mut settled = lot;
                    settled.status = LotStatus::Passed;
                    settled.bid_deadline_ms = None;
                    tracing::info!(lot_id = %lot_id, "lot passed with no bidders");
                    return Ok((tx, SettlementOutcome::Settled(settled)));
                }

                // The standing leader wins at the displayed price, provided
                // their budget still covers it (a concurrent win on another
                // lot may have drained it).
                if let Some(leader) = lot.current_bidder_roster_id {
                    let price = lot.current_bid;
                    if validate_winner(&mut tx, &lot, s, leader, price).await? {
                        return finish_won(tx, lot, leader, price).await;
                    }
                }

                // Fallback walk: drop the failing bidder and re-resolve the
                // second price among the survivors until one can pay.
                let mut remaining: Vec<ProxyBid> = proxies
                    .into_iter()
                    .filter(|p| Some(p.roster_id) != lot.current_bidder_roster_id)
                    .collect();

                loop {
                    if remaining.iter().all(|p| p.is_opening) {
                        LotStore::settle(&mut tx, lot_id, LotStatus::Passed, None, None).await?;

                        let mut settled = lot;
                        settled.status = LotStatus::Passed;
                        settled.bid_deadline_ms = None;
                        tracing::info!(lot_id = %lot_id, "lot passed; no solvent bidder");
                        return Ok((tx, SettlementOutcome::Settled(settled)));
                    }

                    let entries: Vec<ProxyBidEntry> = remaining
                        .iter()
                        .map(|p| ProxyBidEntry {
                            roster_id: p.roster_id,
                            max_bid: p.max_bid,
                        })
                        .collect();

                    // Re-resolve from the lot's floor; the failed leader's
                    // inflated price no longer binds the survivors.
                    let Some(res) = pricing::resolve_second_price(
                        s.min_bid,
                        None,
                        &entries,
                        s.min_bid,
                        s.min_increment,
                        0,
                    ) else {
                        LotStore::settle(&mut tx, lot_id, LotStatus::Passed, None, None).await?;

                        let mut settled = lot;
                        settled.status = LotStatus::Passed;
                        settled.bid_deadline_ms = None;
                        return Ok((tx, SettlementOutcome::Settled(settled)));
                    };

                    if validate_winner(&mut tx, &lot, s, res.new_leader, res.new_price).await? {
                        return finish_won(tx, lot, res.new_leader, res.new_price).await;
                    }

                    remaining.retain(|p| p.roster_id != res.new_leader);
                }
            })
            .await?;

        Ok(outcome)
    }
}

/// Budget and slot check for a prospective winner at `price`.
async fn validate_winner(
    conn: &mut AnyConnection,
    lot: &AuctionLot,
    s: &DraftSettings,
    roster_id: Uuid,
    price: i64,
) -> EngineResult<bool> {
    let snap = LotStore::budget_snapshot(conn, lot.draft_id, roster_id).await?;

    if snap.won_count >= s.roster_slots {
        return Ok(false);
    }

    let is_leading = lot.current_bidder_roster_id == Some(roster_id);
    let affordable = pricing::max_affordable_bid(
        s.auction_budget,
        s.roster_slots,
        &snap,
        lot.current_bid,
        is_leading,
        s.min_bid,
    );

    Ok(price <= affordable)
}

async fn finish_won(
    mut tx: crate::txn::AnyTx,
    lot: AuctionLot,
    winner: Uuid,
    price: i64,
) -> EngineResult<(crate::txn::AnyTx, SettlementOutcome)> {
    LotStore::settle(&mut tx, lot.id, LotStatus::Won, Some(winner), Some(price)).await?;

    let mut settled = lot;
    settled.status = LotStatus::Won;
    settled.winning_roster_id = Some(winner);
    settled.winning_bid = Some(price);
    settled.bid_deadline_ms = None;

    tracing::info!(
        lot_id = %settled.id,
        winner = %winner,
        price,
        "lot won"
    );
    Ok((tx, SettlementOutcome::Settled(settled)))
}
