//! Deadline monitor.
//!
//! Responsibilities:
//! - Periodically scan for active lots whose `bid_deadline` has passed and
//!   settle them, then advance the rotation.
//! - Scan for in-progress drafts whose nomination window has expired with
//!   nothing on the block and run the timeout policy (auto-nominate or
//!   skip).
//!
//! Work is dispatched serially per draft. The advisory locks would keep
//! concurrent workers correct anyway; serial dispatch just avoids pointless
//! contention. Items are best-effort: if state moved on before an item
//! runs, the locked re-read inside the service no-ops.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;
use uuid::Uuid;

use crate::auction::nominate::AutoNominationOutcome;
use crate::auction::service::AuctionService;
use crate::auction::settle::SettlementOutcome;
use crate::config::AppConfig;
use crate::draft::store::DraftStore;
use crate::error::EngineResult;
use crate::lot::store::LotStore;

/// What one scan did; surfaced in logs and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub lots_settled: usize,
    pub lots_auto_nominated: usize,
    pub nominators_skipped: usize,
}

impl ScanSummary {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct DeadlineMonitor {
    service: Arc<AuctionService>,
    tick: Duration,
    batch_limit: i64,
}

impl DeadlineMonitor {
    pub fn new(service: Arc<AuctionService>, cfg: &AppConfig) -> Self {
        Self {
            service,
            tick: Duration::from_millis(cfg.monitor_tick_ms),
            batch_limit: cfg.monitor_batch_limit,
        }
    }

    /// Run the scan loop until the task is aborted.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match self.scan_once().await {
                    Ok(summary) if !summary.is_empty() => {
                        tracing::info!(
                            settled = summary.lots_settled,
                            auto_nominated = summary.lots_auto_nominated,
                            skipped = summary.nominators_skipped,
                            "deadline scan handled expired work"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "deadline scan failed");
                    }
                }
            }
        })
    }

    /// One full scan over expired lots and nomination windows.
    #[instrument(skip(self), target = "monitor")]
    pub async fn scan_once(&self) -> EngineResult<ScanSummary> {
        let now = self.service.now();
        let mut summary = ScanSummary::default();

        // Expired lots, grouped per draft for serial dispatch.
        let expired: Vec<(Uuid, Uuid)> = {
            let mut conn = self.service.pool().acquire().await?;
            LotStore::expired_lots(&mut conn, now, self.batch_limit).await?
        };

        let mut by_draft: BTreeMap<Uuid, Vec<Uuid>> = BTreeMap::new();
        for (lot_id, draft_id) in expired {
            by_draft.entry(draft_id).or_default().push(lot_id);
        }

        for (draft_id, lots) in by_draft {
            for lot_id in lots {
                match self.service.settle_expired_lot(lot_id).await {
                    Ok(SettlementOutcome::Settled(_)) => {
                        summary.lots_settled += 1;
                        if let Err(e) = self.service.advance_nominator(draft_id, None).await {
                            tracing::error!(
                                draft_id = %draft_id,
                                error = %e,
                                "rotation after settlement failed"
                            );
                        }
                    }
                    Ok(SettlementOutcome::NoOp) => {}
                    Err(e) => {
                        tracing::error!(lot_id = %lot_id, error = %e, "settlement failed");
                    }
                }
            }
        }

        // Expired nomination windows (no active lot by definition of the
        // query; re-checked under lock anyway).
        let stalled: Vec<Uuid> = {
            let mut conn = self.service.pool().acquire().await?;
            DraftStore::expired_nomination_windows(&mut conn, now, self.batch_limit).await?
        };

        for draft_id in stalled {
            match self.service.auto_nominate(draft_id).await {
                Ok(AutoNominationOutcome::LotCreated(_)) => {
                    summary.lots_auto_nominated += 1;
                }
                Ok(AutoNominationOutcome::Skipped { roster_id }) => {
                    summary.nominators_skipped += 1;
                    if let Err(e) = self
                        .service
                        .advance_nominator(draft_id, Some(roster_id))
                        .await
                    {
                        tracing::error!(
                            draft_id = %draft_id,
                            error = %e,
                            "rotation after skip failed"
                        );
                    }
                }
                Ok(AutoNominationOutcome::NoEligiblePlayers) => {
                    // Advancing detects the exhausted pool and completes.
                    if let Err(e) = self.service.advance_nominator(draft_id, None).await {
                        tracing::error!(
                            draft_id = %draft_id,
                            error = %e,
                            "completion rotation failed"
                        );
                    }
                }
                Ok(AutoNominationOutcome::NotApplicable) => {}
                Err(e) => {
                    tracing::error!(draft_id = %draft_id, error = %e, "auto-nomination failed");
                }
            }
        }

        Ok(summary)
    }
}
