use async_trait::async_trait;
use sqlx::AnyConnection;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::lot::store::LotStore;

/// Post-completion hook, invoked with the completing transaction's
/// connection so materialization commits atomically with the status flip.
#[async_trait]
pub trait CompletionFinalizer: Send + Sync {
    async fn finalize(
        &self,
        conn: &mut AnyConnection,
        draft_id: Uuid,
        league_id: Uuid,
    ) -> EngineResult<()>;
}

/// Default finalizer: copies every won lot onto its winner's roster.
/// Schedule generation and anything league-facing happens downstream of the
/// `draft:completed` event.
pub struct RosterMaterializer;

#[async_trait]
impl CompletionFinalizer for RosterMaterializer {
    async fn finalize(
        &self,
        conn: &mut AnyConnection,
        draft_id: Uuid,
        _league_id: Uuid,
    ) -> EngineResult<()> {
        let won = LotStore::won_lots(conn, draft_id).await?;

        for lot in &won {
            let (Some(winner), Some(price)) = (lot.winning_roster_id, lot.winning_bid) else {
                tracing::warn!(lot_id = %lot.id, "won lot missing winner fields; skipping");
                continue;
            };

            sqlx::query(
                r#"
INSERT INTO roster_players(roster_id, player_id, acquisition_cost, acquired_ms)
VALUES (?, ?, ?, ?)
ON CONFLICT DO NOTHING;
"#,
            )
            .bind(winner.to_string())
            .bind(lot.player_id.to_string())
            .bind(price)
            .bind(lot.created_ms)
            .execute(&mut *conn)
            .await?;
        }

        tracing::info!(draft_id = %draft_id, lots = won.len(), "materialized won lots onto rosters");
        Ok(())
    }
}

/// No-op finalizer for deployments that materialize asynchronously off the
/// completion event.
pub struct NoopFinalizer;

#[async_trait]
impl CompletionFinalizer for NoopFinalizer {
    async fn finalize(
        &self,
        _conn: &mut AnyConnection,
        _draft_id: Uuid,
        _league_id: Uuid,
    ) -> EngineResult<()> {
        Ok(())
    }
}
