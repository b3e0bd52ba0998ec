use sqlx::Row;
use sqlx::AnyConnection;
use uuid::Uuid;

use crate::draft::store::parse_uuid;
use crate::error::EngineResult;

/// Read-only surface over the player catalog.
///
/// The catalog itself is maintained elsewhere; the engine only asks three
/// questions: does a player exist, is anyone still available in a draft, and
/// who should an AFK nominator put up next.
pub struct PlayerStore;

impl PlayerStore {
    pub async fn exists(conn: &mut AnyConnection, player_id: Uuid) -> EngineResult<bool> {
        let row = sqlx::query(r#"SELECT 1 AS hit FROM players WHERE id = ?;"#)
            .bind(player_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.is_some())
    }

    /// Is there any player left without an active/won lot in this draft?
    /// When this turns false the auction has nothing left to sell.
    pub async fn any_available(conn: &mut AnyConnection, draft_id: Uuid) -> EngineResult<bool> {
        let row = sqlx::query(
            r#"
SELECT 1 AS hit
FROM players p
WHERE NOT EXISTS (
  SELECT 1 FROM auction_lots l
  WHERE l.draft_id = ? AND l.player_id = p.id AND l.status IN ('active', 'won')
)
LIMIT 1;
"#,
        )
        .bind(draft_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.is_some())
    }

    /// Best available player for an auto-nomination, in priority order:
    /// the nominator's queue, then season ADP, then anyone still available.
    pub async fn best_available(
        conn: &mut AnyConnection,
        draft_id: Uuid,
        roster_id: Uuid,
    ) -> EngineResult<Option<Uuid>> {
        if let Some(p) = Self::first_queued_available(conn, draft_id, roster_id).await? {
            return Ok(Some(p));
        }
        if let Some(p) = Self::best_by_adp(conn, draft_id).await? {
            return Ok(Some(p));
        }
        Self::any_available_player(conn, draft_id).await
    }

    async fn first_queued_available(
        conn: &mut AnyConnection,
        draft_id: Uuid,
        roster_id: Uuid,
    ) -> EngineResult<Option<Uuid>> {
        let row = sqlx::query(
            r#"
SELECT q.player_id
FROM draft_queues q
WHERE q.draft_id = ? AND q.roster_id = ?
  AND NOT EXISTS (
    SELECT 1 FROM auction_lots l
    WHERE l.draft_id = q.draft_id AND l.player_id = q.player_id
      AND l.status IN ('active', 'won')
  )
ORDER BY q.position ASC
LIMIT 1;
"#,
        )
        .bind(draft_id.to_string())
        .bind(roster_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(r) => Ok(Some(parse_uuid(&r.get::<String, _>("player_id"))?)),
            None => Ok(None),
        }
    }

    async fn best_by_adp(conn: &mut AnyConnection, draft_id: Uuid) -> EngineResult<Option<Uuid>> {
        // Unranked players are left to the any-available fallback.
        let row = sqlx::query(
            r#"
SELECT p.id
FROM players p
WHERE p.adp IS NOT NULL
  AND NOT EXISTS (
    SELECT 1 FROM auction_lots l
    WHERE l.draft_id = ? AND l.player_id = p.id AND l.status IN ('active', 'won')
  )
ORDER BY p.adp ASC
LIMIT 1;
"#,
        )
        .bind(draft_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(r) => Ok(Some(parse_uuid(&r.get::<String, _>("id"))?)),
            None => Ok(None),
        }
    }

    async fn any_available_player(
        conn: &mut AnyConnection,
        draft_id: Uuid,
    ) -> EngineResult<Option<Uuid>> {
        let row = sqlx::query(
            r#"
SELECT p.id
FROM players p
WHERE NOT EXISTS (
  SELECT 1 FROM auction_lots l
  WHERE l.draft_id = ? AND l.player_id = p.id AND l.status IN ('active', 'won')
)
ORDER BY p.id ASC
LIMIT 1;
"#,
        )
        .bind(draft_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(r) => Ok(Some(parse_uuid(&r.get::<String, _>("id"))?)),
            None => Ok(None),
        }
    }
}
