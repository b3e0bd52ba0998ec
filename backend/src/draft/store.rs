use sqlx::Row;
use sqlx::any::AnyRow;
use sqlx::AnyConnection;
use uuid::Uuid;

use crate::config::DraftSettings;
use crate::draft::model::{Draft, DraftOrderEntry, DraftStatus, DraftType, Roster};
use crate::error::{EngineError, EngineResult};

/// Persistence for drafts, the nomination order and roster membership.
/// Every method takes the caller's connection so the same code runs inside
/// a locked transaction or against the pool.
pub struct DraftStore;

impl DraftStore {
    pub async fn fetch(conn: &mut AnyConnection, draft_id: Uuid) -> EngineResult<Option<Draft>> {
        let row = sqlx::query(
            r#"
SELECT id, league_id, status, draft_type, current_pick, current_roster_id,
       pick_deadline_ms, settings, created_ms, completed_ms
FROM drafts
WHERE id = ?;
"#,
        )
        .bind(draft_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_draft(&r)?)),
            None => Ok(None),
        }
    }

    /// Advance the rotation: new pick counter, nominator and clock.
    pub async fn update_nominator(
        conn: &mut AnyConnection,
        draft_id: Uuid,
        current_pick: i64,
        roster_id: Uuid,
        pick_deadline_ms: i64,
    ) -> EngineResult<()> {
        sqlx::query(
            r#"
UPDATE drafts
SET current_pick = ?, current_roster_id = ?, pick_deadline_ms = ?
WHERE id = ? AND status = 'in_progress';
"#,
        )
        .bind(current_pick)
        .bind(roster_id.to_string())
        .bind(pick_deadline_ms)
        .bind(draft_id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn set_paused(conn: &mut AnyConnection, draft_id: Uuid) -> EngineResult<()> {
        sqlx::query(
            r#"
UPDATE drafts
SET status = 'paused', pick_deadline_ms = NULL
WHERE id = ? AND status = 'in_progress';
"#,
        )
        .bind(draft_id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn set_resumed(
        conn: &mut AnyConnection,
        draft_id: Uuid,
        pick_deadline_ms: i64,
    ) -> EngineResult<()> {
        sqlx::query(
            r#"
UPDATE drafts
SET status = 'in_progress', pick_deadline_ms = ?
WHERE id = ? AND status = 'paused';
"#,
        )
        .bind(pick_deadline_ms)
        .bind(draft_id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Terminal transition; completed drafts accept no further mutations.
    pub async fn set_completed(
        conn: &mut AnyConnection,
        draft_id: Uuid,
        completed_ms: i64,
    ) -> EngineResult<()> {
        sqlx::query(
            r#"
UPDATE drafts
SET status = 'completed', completed_ms = ?, pick_deadline_ms = NULL
WHERE id = ? AND status = 'in_progress';
"#,
        )
        .bind(completed_ms)
        .bind(draft_id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn load_order(
        conn: &mut AnyConnection,
        draft_id: Uuid,
    ) -> EngineResult<Vec<DraftOrderEntry>> {
        let rows = sqlx::query(
            r#"
SELECT roster_id, draft_position
FROM draft_order
WHERE draft_id = ?
ORDER BY draft_position ASC;
"#,
        )
        .bind(draft_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(DraftOrderEntry {
                roster_id: parse_uuid(&r.get::<String, _>("roster_id"))?,
                draft_position: r.get("draft_position"),
            });
        }
        Ok(out)
    }

    pub async fn roster(conn: &mut AnyConnection, roster_id: Uuid) -> EngineResult<Option<Roster>> {
        let row = sqlx::query(r#"SELECT id, league_id, user_id FROM rosters WHERE id = ?;"#)
            .bind(roster_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_roster(&r)?)),
            None => Ok(None),
        }
    }

    pub async fn roster_by_user(
        conn: &mut AnyConnection,
        league_id: Uuid,
        user_id: Uuid,
    ) -> EngineResult<Option<Roster>> {
        let row = sqlx::query(
            r#"SELECT id, league_id, user_id FROM rosters WHERE league_id = ? AND user_id = ?;"#,
        )
        .bind(league_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_roster(&r)?)),
            None => Ok(None),
        }
    }

    /// Drafts whose nomination window has expired with nothing on the block.
    /// These are the auto-nomination candidates for a monitor tick.
    pub async fn expired_nomination_windows(
        conn: &mut AnyConnection,
        now_ms: i64,
        limit: i64,
    ) -> EngineResult<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
SELECT d.id
FROM drafts d
WHERE d.status = 'in_progress'
  AND d.pick_deadline_ms IS NOT NULL
  AND d.pick_deadline_ms <= ?
  AND NOT EXISTS (
    SELECT 1 FROM auction_lots l
    WHERE l.draft_id = d.id AND l.status = 'active'
  )
LIMIT ?;
"#,
        )
        .bind(now_ms)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(parse_uuid(&r.get::<String, _>("id"))?);
        }
        Ok(out)
    }
}

/* =========================
Row mapping + conversions
========================= */

fn row_to_draft(r: &AnyRow) -> EngineResult<Draft> {
    let settings_raw: String = r.get("settings");
    let settings = DraftSettings::from_json(&settings_raw)
        .map_err(|e| EngineError::Internal(format!("malformed draft settings: {e}")))?;

    Ok(Draft {
        id: parse_uuid(&r.get::<String, _>("id"))?,
        league_id: parse_uuid(&r.get::<String, _>("league_id"))?,
        status: DraftStatus::parse(&r.get::<String, _>("status"))?,
        draft_type: DraftType::parse(&r.get::<String, _>("draft_type"))?,
        current_pick: r.get("current_pick"),
        current_roster_id: parse_opt_uuid(r.get::<Option<String>, _>("current_roster_id"))?,
        pick_deadline_ms: r.get("pick_deadline_ms"),
        settings,
        created_ms: r.get("created_ms"),
        completed_ms: r.get("completed_ms"),
    })
}

fn row_to_roster(r: &AnyRow) -> EngineResult<Roster> {
    Ok(Roster {
        id: parse_uuid(&r.get::<String, _>("id"))?,
        league_id: parse_uuid(&r.get::<String, _>("league_id"))?,
        user_id: parse_uuid(&r.get::<String, _>("user_id"))?,
    })
}

pub(crate) fn parse_uuid(raw: &str) -> EngineResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| EngineError::Internal(format!("invalid uuid {raw:?}: {e}")))
}

pub(crate) fn parse_opt_uuid(raw: Option<String>) -> EngineResult<Option<Uuid>> {
    match raw {
        Some(s) => Ok(Some(parse_uuid(&s)?)),
        None => Ok(None),
    }
}
