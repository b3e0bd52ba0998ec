use std::collections::HashMap;

use sqlx::Row;
use sqlx::any::AnyRow;
use sqlx::AnyConnection;
use uuid::Uuid;

use crate::draft::store::{parse_opt_uuid, parse_uuid};
use crate::error::EngineResult;
use crate::lot::model::{AuctionLot, BidHistoryEntry, LotStatus, ProxyBid};
use crate::pricing::BudgetSnapshot;

const LOT_COLUMNS: &str = r#"
id, draft_id, player_id, nominator_roster_id, current_bid,
current_bidder_roster_id, bid_count, bid_deadline_ms, status,
winning_roster_id, winning_bid, created_ms, idempotency_key
"#;

/// Persistence for lots, proxy bids and bid history.
///
/// Mutating methods are only ever called under `AUCTION(lot_id)` or
/// `DRAFT(draft_id)`; the CAS predicate on the price update is the
/// belt-and-suspenders for any path that skips the lock.
pub struct LotStore;

impl LotStore {
    pub async fn fetch(conn: &mut AnyConnection, lot_id: Uuid) -> EngineResult<Option<AuctionLot>> {
        let sql = format!("SELECT {LOT_COLUMNS} FROM auction_lots WHERE id = ?;");
        let row = sqlx::query(&sql)
            .bind(lot_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_lot(&r)?)),
            None => Ok(None),
        }
    }

    /// The draft's single active lot, if one is on the block.
    pub async fn active_lot(
        conn: &mut AnyConnection,
        draft_id: Uuid,
    ) -> EngineResult<Option<AuctionLot>> {
        let sql =
            format!("SELECT {LOT_COLUMNS} FROM auction_lots WHERE draft_id = ? AND status = 'active';");
        let row = sqlx::query(&sql)
            .bind(draft_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_lot(&r)?)),
            None => Ok(None),
        }
    }

    /// Replay lookup for nomination idempotency keys.
    pub async fn fetch_by_idempotency_key(
        conn: &mut AnyConnection,
        draft_id: Uuid,
        key: &str,
    ) -> EngineResult<Option<AuctionLot>> {
        let sql = format!(
            "SELECT {LOT_COLUMNS} FROM auction_lots WHERE draft_id = ? AND idempotency_key = ?;"
        );
        let row = sqlx::query(&sql)
            .bind(draft_id.to_string())
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_lot(&r)?)),
            None => Ok(None),
        }
    }

    /// A player with an active or won lot is off the board.
    pub async fn live_lot_for_player(
        conn: &mut AnyConnection,
        draft_id: Uuid,
        player_id: Uuid,
    ) -> EngineResult<Option<AuctionLot>> {
        let sql = format!(
            r#"
SELECT {LOT_COLUMNS}
FROM auction_lots
WHERE draft_id = ? AND player_id = ? AND status IN ('active', 'won');
"#
        );
        let row = sqlx::query(&sql)
            .bind(draft_id.to_string())
            .bind(player_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_lot(&r)?)),
            None => Ok(None),
        }
    }

    /// Raw insert; callers map unique violations (player already live,
    /// idempotency-key collision) onto domain errors.
    pub async fn insert(conn: &mut AnyConnection, lot: &AuctionLot) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
INSERT INTO auction_lots(
  id, draft_id, player_id, nominator_roster_id, current_bid,
  current_bidder_roster_id, bid_count, bid_deadline_ms, status,
  winning_roster_id, winning_bid, created_ms, idempotency_key
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(lot.id.to_string())
        .bind(lot.draft_id.to_string())
        .bind(lot.player_id.to_string())
        .bind(lot.nominator_roster_id.to_string())
        .bind(lot.current_bid)
        .bind(lot.current_bidder_roster_id.map(|r| r.to_string()))
        .bind(lot.bid_count)
        .bind(lot.bid_deadline_ms)
        .bind(lot.status.as_str())
        .bind(lot.winning_roster_id.map(|r| r.to_string()))
        .bind(lot.winning_bid)
        .bind(lot.created_ms)
        .bind(lot.idempotency_key.as_deref())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Guarded price/leader update.
    ///
    /// The predicate carries the previously observed price and leader so a
    /// write that lost a race fails loudly (zero rows) instead of
    /// corrupting the lot. Returns whether the row was updated.
    pub async fn cas_update_price(
        conn: &mut AnyConnection,
        lot_id: Uuid,
        observed_bid: i64,
        observed_bidder: Option<Uuid>,
        new_bid: i64,
        new_bidder: Uuid,
        new_bid_count: i64,
    ) -> EngineResult<bool> {
        let res = sqlx::query(
            r#"
UPDATE auction_lots
SET current_bid = ?, current_bidder_roster_id = ?, bid_count = ?
WHERE id = ?
  AND current_bid = ?
  AND COALESCE(current_bidder_roster_id, '') = ?
  AND status = 'active';
"#,
        )
        .bind(new_bid)
        .bind(new_bidder.to_string())
        .bind(new_bid_count)
        .bind(lot_id.to_string())
        .bind(observed_bid)
        .bind(observed_bidder.map(|r| r.to_string()).unwrap_or_default())
        .execute(&mut *conn)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    /// Install the nominator as opening bidder on a freshly created lot.
    pub async fn set_opening_bidder(
        conn: &mut AnyConnection,
        lot_id: Uuid,
        roster_id: Uuid,
    ) -> EngineResult<()> {
        sqlx::query(
            r#"
UPDATE auction_lots
SET current_bidder_roster_id = ?
WHERE id = ? AND status = 'active';
"#,
        )
        .bind(roster_id.to_string())
        .bind(lot_id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn extend_deadline(
        conn: &mut AnyConnection,
        lot_id: Uuid,
        new_deadline_ms: i64,
    ) -> EngineResult<()> {
        sqlx::query(
            r#"
UPDATE auction_lots
SET bid_deadline_ms = ?
WHERE id = ? AND status = 'active';
"#,
        )
        .bind(new_deadline_ms)
        .bind(lot_id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// NULL the active lot's clock on pause; restore it on resume.
    pub async fn set_active_deadline(
        conn: &mut AnyConnection,
        draft_id: Uuid,
        deadline_ms: Option<i64>,
    ) -> EngineResult<()> {
        sqlx::query(
            r#"
UPDATE auction_lots
SET bid_deadline_ms = ?
WHERE draft_id = ? AND status = 'active';
"#,
        )
        .bind(deadline_ms)
        .bind(draft_id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Terminal transition to `won`/`passed`; no-op if the lot already left
    /// `active` (idempotent under monitor retries).
    pub async fn settle(
        conn: &mut AnyConnection,
        lot_id: Uuid,
        status: LotStatus,
        winning_roster_id: Option<Uuid>,
        winning_bid: Option<i64>,
    ) -> EngineResult<bool> {
        let res = sqlx::query(
            r#"
UPDATE auction_lots
SET status = ?, winning_roster_id = ?, winning_bid = ?, bid_deadline_ms = NULL
WHERE id = ? AND status = 'active';
"#,
        )
        .bind(status.as_str())
        .bind(winning_roster_id.map(|r| r.to_string()))
        .bind(winning_bid)
        .bind(lot_id.to_string())
        .execute(&mut *conn)
        .await?;

        Ok(res.rows_affected() == 1)
    }

    /// Active lots whose clock has run out.
    pub async fn expired_lots(
        conn: &mut AnyConnection,
        now_ms: i64,
        limit: i64,
    ) -> EngineResult<Vec<(Uuid, Uuid)>> {
        let rows = sqlx::query(
            r#"
SELECT id, draft_id
FROM auction_lots
WHERE status = 'active'
  AND bid_deadline_ms IS NOT NULL
  AND bid_deadline_ms <= ?
ORDER BY bid_deadline_ms ASC
LIMIT ?;
"#,
        )
        .bind(now_ms)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push((
                parse_uuid(&r.get::<String, _>("id"))?,
                parse_uuid(&r.get::<String, _>("draft_id"))?,
            ));
        }
        Ok(out)
    }

    pub async fn won_lots(
        conn: &mut AnyConnection,
        draft_id: Uuid,
    ) -> EngineResult<Vec<AuctionLot>> {
        let sql = format!(
            r#"
SELECT {LOT_COLUMNS}
FROM auction_lots
WHERE draft_id = ? AND status = 'won'
ORDER BY created_ms ASC;
"#
        );
        let rows = sqlx::query(&sql)
            .bind(draft_id.to_string())
            .fetch_all(&mut *conn)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(row_to_lot(&r)?);
        }
        Ok(out)
    }

    /* =========================
    Proxy bids
    ========================= */

    /// All proxy bids on a lot in resolution order: highest max first, ties
    /// to the earliest insertion.
    pub async fn proxy_bids_ordered(
        conn: &mut AnyConnection,
        lot_id: Uuid,
    ) -> EngineResult<Vec<ProxyBid>> {
        let rows = sqlx::query(
            r#"
SELECT id, lot_id, roster_id, max_bid, is_opening, created_ms, updated_ms
FROM auction_proxy_bids
WHERE lot_id = ?
ORDER BY max_bid DESC, created_ms ASC, id ASC;
"#,
        )
        .bind(lot_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(row_to_proxy(&r)?);
        }
        Ok(out)
    }

    pub async fn proxy_for(
        conn: &mut AnyConnection,
        lot_id: Uuid,
        roster_id: Uuid,
    ) -> EngineResult<Option<ProxyBid>> {
        let row = sqlx::query(
            r#"
SELECT id, lot_id, roster_id, max_bid, is_opening, created_ms, updated_ms
FROM auction_proxy_bids
WHERE lot_id = ? AND roster_id = ?;
"#,
        )
        .bind(lot_id.to_string())
        .bind(roster_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(r) => Ok(Some(row_to_proxy(&r)?)),
            None => Ok(None),
        }
    }

    /// Insert or raise a bidder's stored maximum. The upsert keeps
    /// `created_ms` from the first insertion so tie-breaking stays stable
    /// across raises.
    pub async fn upsert_proxy(
        conn: &mut AnyConnection,
        lot_id: Uuid,
        roster_id: Uuid,
        max_bid: i64,
        is_opening: bool,
        now_ms: i64,
    ) -> EngineResult<()> {
        sqlx::query(
            r#"
INSERT INTO auction_proxy_bids(id, lot_id, roster_id, max_bid, is_opening, created_ms, updated_ms)
VALUES (?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (lot_id, roster_id) DO UPDATE
SET max_bid = excluded.max_bid,
    is_opening = excluded.is_opening,
    updated_ms = excluded.updated_ms;
"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(lot_id.to_string())
        .bind(roster_id.to_string())
        .bind(max_bid)
        .bind(i64::from(is_opening))
        .bind(now_ms)
        .bind(now_ms)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Remove a bidder from settlement consideration (fallback walk only;
    /// never used while a lot is live).
    pub async fn delete_proxy(
        conn: &mut AnyConnection,
        lot_id: Uuid,
        roster_id: Uuid,
    ) -> EngineResult<()> {
        sqlx::query(r#"DELETE FROM auction_proxy_bids WHERE lot_id = ? AND roster_id = ?;"#)
            .bind(lot_id.to_string())
            .bind(roster_id.to_string())
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /* =========================
    Bid history
    ========================= */

    /// Prior history row for the same `(lot, roster, idempotency_key)`,
    /// marking the request a replay.
    pub async fn history_replay(
        conn: &mut AnyConnection,
        lot_id: Uuid,
        roster_id: Uuid,
        key: &str,
    ) -> EngineResult<bool> {
        let row = sqlx::query(
            r#"
SELECT 1 AS hit
FROM auction_bid_history
WHERE lot_id = ? AND roster_id = ? AND idempotency_key = ?;
"#,
        )
        .bind(lot_id.to_string())
        .bind(roster_id.to_string())
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.is_some())
    }

    /// Append an audit row. A duplicate idempotency key is silently ignored
    /// so replays never error and never double-append.
    pub async fn append_history(
        conn: &mut AnyConnection,
        lot_id: Uuid,
        roster_id: Uuid,
        bid_amount: i64,
        is_proxy: bool,
        idempotency_key: Option<&str>,
        now_ms: i64,
    ) -> EngineResult<()> {
        sqlx::query(
            r#"
INSERT INTO auction_bid_history(id, lot_id, roster_id, bid_amount, is_proxy, idempotency_key, created_ms)
VALUES (?, ?, ?, ?, ?, ?, ?)
ON CONFLICT DO NOTHING;
"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(lot_id.to_string())
        .bind(roster_id.to_string())
        .bind(bid_amount)
        .bind(i64::from(is_proxy))
        .bind(idempotency_key)
        .bind(now_ms)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn history_for_lot(
        conn: &mut AnyConnection,
        lot_id: Uuid,
    ) -> EngineResult<Vec<BidHistoryEntry>> {
        let rows = sqlx::query(
            r#"
SELECT id, lot_id, roster_id, bid_amount, is_proxy, idempotency_key, created_ms
FROM auction_bid_history
WHERE lot_id = ?
ORDER BY created_ms ASC, id ASC;
"#,
        )
        .bind(lot_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(BidHistoryEntry {
                id: parse_uuid(&r.get::<String, _>("id"))?,
                lot_id: parse_uuid(&r.get::<String, _>("lot_id"))?,
                roster_id: parse_uuid(&r.get::<String, _>("roster_id"))?,
                bid_amount: r.get("bid_amount"),
                is_proxy: r.get::<i64, _>("is_proxy") != 0,
                idempotency_key: r.get("idempotency_key"),
                created_ms: r.get("created_ms"),
            });
        }
        Ok(out)
    }

    /* =========================
    Budget snapshots
    ========================= */

    /// Derived spend position for one roster, computed from committed lots.
    pub async fn budget_snapshot(
        conn: &mut AnyConnection,
        draft_id: Uuid,
        roster_id: Uuid,
    ) -> EngineResult<BudgetSnapshot> {
        let won = sqlx::query(
            r#"
SELECT CAST(COALESCE(SUM(winning_bid), 0) AS BIGINT) AS spent,
       COUNT(*) AS won_count
FROM auction_lots
WHERE draft_id = ? AND winning_roster_id = ? AND status = 'won';
"#,
        )
        .bind(draft_id.to_string())
        .bind(roster_id.to_string())
        .fetch_one(&mut *conn)
        .await?;

        let leading = sqlx::query(
            r#"
SELECT CAST(COALESCE(SUM(current_bid), 0) AS BIGINT) AS leading_commitment
FROM auction_lots
WHERE draft_id = ? AND current_bidder_roster_id = ? AND status = 'active';
"#,
        )
        .bind(draft_id.to_string())
        .bind(roster_id.to_string())
        .fetch_one(&mut *conn)
        .await?;

        Ok(BudgetSnapshot {
            spent: won.get("spent"),
            won_count: won.get("won_count"),
            leading_commitment: leading.get("leading_commitment"),
        })
    }

    /// Snapshots for every roster with activity in the draft. Rosters with
    /// no lots yet simply have no entry (treated as a default snapshot).
    pub async fn budget_snapshots(
        conn: &mut AnyConnection,
        draft_id: Uuid,
    ) -> EngineResult<HashMap<Uuid, BudgetSnapshot>> {
        let mut out: HashMap<Uuid, BudgetSnapshot> = HashMap::new();

        let won_rows = sqlx::query(
            r#"
SELECT winning_roster_id,
       CAST(COALESCE(SUM(winning_bid), 0) AS BIGINT) AS spent,
       COUNT(*) AS won_count
FROM auction_lots
WHERE draft_id = ? AND status = 'won' AND winning_roster_id IS NOT NULL
GROUP BY winning_roster_id;
"#,
        )
        .bind(draft_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        for r in won_rows {
            let roster = parse_uuid(&r.get::<String, _>("winning_roster_id"))?;
            let snap = out.entry(roster).or_default();
            snap.spent = r.get("spent");
            snap.won_count = r.get("won_count");
        }

        let leading_rows = sqlx::query(
            r#"
SELECT current_bidder_roster_id,
       CAST(COALESCE(SUM(current_bid), 0) AS BIGINT) AS leading_commitment
FROM auction_lots
WHERE draft_id = ? AND status = 'active' AND current_bidder_roster_id IS NOT NULL
GROUP BY current_bidder_roster_id;
"#,
        )
        .bind(draft_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

        for r in leading_rows {
            let roster = parse_uuid(&r.get::<String, _>("current_bidder_roster_id"))?;
            out.entry(roster).or_default().leading_commitment = r.get("leading_commitment");
        }

        Ok(out)
    }
}

/* =========================
Row mapping
========================= */

fn row_to_lot(r: &AnyRow) -> EngineResult<AuctionLot> {
    Ok(AuctionLot {
        id: parse_uuid(&r.get::<String, _>("id"))?,
        draft_id: parse_uuid(&r.get::<String, _>("draft_id"))?,
        player_id: parse_uuid(&r.get::<String, _>("player_id"))?,
        nominator_roster_id: parse_uuid(&r.get::<String, _>("nominator_roster_id"))?,
        current_bid: r.get("current_bid"),
        current_bidder_roster_id: parse_opt_uuid(
            r.get::<Option<String>, _>("current_bidder_roster_id"),
        )?,
        bid_count: r.get("bid_count"),
        bid_deadline_ms: r.get("bid_deadline_ms"),
        status: LotStatus::parse(&r.get::<String, _>("status"))?,
        winning_roster_id: parse_opt_uuid(r.get::<Option<String>, _>("winning_roster_id"))?,
        winning_bid: r.get("winning_bid"),
        created_ms: r.get("created_ms"),
        idempotency_key: r.get("idempotency_key"),
    })
}

fn row_to_proxy(r: &AnyRow) -> EngineResult<ProxyBid> {
    Ok(ProxyBid {
        id: parse_uuid(&r.get::<String, _>("id"))?,
        lot_id: parse_uuid(&r.get::<String, _>("lot_id"))?,
        roster_id: parse_uuid(&r.get::<String, _>("roster_id"))?,
        max_bid: r.get("max_bid"),
        is_opening: r.get::<i64, _>("is_opening") != 0,
        created_ms: r.get("created_ms"),
        updated_ms: r.get("updated_ms"),
    })
}
