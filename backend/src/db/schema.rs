use sqlx::AnyPool;

/// Idempotent schema bootstrap.
///
/// UUIDs are stored as TEXT and instants as BIGINT epoch milliseconds so the
/// same statements run on both sqlite (tests, dev) and postgres.
pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    // Drafts
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS drafts (
  id TEXT PRIMARY KEY,
  league_id TEXT NOT NULL,
  status TEXT NOT NULL,
  draft_type TEXT NOT NULL,
  current_pick BIGINT NOT NULL DEFAULT 0,
  current_roster_id TEXT,
  pick_deadline_ms BIGINT,
  settings TEXT NOT NULL DEFAULT '{}',
  created_ms BIGINT NOT NULL,
  completed_ms BIGINT
);
"#,
    )
    .execute(pool)
    .await?;

    // Draft order (immutable once the draft begins)
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS draft_order (
  draft_id TEXT NOT NULL,
  roster_id TEXT NOT NULL,
  draft_position BIGINT NOT NULL,
  PRIMARY KEY (draft_id, draft_position)
);
"#,
    )
    .execute(pool)
    .await?;

    // Rosters (league membership unit)
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS rosters (
  id TEXT PRIMARY KEY,
  league_id TEXT NOT NULL,
  user_id TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Player catalog surface used by auto-nomination
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS players (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  adp DOUBLE PRECISION
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS draft_queues (
  draft_id TEXT NOT NULL,
  roster_id TEXT NOT NULL,
  player_id TEXT NOT NULL,
  position BIGINT NOT NULL,
  PRIMARY KEY (draft_id, roster_id, player_id)
);
"#,
    )
    .execute(pool)
    .await?;

    // Auction lots
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS auction_lots (
  id TEXT PRIMARY KEY,
  draft_id TEXT NOT NULL,
  player_id TEXT NOT NULL,
  nominator_roster_id TEXT NOT NULL,
  current_bid BIGINT NOT NULL,
  current_bidder_roster_id TEXT,
  bid_count BIGINT NOT NULL DEFAULT 0,
  bid_deadline_ms BIGINT,
  status TEXT NOT NULL,
  winning_roster_id TEXT,
  winning_bid BIGINT,
  created_ms BIGINT NOT NULL,
  idempotency_key TEXT
);
"#,
    )
    .execute(pool)
    .await?;

    // A player is never re-auctioned: at most one live (active/won) lot per
    // (draft, player).
    sqlx::query(
        r#"
CREATE UNIQUE INDEX IF NOT EXISTS uq_lots_draft_player_live
ON auction_lots(draft_id, player_id)
WHERE status IN ('active', 'won');
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE UNIQUE INDEX IF NOT EXISTS uq_lots_nomination_idem
ON auction_lots(draft_id, idempotency_key)
WHERE idempotency_key IS NOT NULL;
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_lots_draft_status ON auction_lots(draft_id, status);"#,
    )
    .execute(pool)
    .await?;

    // Proxy bids: one per (lot, roster)
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS auction_proxy_bids (
  id TEXT PRIMARY KEY,
  lot_id TEXT NOT NULL,
  roster_id TEXT NOT NULL,
  max_bid BIGINT NOT NULL,
  is_opening BIGINT NOT NULL DEFAULT 0,
  created_ms BIGINT NOT NULL,
  updated_ms BIGINT NOT NULL,
  UNIQUE (lot_id, roster_id)
);
"#,
    )
    .execute(pool)
    .await?;

    // Append-only bid audit trail, also the idempotency ledger
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS auction_bid_history (
  id TEXT PRIMARY KEY,
  lot_id TEXT NOT NULL,
  roster_id TEXT NOT NULL,
  bid_amount BIGINT NOT NULL,
  is_proxy BIGINT NOT NULL DEFAULT 0,
  idempotency_key TEXT,
  created_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE UNIQUE INDEX IF NOT EXISTS uq_bid_history_idem
ON auction_bid_history(lot_id, roster_id, idempotency_key)
WHERE idempotency_key IS NOT NULL;
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_bid_history_lot ON auction_bid_history(lot_id);"#,
    )
    .execute(pool)
    .await?;

    // Post-completion roster materialization
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS roster_players (
  roster_id TEXT NOT NULL,
  player_id TEXT NOT NULL,
  acquisition_cost BIGINT NOT NULL,
  acquired_ms BIGINT NOT NULL,
  PRIMARY KEY (roster_id, player_id)
);
"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
