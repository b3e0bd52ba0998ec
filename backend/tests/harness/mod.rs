//! Shared test fixture: an isolated in-memory league with a running fast
//! auction, a manual clock and a recording event sink.

use std::sync::Arc;

use parking_lot::Mutex;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use uuid::Uuid;

use backend::auction::service::AuctionService;
use backend::clock::ManualClock;
use backend::config::DraftSettings;
use backend::db::schema;
use backend::events::{AuctionEvent, EventKind, EventSink};
use backend::finalizer::RosterMaterializer;
use backend::locks::LockManager;

/// Draft clock origin for every test.
pub const T0: i64 = 1_000_000;

/// Event sink that records everything for assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AuctionEvent>>,
}

impl RecordingSink {
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn snapshot(&self) -> Vec<AuctionEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: AuctionEvent) {
        self.events.lock().push(event);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TestRoster {
    pub roster_id: Uuid,
    pub user_id: Uuid,
}

pub struct TestLeague {
    pub pool: AnyPool,
    pub service: Arc<AuctionService>,
    pub clock: ManualClock,
    pub sink: Arc<RecordingSink>,
    pub draft_id: Uuid,
    pub league_id: Uuid,
    pub rosters: Vec<TestRoster>,
    pub players: Vec<Uuid>,
}

/// Isolated, uniquely-named shared-cache in-memory SQLite database. The
/// unique name keeps parallel tests apart while letting one test's pool
/// share the schema across its connections.
async fn fresh_pool() -> AnyPool {
    sqlx::any::install_default_drivers();

    let db_name = Uuid::new_v4().to_string();
    let conn_str = format!("sqlite:file:{db_name}?mode=memory&cache=shared");

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&conn_str)
        .await
        .unwrap();

    schema::migrate(&pool).await.unwrap();
    pool
}

/// Build a league with `n_rosters` rosters (draft order = creation order)
/// and `n_players` players ranked by ADP, and start a fast auction with the
/// first roster on the clock.
pub async fn setup(n_rosters: usize, n_players: usize, settings: DraftSettings) -> TestLeague {
    let pool = fresh_pool().await;

    let league_id = Uuid::new_v4();
    let draft_id = Uuid::new_v4();

    let mut rosters = Vec::with_capacity(n_rosters);
    for position in 0..n_rosters {
        let roster = TestRoster {
            roster_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };

        sqlx::query(r#"INSERT INTO rosters(id, league_id, user_id) VALUES (?, ?, ?);"#)
            .bind(roster.roster_id.to_string())
            .bind(league_id.to_string())
            .bind(roster.user_id.to_string())
            .execute(&pool)
            .await
            .unwrap();

        sqlx::query(
            r#"INSERT INTO draft_order(draft_id, roster_id, draft_position) VALUES (?, ?, ?);"#,
        )
        .bind(draft_id.to_string())
        .bind(roster.roster_id.to_string())
        .bind(position as i64)
        .execute(&pool)
        .await
        .unwrap();

        rosters.push(roster);
    }

    let mut players = Vec::with_capacity(n_players);
    for rank in 0..n_players {
        let player_id = Uuid::new_v4();
        sqlx::query(r#"INSERT INTO players(id, name, adp) VALUES (?, ?, ?);"#)
            .bind(player_id.to_string())
            .bind(format!("Player {rank}"))
            .bind((rank + 1) as f64)
            .execute(&pool)
            .await
            .unwrap();
        players.push(player_id);
    }

    let first_nominator = rosters[0].roster_id;
    let pick_deadline = T0 + settings.nomination_ms();

    sqlx::query(
        r#"
INSERT INTO drafts(id, league_id, status, draft_type, current_pick, current_roster_id,
                   pick_deadline_ms, settings, created_ms)
VALUES (?, ?, 'in_progress', 'auction', 1, ?, ?, ?, ?);
"#,
    )
    .bind(draft_id.to_string())
    .bind(league_id.to_string())
    .bind(first_nominator.to_string())
    .bind(pick_deadline)
    .bind(serde_json::to_string(&settings).unwrap())
    .bind(T0)
    .execute(&pool)
    .await
    .unwrap();

    let clock = ManualClock::at(T0);
    let sink = Arc::new(RecordingSink::default());

    let service = Arc::new(AuctionService::new(
        pool.clone(),
        Arc::new(LockManager::new()),
        Arc::new(clock.clone()),
        Arc::clone(&sink) as Arc<dyn EventSink>,
        Arc::new(RosterMaterializer),
    ));

    TestLeague {
        pool,
        service,
        clock,
        sink,
        draft_id,
        league_id,
        rosters,
        players,
    }
}

impl TestLeague {
    /// Insert a settled won lot directly, for crafting budget positions.
    pub async fn seed_won_lot(&self, player_id: Uuid, winner: Uuid, price: i64) {
        sqlx::query(
            r#"
INSERT INTO auction_lots(id, draft_id, player_id, nominator_roster_id, current_bid,
                         current_bidder_roster_id, bid_count, bid_deadline_ms, status,
                         winning_roster_id, winning_bid, created_ms, idempotency_key)
VALUES (?, ?, ?, ?, ?, ?, 1, NULL, 'won', ?, ?, ?, NULL);
"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(self.draft_id.to_string())
        .bind(player_id.to_string())
        .bind(winner.to_string())
        .bind(price)
        .bind(winner.to_string())
        .bind(winner.to_string())
        .bind(price)
        .bind(T0 - 10_000)
        .execute(&self.pool)
        .await
        .unwrap();
    }

    pub async fn history_rows(&self, lot_id: Uuid) -> i64 {
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM auction_bid_history WHERE lot_id = ?;"#)
            .bind(lot_id.to_string())
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn lot_count(&self) -> i64 {
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM auction_lots WHERE draft_id = ?;"#)
            .bind(self.draft_id.to_string())
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn draft_status(&self) -> String {
        sqlx::query_scalar(r#"SELECT status FROM drafts WHERE id = ?;"#)
            .bind(self.draft_id.to_string())
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn queue_player(&self, roster_id: Uuid, player_id: Uuid, position: i64) {
        sqlx::query(
            r#"INSERT INTO draft_queues(draft_id, roster_id, player_id, position) VALUES (?, ?, ?, ?);"#,
        )
        .bind(self.draft_id.to_string())
        .bind(roster_id.to_string())
        .bind(player_id.to_string())
        .bind(position)
        .execute(&self.pool)
        .await
        .unwrap();
    }
}
