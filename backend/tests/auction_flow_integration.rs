mod harness;

use backend::clock::Clock;
use backend::config::DraftSettings;
use backend::error::EngineError;
use backend::events::{AuctionEvent, EventKind};
use backend::lot::model::LotStatus;
use backend::lot::store::LotStore;

use harness::{T0, setup};

#[tokio::test]
async fn nominate_creates_lot_with_opening_bid() {
    let league = setup(3, 5, DraftSettings::default()).await;
    let nominator = league.rosters[0];

    let out = league
        .service
        .nominate(league.draft_id, nominator.user_id, league.players[0], None)
        .await
        .unwrap();

    assert_eq!(out.lot.current_bid, 1);
    assert_eq!(out.lot.current_bidder_roster_id, Some(nominator.roster_id));
    assert_eq!(out.lot.status, LotStatus::Active);
    assert_eq!(out.lot.bid_deadline_ms, Some(T0 + 60_000));
    assert!(!out.replayed);

    // Opening proxy is flagged as engine-placed, not a real bid.
    let mut conn = league.pool.acquire().await.unwrap();
    let proxies = LotStore::proxy_bids_ordered(&mut conn, out.lot.id)
        .await
        .unwrap();
    assert_eq!(proxies.len(), 1);
    assert!(proxies[0].is_opening);
    assert_eq!(proxies[0].max_bid, 1);

    assert_eq!(league.history_rows(out.lot.id).await, 1);
    assert_eq!(league.sink.count(EventKind::LotStarted), 1);
}

#[tokio::test]
async fn nominate_rejects_out_of_turn_and_double_lot() {
    let league = setup(3, 5, DraftSettings::default()).await;

    // Second roster is not on the clock.
    let err = league
        .service
        .nominate(
            league.draft_id,
            league.rosters[1].user_id,
            league.players[0],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    league
        .service
        .nominate(
            league.draft_id,
            league.rosters[0].user_id,
            league.players[0],
            None,
        )
        .await
        .unwrap();

    // A lot is on the block now; a second nomination is invalid even for
    // the nominator.
    let err = league
        .service
        .nominate(
            league.draft_id,
            league.rosters[0].user_id,
            league.players[1],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn nominate_rejects_already_nominated_player() {
    let league = setup(2, 4, DraftSettings::default()).await;
    league.seed_won_lot(league.players[3], league.rosters[1].roster_id, 5).await;

    let err = league
        .service
        .nominate(
            league.draft_id,
            league.rosters[0].user_id,
            league.players[3],
            None,
        )
        .await
        .unwrap_err();

    match err {
        EngineError::Validation(msg) => assert!(msg.contains("already")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn nominate_rejects_unknown_player_and_draft() {
    let league = setup(2, 2, DraftSettings::default()).await;

    let err = league
        .service
        .nominate(
            league.draft_id,
            league.rosters[0].user_id,
            uuid::Uuid::new_v4(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let err = league
        .service
        .nominate(
            uuid::Uuid::new_v4(),
            league.rosters[0].user_id,
            league.players[0],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn nomination_idempotency_key_replays_the_same_lot() {
    let league = setup(3, 5, DraftSettings::default()).await;
    let nominator = league.rosters[0];
    let key = Some("nom-retry-1".to_string());

    let first = league
        .service
        .nominate(
            league.draft_id,
            nominator.user_id,
            league.players[0],
            key.clone(),
        )
        .await
        .unwrap();

    let second = league
        .service
        .nominate(league.draft_id, nominator.user_id, league.players[0], key)
        .await
        .unwrap();

    assert!(second.replayed);
    assert_eq!(first.lot.id, second.lot.id);
    assert_eq!(league.lot_count().await, 1);
    assert_eq!(league.history_rows(first.lot.id).await, 1);
    // The replay publishes nothing.
    assert_eq!(league.sink.count(EventKind::LotStarted), 1);
}

#[tokio::test]
async fn pause_freezes_clocks_and_resume_rearms_them() {
    let league = setup(2, 4, DraftSettings::default()).await;
    let nominator = league.rosters[0];

    let lot = league
        .service
        .nominate(league.draft_id, nominator.user_id, league.players[0], None)
        .await
        .unwrap()
        .lot;

    league.service.pause_draft(league.draft_id).await.unwrap();

    // Bidding on a paused lot is rejected with the pause message.
    let err = league
        .service
        .set_max_bid(
            league.draft_id,
            league.rosters[1].user_id,
            lot.id,
            10,
            None,
        )
        .await
        .unwrap_err();
    match err {
        EngineError::Validation(msg) => assert!(msg.contains("paused")),
        other => panic!("expected validation error, got {other:?}"),
    }

    // Far-future scan finds nothing: NULL deadlines never expire.
    league.clock.advance(3_600_000);
    let monitor = backend::monitor::DeadlineMonitor::new(
        league.service.clone(),
        &backend::config::AppConfig {
            database_url: String::new(),
            monitor_tick_ms: 1_000,
            monitor_batch_limit: 64,
        },
    );
    let summary = monitor.scan_once().await.unwrap();
    assert!(summary.is_empty());

    league.service.resume_draft(league.draft_id).await.unwrap();

    let mut conn = league.pool.acquire().await.unwrap();
    let resumed = LotStore::fetch(&mut conn, lot.id).await.unwrap().unwrap();
    let now = league.clock.now_ms();
    assert_eq!(resumed.bid_deadline_ms, Some(now + 15_000));

    // Bidding works again.
    league
        .service
        .set_max_bid(
            league.draft_id,
            league.rosters[1].user_id,
            lot.id,
            10,
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn get_state_reports_lot_nominator_and_budgets() {
    let league = setup(2, 4, DraftSettings::default()).await;
    let nominator = league.rosters[0];

    league.seed_won_lot(league.players[3], nominator.roster_id, 40).await;

    let lot = league
        .service
        .nominate(league.draft_id, nominator.user_id, league.players[0], None)
        .await
        .unwrap()
        .lot;

    let state = league.service.get_state(league.draft_id).await.unwrap();

    assert_eq!(state.active_lot.as_ref().map(|l| l.id), Some(lot.id));
    assert_eq!(
        state.current_nominator_roster_id,
        Some(nominator.roster_id)
    );
    assert_eq!(state.nomination_number, 1);
    assert_eq!(state.budgets.len(), 2);

    let line = state
        .budgets
        .iter()
        .find(|b| b.roster_id == nominator.roster_id)
        .unwrap();
    assert_eq!(line.spent, 40);
    assert_eq!(line.won_count, 1);
    assert_eq!(line.leading_commitment, 1, "leads own nomination at $1");
    // 200 - 40 spent - 13 reserve - 1 leading = 146
    assert_eq!(line.max_affordable, 146);

    let nominator_info = league
        .service
        .get_current_nominator(league.draft_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(nominator_info.roster_id, nominator.roster_id);
    assert_eq!(nominator_info.user_id, nominator.user_id);
}

#[tokio::test]
async fn tiny_draft_runs_to_completion() {
    // Two rosters, one slot each, two players: each roster wins one lot and
    // the draft completes on its own timers.
    let settings = DraftSettings {
        roster_slots: 1,
        ..DraftSettings::default()
    };
    let league = setup(2, 2, settings).await;

    let monitor = backend::monitor::DeadlineMonitor::new(
        league.service.clone(),
        &backend::config::AppConfig {
            database_url: String::new(),
            monitor_tick_ms: 1_000,
            monitor_batch_limit: 64,
        },
    );

    // r1 nominates, r2 outbids and wins at expiry.
    let lot = league
        .service
        .nominate(
            league.draft_id,
            league.rosters[0].user_id,
            league.players[0],
            None,
        )
        .await
        .unwrap()
        .lot;
    league
        .service
        .set_max_bid(
            league.draft_id,
            league.rosters[1].user_id,
            lot.id,
            50,
            None,
        )
        .await
        .unwrap();

    league.clock.advance(61_000);
    monitor.scan_once().await.unwrap();

    let mut conn = league.pool.acquire().await.unwrap();
    let settled = LotStore::fetch(&mut conn, lot.id).await.unwrap().unwrap();
    assert_eq!(settled.status, LotStatus::Won);
    assert_eq!(
        settled.winning_roster_id,
        Some(league.rosters[1].roster_id)
    );
    assert_eq!(settled.winning_bid, Some(2), "second price: 1 + increment");
    drop(conn);

    // Rotation moved to r1 (r2's roster is full now).
    let state = league.service.get_state(league.draft_id).await.unwrap();
    assert_eq!(
        state.current_nominator_roster_id,
        Some(league.rosters[0].roster_id)
    );

    // r1 nominates the last player and raises their own ceiling, becoming a
    // real bidder rather than just the engine's opening proxy.
    let lot2 = league
        .service
        .nominate(
            league.draft_id,
            league.rosters[0].user_id,
            league.players[1],
            None,
        )
        .await
        .unwrap()
        .lot;
    league
        .service
        .set_max_bid(
            league.draft_id,
            league.rosters[0].user_id,
            lot2.id,
            5,
            None,
        )
        .await
        .unwrap();

    league.clock.advance(61_000);
    monitor.scan_once().await.unwrap();

    let mut conn = league.pool.acquire().await.unwrap();
    let second = LotStore::fetch(&mut conn, lot2.id).await.unwrap().unwrap();
    assert_eq!(second.status, LotStatus::Won);
    assert_eq!(
        second.winning_roster_id,
        Some(league.rosters[0].roster_id)
    );
    assert_eq!(second.winning_bid, Some(1), "uncontested price stays at the floor");
    drop(conn);

    // Every roster is full and every player sold: the rotation after that
    // settlement completed the draft.
    assert_eq!(league.draft_status().await, "completed");
    assert_eq!(league.sink.count(EventKind::DraftCompleted), 1);

    // Completion materialized both wins onto rosters.
    for roster in &league.rosters {
        let materialized: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM roster_players WHERE roster_id = ?;"#)
                .bind(roster.roster_id.to_string())
                .fetch_one(&league.pool)
                .await
                .unwrap();
        assert_eq!(materialized, 1);
    }
}

#[tokio::test]
async fn completed_draft_rejects_nominations() {
    let league = setup(2, 2, DraftSettings::default()).await;

    sqlx::query(r#"UPDATE drafts SET status = 'completed' WHERE id = ?;"#)
        .bind(league.draft_id.to_string())
        .execute(&league.pool)
        .await
        .unwrap();

    let err = league
        .service
        .nominate(
            league.draft_id,
            league.rosters[0].user_id,
            league.players[0],
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn events_fire_in_commit_order() {
    let league = setup(2, 3, DraftSettings::default()).await;

    league
        .service
        .nominate(
            league.draft_id,
            league.rosters[0].user_id,
            league.players[0],
            None,
        )
        .await
        .unwrap();

    let events = league.sink.snapshot();
    assert!(matches!(
        events.first(),
        Some(AuctionEvent::LotStarted {
            is_auto_nomination: false,
            ..
        })
    ));
}
