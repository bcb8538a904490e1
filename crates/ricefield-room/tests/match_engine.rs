//! Integration tests for the match actor.
//!
//! All tests run on a paused clock: the runtime auto-advances time whenever
//! every task is idle, so the match timer fires instantly without real
//! sleeping.

use std::time::Duration;

use ricefield_protocol::{MatchId, PowerupKind, ServerMessage, Username};
use ricefield_room::{
    Board, Cell, EndReason, Item, MatchConfig, MatchPhase, RoomError, spawn_match,
};
use tokio::sync::mpsc;

type Inbox = mpsc::UnboundedReceiver<ServerMessage>;

fn config() -> MatchConfig {
    MatchConfig {
        duration_secs: 100,
        target_score: 50,
        ..MatchConfig::default()
    }
}

/// Board used by most tests: three rice cells, one chaff, one buff on chaff.
fn board() -> Board {
    Board::from_cells(vec![
        Cell::rice(),
        Cell::rice(),
        Cell::rice(),
        Cell::chaff(),
        Cell::chaff().with(PowerupKind::Buff),
    ])
}

fn start(
    board: Board,
    config: MatchConfig,
) -> (
    ricefield_room::MatchHandle,
    tokio::task::JoinHandle<ricefield_room::MatchSummary>,
    Inbox,
    Inbox,
) {
    let (amy_tx, amy_rx) = mpsc::unbounded_channel();
    let (bob_tx, bob_rx) = mpsc::unbounded_channel();
    let (handle, task) = spawn_match(
        MatchId(7),
        [(Username::new("amy"), amy_tx), (Username::new("bob"), bob_tx)],
        board,
        config,
    );
    (handle, task, amy_rx, bob_rx)
}

/// Everything currently queued for one player, as wire lines.
fn drain(rx: &mut Inbox) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        lines.push(msg.to_string());
    }
    lines
}

// =========================================================================
// Start
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_spawn_match_sends_game_started_to_both() {
    let (handle, _task, mut amy, mut bob) = start(board(), config());

    // A snapshot round-trip guarantees the actor has run its start-up.
    handle.snapshot().await.unwrap();

    assert_eq!(drain(&mut amy), vec!["GAME_STARTED:GAME_7,bob,100,0:1:2"]);
    assert_eq!(drain(&mut bob), vec!["GAME_STARTED:GAME_7,amy,100,0:1:2"]);
}

// =========================================================================
// Clicks
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_click_rice_notifies_both_players() {
    let (handle, _task, mut amy, mut bob) = start(board(), config());
    handle.snapshot().await.unwrap();
    drain(&mut amy);
    drain(&mut bob);

    handle.resolve_cell(Username::new("amy"), 1).await.unwrap();
    let snap = handle.snapshot().await.unwrap();

    assert_eq!(drain(&mut amy), vec!["GRAIN_RESULT:1,RICE,1"]);
    assert_eq!(
        drain(&mut bob),
        vec!["OPPONENT_GRAIN_CLICK:1,RICE", "OPPONENT_SCORE:amy,1"]
    );
    assert_eq!(snap.scores, [1, 0]);
    assert_eq!(snap.rice_claimed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_simultaneous_clicks_on_same_rice_award_one_point() {
    let (handle, _task, _amy, _bob) = start(board(), config());
    let other = handle.clone();

    let (a, b) = tokio::join!(
        handle.resolve_cell(Username::new("amy"), 0),
        other.resolve_cell(Username::new("bob"), 0),
    );
    a.unwrap();
    b.unwrap();

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.scores[0] + snap.scores[1], 1);
    assert_eq!(snap.rice_claimed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_pickup_then_use_buff() {
    let (handle, _task, mut amy, mut bob) = start(board(), config());
    handle.snapshot().await.unwrap();
    drain(&mut amy);
    drain(&mut bob);

    handle.resolve_cell(Username::new("bob"), 4).await.unwrap();
    handle.use_item(Username::new("bob"), Item::Buff).await.unwrap();
    handle.use_item(Username::new("bob"), Item::Buff).await.unwrap();
    let snap = handle.snapshot().await.unwrap();

    assert_eq!(
        drain(&mut bob),
        vec!["GRAIN_RESULT:4,CHAFF_BUFF,0", "BUFF_ACTIVATED:+3"]
    );
    assert_eq!(snap.scores, [0, 3]);
    assert_eq!(snap.inventories[1].buffs, 0);
}

// =========================================================================
// End conditions
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_timer_expiry_ends_match_by_score() {
    let (handle, task, mut amy, mut bob) = start(board(), config());
    handle.resolve_cell(Username::new("amy"), 0).await.unwrap();

    // Nothing else happens, so the paused clock jumps to the deadline.
    let summary = task.await.unwrap();

    assert_eq!(summary.reason, EndReason::Timeout);
    assert_eq!(summary.winner, Some(Username::new("amy")));
    assert_eq!(summary.duration, Duration::from_secs(100));
    assert_eq!(drain(&mut amy).last().unwrap(), "GAME_ENDED:amy,1,0");
    assert_eq!(drain(&mut bob).last().unwrap(), "GAME_ENDED:amy,1,0");
}

#[tokio::test(start_paused = true)]
async fn test_all_rice_claimed_ends_before_timer() {
    let (handle, task, mut amy, _bob) = start(board(), config());

    tokio::time::advance(Duration::from_secs(12)).await;
    for cell in 0..3 {
        handle.resolve_cell(Username::new("amy"), cell).await.unwrap();
    }
    let summary = task.await.unwrap();

    assert_eq!(summary.reason, EndReason::AllRiceClaimed);
    assert_eq!(summary.scores, [3, 0]);
    assert_eq!(summary.duration.as_secs(), 12);
    assert_eq!(drain(&mut amy).last().unwrap(), "GAME_ENDED:amy,3,0");
}

#[tokio::test(start_paused = true)]
async fn test_quit_ends_match_and_closes_handle() {
    let (handle, task, mut amy, mut bob) = start(board(), config());
    handle.resolve_cell(Username::new("bob"), 2).await.unwrap();

    handle.quit(Username::new("bob")).await.unwrap();
    let summary = task.await.unwrap();

    assert_eq!(summary.reason, EndReason::Forfeit);
    assert_eq!(summary.winner, Some(Username::new("amy")));
    assert_eq!(drain(&mut amy).last().unwrap(), "GAME_ENDED:QUIT_WIN,0,1");
    assert_eq!(drain(&mut bob).last().unwrap(), "GAME_ENDED:QUIT_LOSS,0,1");

    assert!(handle.is_finished());
    assert!(matches!(
        handle.snapshot().await,
        Err(RoomError::MatchUnavailable(MatchId(7)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_duration_still_starts_match() {
    let config = MatchConfig {
        duration_secs: u64::MAX,
        ..config()
    };
    let (handle, task, _amy, _bob) = start(board(), config);

    handle.resolve_cell(Username::new("amy"), 0).await.unwrap();
    handle.quit(Username::new("bob")).await.unwrap();
    let summary = task.await.unwrap();

    assert_eq!(summary.reason, EndReason::Forfeit);
    assert_eq!(summary.winner, Some(Username::new("amy")));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_settles_match() {
    let (handle, task, _amy, _bob) = start(board(), config());
    drop(handle);

    let summary = task.await.unwrap();

    assert_eq!(summary.winner, None);
    assert_eq!(summary.reason, EndReason::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_player_does_not_stall_match() {
    let (handle, task, amy, _bob) = start(board(), config());
    drop(amy);

    handle.resolve_cell(Username::new("bob"), 0).await.unwrap();
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, MatchPhase::Active);

    let summary = task.await.unwrap();
    assert_eq!(summary.winner, Some(Username::new("bob")));
}
