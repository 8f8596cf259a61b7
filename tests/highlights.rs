mod support;

use serde_json::json;
use spreadsheet_agent::{AgentConfig, AppState, Workbook};
use std::time::Duration;
use support::builders::available;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn pump_clears_highlights_on_their_deadline() {
    let mut state = AppState::new(AgentConfig::default());
    let origin = state.active_id().clone();
    let cancel = state.stream_token();
    let (tx, mut rx) = mpsc::channel(8);

    let producer = tokio::spawn(async move {
        tx.send(available("h1", "write_cell", json!({"row": 0, "col": 0, "value": "x"})))
            .await
            .expect("send event");
        sleep(Duration::from_secs(5)).await;
    });

    let started = Instant::now();
    let summary = state.pump(origin, &mut rx, cancel).await;
    producer.await.expect("producer finished");

    assert_eq!(summary.executed, 1);
    assert!(!summary.cancelled);
    assert!(started.elapsed() >= Duration::from_secs(5));
    let session = state.active_session();
    assert!(session.highlights().is_empty());
    assert!(session.workbook().format(0, 0, 0).expect("format").is_default());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn rewriting_a_cell_extends_its_highlight() {
    let mut state = AppState::new(AgentConfig::default());
    let origin = state.active_id().clone();
    let write = |id: &str| available(id, "write_cell", json!({"row": 2, "col": 2, "value": id}));

    state.observe(&origin, &write("a"));
    sleep(Duration::from_millis(1_000)).await;
    state.observe(&origin, &write("b"));
    assert_eq!(state.active_session().highlights().len(), 1);

    sleep(Duration::from_millis(1_000)).await;
    state.tick(Instant::now());
    assert!(state.active_session().highlights().is_highlighted(0, 2, 2));

    state.settle().await;
    assert!(state.active_session().highlights().is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn starting_a_session_cancels_the_running_pump() {
    let mut state = AppState::new(AgentConfig::default());
    let origin = state.active_id().clone();
    let cancel = state.stream_token();
    let (_tx, mut rx) = mpsc::channel(8);

    // Simulates the user starting a new chat while the stream is open.
    cancel.cancel();
    let summary = state.pump(origin, &mut rx, cancel).await;
    assert!(summary.cancelled);
    assert_eq!(summary.executed, 0);

    let previous = state.stream_token();
    state.start_session();
    assert!(previous.is_cancelled());
}
