//! Wall-clock playback under tokio's paused test clock.

#![cfg(feature = "realtime")]

mod common;

use std::time::Duration;

use der_dispatch_sim::sim::{PacedSimulation, RunStatus};

#[tokio::test(start_paused = true)]
async fn paced_run_matches_manual_run() {
    let mut paced = PacedSimulation::new(common::baseline_simulation());
    paced.set_speed(10.0).await;
    paced.start().await.expect("start");
    paced.wait().await.expect("paced run");

    let snapshot = paced.snapshot().await;
    assert_eq!(snapshot.status, RunStatus::Complete);

    let mut manual = common::baseline_simulation();
    let history = common::run(&mut manual);
    assert_eq!(common::csv_bytes(&snapshot.history), common::csv_bytes(&history));
}

#[tokio::test(start_paused = true)]
async fn ticks_follow_the_speed_setting() {
    let mut paced = PacedSimulation::new(common::baseline_simulation());
    assert_eq!(paced.set_speed(2.0).await, 2.0);
    paced.start().await.expect("start");

    // 500 ms per tick: five ticks land by 2.6 s
    tokio::time::sleep(Duration::from_millis(2_600)).await;
    assert_eq!(paced.snapshot().await.tick, 5);

    // Clamped to 10 ticks/s. The pending 500 ms wait still lands at 3.0 s,
    // then ticks follow every 100 ms: 3.1 … 3.6 s.
    assert_eq!(paced.set_speed(50.0).await, 10.0);
    tokio::time::sleep(Duration::from_millis(1_050)).await;
    assert_eq!(paced.snapshot().await.tick, 12);

    paced.pause().await.expect("pause");
}

#[tokio::test(start_paused = true)]
async fn no_tick_fires_after_pause() {
    let mut paced = PacedSimulation::new(common::baseline_simulation());
    paced.start().await.expect("start");
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    paced.pause().await.expect("pause");
    let paused_at = paced.snapshot().await.tick;
    assert_eq!(paused_at, 3);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(paced.snapshot().await.tick, paused_at);
    assert_eq!(paced.status().await, RunStatus::Paused);

    // Resuming continues from where playback stopped.
    paced.start().await.expect("resume");
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(paced.snapshot().await.tick, paused_at + 1);
    paced.pause().await.expect("pause again");
}

#[tokio::test(start_paused = true)]
async fn reset_cancels_playback_and_restores_genesis() {
    let mut paced = PacedSimulation::new(common::baseline_simulation());
    paced.start().await.expect("start");
    tokio::time::sleep(Duration::from_millis(4_500)).await;
    paced.reset().await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    let snapshot = paced.snapshot().await;
    assert_eq!(snapshot.tick, 0);
    assert!(snapshot.history.is_empty());
    assert_eq!(snapshot.status, RunStatus::NotStarted);
    paced.wait().await.expect("cancelled task is not an error");
}

#[tokio::test(start_paused = true)]
async fn manual_step_is_rejected_while_running() {
    let mut paced = PacedSimulation::new(common::baseline_simulation());
    paced.start().await.expect("start");
    let shared = paced.simulation();
    assert!(shared.lock().await.step().is_err());
    paced.pause().await.expect("pause");
    assert!(shared.lock().await.step().is_ok());
}
