//! Integration tests for the auto-sync scheduler, run against a paused
//! tokio clock so intervals and debounce windows elapse instantly.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{form_data, sample_schema, MockSink, TestStack};
use formsync::prelude::*;

const SCHEDULE: ScheduleConfig = ScheduleConfig {
    startup_delay: Duration::from_secs(2),
    online_debounce: Duration::from_secs(3),
    sync_interval: Duration::from_secs(120),
};

fn scheduler(
    stack: &TestStack,
    sink: &Arc<MockSink>,
    connectivity: &Connectivity,
) -> AutoSyncScheduler<MockSink> {
    let engine = stack.engine(Arc::clone(sink), connectivity.clone());
    AutoSyncScheduler::new(engine, connectivity.clone(), SCHEDULE.clone())
}

#[tokio::test(start_paused = true)]
async fn test_startup_sync_fires_when_online() -> anyhow::Result<()> {
    let stack = TestStack::new()?;
    let id = stack
        .repo
        .create(&sample_schema(), form_data(&[("name", "Ann")]))?;

    let sink = Arc::new(MockSink::new());
    let connectivity = Connectivity::new(true);
    let scheduler = scheduler(&stack, &sink, &connectivity);
    scheduler.start();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(sink.call_count(), 1);
    assert_eq!(stack.repo.get(&id)?.unwrap().synced, SyncState::Synced);

    scheduler.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_startup_sync_skipped_while_offline() -> anyhow::Result<()> {
    let stack = TestStack::new()?;
    stack
        .repo
        .create(&sample_schema(), form_data(&[("name", "Ann")]))?;

    let sink = Arc::new(MockSink::new());
    let connectivity = Connectivity::new(false);
    let scheduler = scheduler(&stack, &sink, &connectivity);
    scheduler.start();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(sink.call_count(), 0);

    scheduler.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_interval_sync_repeats() -> anyhow::Result<()> {
    let stack = TestStack::new()?;

    let sink = Arc::new(MockSink::new());
    let connectivity = Connectivity::new(true);
    let scheduler = scheduler(&stack, &sink, &connectivity);
    scheduler.start();

    // A pending submission appears after startup already synced everything.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let id = stack
        .repo
        .create(&sample_schema(), form_data(&[("name", "Ann")]))?;

    // The next interval tick picks it up.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(stack.repo.get(&id)?.unwrap().synced, SyncState::Synced);

    scheduler.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_sync_waits_out_the_debounce() -> anyhow::Result<()> {
    let stack = TestStack::new()?;

    let sink = Arc::new(MockSink::new());
    let connectivity = Connectivity::new(false);
    let scheduler = scheduler(&stack, &sink, &connectivity);
    scheduler.start();

    let id = stack
        .repo
        .create(&sample_schema(), form_data(&[("name", "Ann")]))?;

    // Let the startup window pass while still offline.
    tokio::time::sleep(Duration::from_secs(5)).await;
    connectivity.set_online(true);

    // Inside the debounce window nothing has happened yet.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(stack.repo.get(&id)?.unwrap().synced, SyncState::Pending);

    // Once the network has been stable for the window, the sync runs.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(stack.repo.get(&id)?.unwrap().synced, SyncState::Synced);

    scheduler.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_flapping_network_restarts_the_debounce() -> anyhow::Result<()> {
    let stack = TestStack::new()?;
    stack
        .repo
        .create(&sample_schema(), form_data(&[("name", "Ann")]))?;

    let sink = Arc::new(MockSink::new());
    let connectivity = Connectivity::new(false);
    let scheduler = scheduler(&stack, &sink, &connectivity);
    scheduler.start();

    // Let the startup window pass while still offline.
    tokio::time::sleep(Duration::from_secs(5)).await;

    // Flap: online, offline again before the debounce elapses.
    connectivity.set_online(true);
    tokio::time::sleep(Duration::from_secs(2)).await;
    connectivity.set_online(false);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(sink.call_count(), 0);

    // A stable reconnect finally syncs.
    connectivity.set_online(true);
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(sink.call_count(), 1);

    scheduler.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_prevents_further_syncs() -> anyhow::Result<()> {
    let stack = TestStack::new()?;

    let sink = Arc::new(MockSink::new());
    let connectivity = Connectivity::new(true);
    let scheduler = scheduler(&stack, &sink, &connectivity);
    scheduler.start();
    scheduler.stop();

    stack
        .repo
        .create(&sample_schema(), form_data(&[("name", "Ann")]))?;
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(sink.call_count(), 0);

    // Stopping twice is harmless.
    scheduler.stop();
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_sync_after_submit_is_immediate() -> anyhow::Result<()> {
    let stack = TestStack::new()?;

    let sink = Arc::new(MockSink::new());
    let connectivity = Connectivity::new(true);
    let scheduler = scheduler(&stack, &sink, &connectivity);

    let id = stack
        .repo
        .create(&sample_schema(), form_data(&[("name", "Ann")]))?;
    scheduler.sync_after_submit();

    // Yield so the fire-and-forget task runs; no timers involved.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(stack.repo.get(&id)?.unwrap().synced, SyncState::Synced);

    Ok(())
}
