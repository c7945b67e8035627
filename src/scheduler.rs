//! Connectivity tracking and automatic sync scheduling.
//!
//! The scheduler decides *when* to invoke the sync engine: shortly after
//! startup, on reconnect (debounced while the network stabilizes), on a
//! fixed interval, and immediately after a new submission. It is an
//! explicit instance with a `start`/`stop` lifecycle; all timers and
//! listeners are fields, not module globals.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::logging;
use crate::sync::{RemoteSink, SyncEngine, SyncTrigger};

/// Process-wide online/offline signal, driven by the embedding application
/// (platform network monitors, reachability probes). Cheap to clone.
#[derive(Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Report a connectivity change. Subscribers only wake on actual
    /// transitions, not on repeated reports of the same state.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    /// Subscribe to connectivity transitions.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    /// Online until told otherwise.
    fn default() -> Self {
        Self::new(true)
    }
}

/// Timing knobs for the scheduler, normally taken from
/// [`SyncConfig`](crate::config::SyncConfig).
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Delay before the initial sync after `start()`.
    pub startup_delay: Duration,
    /// Quiet period after an online transition before syncing.
    pub online_debounce: Duration,
    /// Fixed period between background syncs.
    pub sync_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(2),
            online_debounce: Duration::from_secs(3),
            sync_interval: Duration::from_secs(120),
        }
    }
}

/// Drives the sync engine on its four triggers: startup, reconnect,
/// interval, and after-submit.
pub struct AutoSyncScheduler<S: RemoteSink> {
    engine: Arc<SyncEngine<S>>,
    connectivity: Connectivity,
    config: ScheduleConfig,
    shutdown: watch::Sender<bool>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl<S: RemoteSink> AutoSyncScheduler<S> {
    pub fn new(
        engine: Arc<SyncEngine<S>>,
        connectivity: Connectivity,
        config: ScheduleConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            engine,
            connectivity,
            config,
            shutdown,
            tasks: std::sync::Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Start the background triggers. Idempotent; a second call while
    /// running is a no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        logging::info!("auto-sync scheduler started");

        let handles = vec![
            self.spawn_startup_sync(),
            self.spawn_interval_sync(),
            self.spawn_reconnect_sync(),
        ];
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.extend(handles);
        }
    }

    /// Stop scheduling new syncs.
    ///
    /// Waiting timers and the reconnect listener wind down; a sync already
    /// in flight is not aborted - it completes and nothing further is
    /// scheduled. Idempotent.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let _ = self.shutdown.send(true);
        logging::info!("auto-sync scheduler stopped");
    }

    /// Fire-and-forget sync right after a new submission was created.
    pub fn sync_after_submit(&self) {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            let _ = engine.sync_once(SyncTrigger::AfterSubmit).await;
        });
    }

    fn spawn_startup_sync(&self) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let connectivity = self.connectivity.clone();
        let delay = self.config.startup_delay;
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if connectivity.is_online() {
                        let _ = engine.sync_once(SyncTrigger::Startup).await;
                    }
                }
                _ = shutdown.changed() => {}
            }
        })
    }

    fn spawn_interval_sync(&self) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let period = self.config.sync_interval;
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the startup task covers
            // that window.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = engine.sync_once(SyncTrigger::Interval).await;
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    fn spawn_reconnect_sync(&self) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let debounce = self.config.online_debounce;
        let mut online = self.connectivity.subscribe();
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if !*online.borrow() {
                            continue;
                        }
                        logging::debug!("network restored, debouncing before sync");

                        // Debounce: the network may flap right after a
                        // reconnect. Another transition restarts the wait;
                        // going offline abandons it.
                        loop {
                            tokio::select! {
                                _ = tokio::time::sleep(debounce) => {
                                    let _ = engine.sync_once(SyncTrigger::Reconnect).await;
                                    break;
                                }
                                changed = online.changed() => {
                                    if changed.is_err() || !*online.borrow() {
                                        break;
                                    }
                                }
                                _ = shutdown.changed() => return,
                            }
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        })
    }
}

impl<S: RemoteSink> Drop for AutoSyncScheduler<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
