//! Shared helpers for the scenario tests.

use std::sync::{Arc, Once};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tpl_common::config::LockManagerConfig;
use tpl_common::error::AbortReason;
use tpl_common::types::{ResourceId, TxnId};
use tpl_lock::observer::{LockEvent, LockObserver, TracingObserver};
use tpl_lock::LockManager;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test-friendly `tracing` subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}

/// Observer that keeps every event and forwards it to `tracing`.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<LockEvent>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all events so far.
    pub fn events(&self) -> Vec<LockEvent> {
        self.events.lock().clone()
    }

    /// Returns, in order, the transactions granted `resource_id`.
    pub fn grants_on(&self, resource_id: ResourceId) -> Vec<TxnId> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                LockEvent::Granted {
                    txn_id,
                    resource_id: rid,
                    ..
                }
                | LockEvent::Woken {
                    txn_id,
                    resource_id: rid,
                    ..
                } if *rid == resource_id => Some(*txn_id),
                _ => None,
            })
            .collect()
    }

    /// Returns every abort in order.
    pub fn aborts(&self) -> Vec<(TxnId, AbortReason)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                LockEvent::Aborted { txn_id, reason } => Some((*txn_id, *reason)),
                _ => None,
            })
            .collect()
    }

    /// Returns the victims named by every cycle found.
    pub fn cycle_victims(&self) -> Vec<(Vec<TxnId>, TxnId)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                LockEvent::CycleFound { cycle, victim, .. } => Some((cycle.clone(), *victim)),
                _ => None,
            })
            .collect()
    }
}

impl LockObserver for RecordingObserver {
    fn on_event(&self, event: &LockEvent) {
        TracingObserver.on_event(event);
        self.events.lock().push(event.clone());
    }
}

/// Creates a manager with the test configuration and a recording observer.
pub fn recording_manager() -> (Arc<LockManager>, Arc<RecordingObserver>) {
    recording_manager_with(LockManagerConfig::for_testing())
}

/// Creates a manager with `config` and a recording observer.
pub fn recording_manager_with(
    config: LockManagerConfig,
) -> (Arc<LockManager>, Arc<RecordingObserver>) {
    init_tracing();
    let observer = Arc::new(RecordingObserver::new());
    let manager = LockManager::with_observer(config, observer.clone())
        .expect("test configuration is valid");
    (Arc::new(manager), observer)
}

/// Polls `cond` every few milliseconds, panicking after `timeout`.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + timeout;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in {timeout:?}");
        thread::sleep(Duration::from_millis(2));
    }
}

/// Shorthand for `TxnId::new`.
pub fn txn(id: usize) -> TxnId {
    TxnId::new(id)
}

/// Shorthand for `ResourceId::new`.
pub fn res(id: usize) -> ResourceId {
    ResourceId::new(id)
}
