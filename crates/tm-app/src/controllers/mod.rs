//! Screen controllers: the state and operations behind each view, without
//! any layout. Every controller owns the subscriptions it opens and releases
//! them on teardown or drop.

pub mod home;
pub mod request_list;
pub mod rescue_form;
pub mod thread;

pub use home::ActiveRequestCounter;
pub use request_list::{ListState, RequestListController, StatusFilter, ThreadRow};
pub use rescue_form::{RescueDraft, RescueFormController};
pub use thread::ThreadController;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Version counter bumped whenever a controller's visible state changes.
#[derive(Clone)]
pub(crate) struct ChangeNotifier {
    tx: Arc<watch::Sender<u64>>,
}

impl ChangeNotifier {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub(crate) fn bump(&self) {
        self.tx.send_modify(|v| *v += 1);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

/// In-flight marker for operations that disable their trigger while running.
#[derive(Default)]
pub(crate) struct BusyFlag(AtomicBool);

pub(crate) struct BusyGuard<'a>(&'a AtomicBool);

impl BusyFlag {
    /// `None` when the operation is already running.
    pub(crate) fn try_begin(&self) -> Option<BusyGuard<'_>> {
        if self.0.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(BusyGuard(&self.0))
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
