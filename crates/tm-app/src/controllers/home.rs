//! Home screen counter of requests that still need help.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tm_core::models::RescueRequest;
use tokio::sync::watch;
use tracing::error;

use super::{lock, ChangeNotifier};
use crate::subscription::{Observer, Subscription};
use crate::AppServices;

pub struct ActiveRequestCounter {
    count: Arc<AtomicUsize>,
    feed: Mutex<Option<Subscription>>,
    changes: ChangeNotifier,
}

impl ActiveRequestCounter {
    /// Counts pending and accepted requests live. If the feed cannot be
    /// opened the count stays at zero and the failure is logged.
    pub async fn open(services: &AppServices) -> Self {
        let count = Arc::new(AtomicUsize::new(0));
        let changes = ChangeNotifier::new();
        let observer = {
            let count = count.clone();
            let changes = changes.clone();
            Observer::new(move |rows: Vec<RescueRequest>| {
                count.store(rows.len(), Ordering::Release);
                changes.bump();
            })
        };
        let feed = match services.request_repository().subscribe_active(observer).await {
            Ok(sub) => Some(sub),
            Err(err) => {
                error!(error = %err, "active request counter unavailable");
                None
            }
        };
        Self {
            count,
            feed: Mutex::new(feed),
            changes,
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn status_line(&self) -> String {
        match self.count() {
            0 => "No active requests".to_string(),
            1 => "1 active request".to_string(),
            n => format!("{n} active requests"),
        }
    }

    pub fn subtitle(&self) -> &'static str {
        if self.count() == 0 {
            "Ready to help or request assistance"
        } else {
            "Tap to view details"
        }
    }

    pub fn updates(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn teardown(&self) {
        if let Some(mut sub) = lock(&self.feed).take() {
            sub.unsubscribe();
        }
    }
}

impl Drop for ActiveRequestCounter {
    fn drop(&mut self) {
        self.teardown();
    }
}
