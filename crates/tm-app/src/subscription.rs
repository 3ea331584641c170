//! # Subscriptions
//!
//! A `Subscription` pumps one live feed into one observer on a background
//! task and is the only handle able to stop it. Every owner keeps exactly one
//! handle per open feed; the `SubscriptionRegistry` does the bookkeeping when
//! one owner holds many of them.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tm_core::error::AppError;
use tm_core::feed::{FeedEvent, LiveFeed};
use tokio::sync::oneshot;
use tracing::{debug, error};

type UpdateFn<T> = Box<dyn FnMut(Vec<T>) + Send>;
type ErrorFn = Box<dyn FnMut(AppError) + Send>;

thread_local! {
    /// Gate of the subscription whose callback is running on this thread.
    static DELIVERING: Cell<usize> = const { Cell::new(0) };
}

/// Shared between a handle and its pump. `lock` is held while a callback
/// runs; `live` is cleared exactly once.
struct Gate {
    live: AtomicBool,
    lock: Mutex<()>,
}

impl Gate {
    fn new(live: bool) -> Arc<Self> {
        Arc::new(Self {
            live: AtomicBool::new(live),
            lock: Mutex::new(()),
        })
    }

    fn id(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as usize
    }

    /// Runs `f` as a delivery unless the gate has closed.
    fn deliver(self: &Arc<Self>, f: impl FnOnce()) -> bool {
        let _held = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if !self.live.load(Ordering::Acquire) {
            return false;
        }
        let _marker = Delivering(DELIVERING.with(|d| d.replace(self.id())));
        f();
        true
    }
}

/// Restores the outer delivery marker, even if the callback panics.
struct Delivering(usize);

impl Drop for Delivering {
    fn drop(&mut self) {
        DELIVERING.with(|d| d.set(self.0));
    }
}

/// Callbacks for one standing query.
pub struct Observer<T> {
    on_update: UpdateFn<T>,
    on_error: ErrorFn,
}

impl<T> Observer<T> {
    /// `on_update` receives the full, ordered result set on every change.
    pub fn new(on_update: impl FnMut(Vec<T>) + Send + 'static) -> Self {
        Self {
            on_update: Box::new(on_update),
            on_error: Box::new(|err| error!(error = %err, "live feed failed")),
        }
    }

    /// Replaces the default handler, which only logs.
    pub fn on_error(mut self, on_error: impl FnMut(AppError) + Send + 'static) -> Self {
        self.on_error = Box::new(on_error);
        self
    }
}

/// Handle to a running live feed. Dropping it unsubscribes.
pub struct Subscription {
    label: &'static str,
    gate: Arc<Gate>,
    cancel: Option<oneshot::Sender<()>>,
}

impl Subscription {
    /// Starts pumping `feed` into `observer`. `shape` is applied to every
    /// snapshot before delivery (ordering, trimming).
    pub fn spawn<T, S>(
        label: &'static str,
        mut feed: LiveFeed<T>,
        mut observer: Observer<T>,
        mut shape: S,
    ) -> Self
    where
        T: Send + 'static,
        S: FnMut(Vec<T>) -> Vec<T> + Send + 'static,
    {
        let gate = Gate::new(true);
        let pump_gate = gate.clone();
        let (cancel, mut cancelled) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = &mut cancelled => break,
                    event = feed.next() => event,
                };
                let Some(event) = event else { break };

                let (delivered, terminal) = match event {
                    FeedEvent::Snapshot(rows) => {
                        let rows = shape(rows);
                        (pump_gate.deliver(|| (observer.on_update)(rows)), false)
                    }
                    FeedEvent::Error(reason) => {
                        let err = AppError::SubscribeFailure(reason);
                        (pump_gate.deliver(|| (observer.on_error)(err)), true)
                    }
                };
                if !delivered || terminal {
                    break;
                }
            }
            debug!(label, "live feed pump stopped");
        });

        debug!(label, "subscribed");
        Self {
            label,
            gate,
            cancel: Some(cancel),
        }
    }

    /// A handle with nothing behind it, for reads that are not live.
    pub fn inert(label: &'static str) -> Self {
        Self {
            label,
            gate: Gate::new(false),
            cancel: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.gate.live.load(Ordering::Acquire)
    }

    /// Stops delivery. Returns once no callback is running; calling it again
    /// does nothing. May be called from this subscription's own callback, in
    /// which case the running callback is the last one.
    pub fn unsubscribe(&mut self) {
        if !self.gate.live.swap(false, Ordering::AcqRel) {
            return;
        }
        let own_callback = DELIVERING.with(|d| d.get()) == self.gate.id();
        if !own_callback {
            drop(self.gate.lock.lock().unwrap_or_else(|e| e.into_inner()));
        }
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        debug!(label = self.label, "unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

/// One subscription per key, owned by whoever renders the keyed items.
pub struct SubscriptionRegistry<K> {
    entries: HashMap<K, Subscription>,
}

impl<K: Eq + Hash + Clone> Default for SubscriptionRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> SubscriptionRegistry<K> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Stores the handle, releasing any previous one under the same key.
    pub fn insert(&mut self, key: K, sub: Subscription) {
        if let Some(mut previous) = self.entries.insert(key, sub) {
            previous.unsubscribe();
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &K) -> bool {
        match self.entries.remove(key) {
            Some(mut sub) => {
                sub.unsubscribe();
                true
            }
            None => false,
        }
    }

    /// Releases every entry whose key is not in `keep`; returns the keys of
    /// `keep` that have no subscription yet.
    pub fn reconcile(&mut self, keep: &HashSet<K>) -> Vec<K> {
        self.entries.retain(|key, sub| {
            let kept = keep.contains(key);
            if !kept {
                sub.unsubscribe();
            }
            kept
        });
        keep.iter()
            .filter(|key| !self.entries.contains_key(*key))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        for (_, mut sub) in self.entries.drain() {
            sub.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tm_core::feed;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn forwarding<T: Send + 'static>() -> (Observer<T>, mpsc::UnboundedReceiver<Vec<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = Observer::new(move |rows| {
            let _ = tx.send(rows);
        });
        (observer, rx)
    }

    #[tokio::test]
    async fn snapshots_are_shaped_and_delivered_in_order() {
        let (tx, feed) = feed::channel();
        let (observer, mut rx) = forwarding::<u32>();
        let _sub = Subscription::spawn("numbers", feed, observer, |mut v| {
            v.sort();
            v
        });

        tx.snapshot(vec![3, 1]);
        tx.snapshot(vec![3, 2, 1]);
        assert_eq!(rx.recv().await, Some(vec![1, 3]));
        assert_eq!(rx.recv().await, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn no_delivery_after_unsubscribe_and_second_call_is_noop() {
        let (tx, feed) = feed::channel();
        let (observer, mut rx) = forwarding::<u32>();
        let mut sub = Subscription::spawn("numbers", feed, observer, |v| v);

        tx.snapshot(vec![1]);
        assert_eq!(rx.recv().await, Some(vec![1]));

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());

        tx.snapshot(vec![2]);
        // The pump drops the observer (and its sender) when it stops.
        let next = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(matches!(next, Ok(None) | Err(_)));
    }

    #[tokio::test]
    async fn callback_may_cancel_its_own_subscription() {
        let (tx, feed) = feed::channel();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let (seen_tx, mut seen) = mpsc::unbounded_channel();
        let observer = {
            let slot = slot.clone();
            Observer::new(move |rows: Vec<u32>| {
                let _ = seen_tx.send(rows.clone());
                if rows == vec![2] {
                    if let Some(sub) = slot.lock().unwrap().as_mut() {
                        sub.unsubscribe();
                    }
                }
            })
        };
        *slot.lock().unwrap() = Some(Subscription::spawn("numbers", feed, observer, |v| v));

        tx.snapshot(vec![1]);
        tx.snapshot(vec![2]);
        tx.snapshot(vec![3]);
        assert_eq!(seen.recv().await, Some(vec![1]));
        assert_eq!(seen.recv().await, Some(vec![2]));
        let next = timeout(Duration::from_millis(200), seen.recv()).await;
        assert!(matches!(next, Ok(None) | Err(_)));

        let sub = slot.lock().unwrap().take().expect("handle kept");
        assert!(!sub.is_active());
    }

    #[tokio::test]
    async fn feed_errors_reach_the_error_handler() {
        let (tx, feed) = feed::channel::<u32>();
        let (err_tx, mut err_rx) = mpsc::unbounded_channel();
        let observer = Observer::new(|_| {}).on_error(move |e| {
            let _ = err_tx.send(e);
        });
        let _sub = Subscription::spawn("numbers", feed, observer, |v| v);

        tx.error("reset");
        assert_eq!(
            err_rx.recv().await,
            Some(AppError::SubscribeFailure("reset".into()))
        );
    }

    #[tokio::test]
    async fn dropping_the_handle_closes_the_feed() {
        let (tx, feed) = feed::channel::<u32>();
        let sub = Subscription::spawn("numbers", feed, Observer::new(|_| {}), |v| v);
        drop(sub);
        timeout(Duration::from_secs(1), async {
            while !tx.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("feed released");
    }

    #[tokio::test]
    async fn registry_reconciles_keys() {
        let mut registry = SubscriptionRegistry::new();
        let mut senders = Vec::new();
        for key in ["a", "b"] {
            let (tx, feed) = feed::channel::<u32>();
            senders.push(tx);
            registry.insert(key, Subscription::spawn("k", feed, Observer::new(|_| {}), |v| v));
        }

        let keep: HashSet<&str> = ["b", "c"].into_iter().collect();
        let missing = registry.reconcile(&keep);
        assert_eq!(missing, vec!["c"]);
        assert!(!registry.contains(&"a"));
        assert!(registry.contains(&"b"));
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.remove(&"b"));
    }

    #[test]
    fn inert_handles_are_inactive() {
        let mut sub = Subscription::inert("once");
        assert!(!sub.is_active());
        sub.unsubscribe();
    }
}
