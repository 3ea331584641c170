//! Shared fixtures for the cross-crate scenario suites under `tests/`.

use std::sync::Arc;
use std::time::Duration;

use tm_app::{AppServices, Observer, SessionContext};
use tm_core::models::{GeoPoint, IssueType, RescueRequestInput, Session};
use tm_core::traits::{IdentityProvider, MediaPicker, MediaStore};
use tm_device_sim::{FixedLocationProvider, ScriptedMediaPicker, DEFAULT_POSITION};
use tm_store_memory::MemoryDocumentStore;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(2);

/// Real plug-ins around a shared memory store.
pub fn services(
    store: Arc<MemoryDocumentStore>,
    media: Arc<dyn MediaStore>,
    identity: Arc<dyn IdentityProvider>,
    picker: Arc<dyn MediaPicker>,
) -> AppServices {
    AppServices {
        rescues: store.clone(),
        comments: store,
        media,
        identity,
        location: Arc::new(FixedLocationProvider::default()),
        picker,
    }
}

/// Services for scenarios that never touch media or identity.
pub fn store_only(store: Arc<MemoryDocumentStore>) -> AppServices {
    services(
        store,
        Arc::new(tm_core::traits::MockMediaStore::new()),
        Arc::new(tm_core::traits::MockIdentityProvider::new()),
        Arc::new(ScriptedMediaPicker::default()),
    )
}

pub fn rescue_input(requester_id: &str, issue: IssueType) -> RescueRequestInput {
    RescueRequestInput {
        requester_id: requester_id.into(),
        location: Some(DEFAULT_POSITION),
        issue_type: Some(issue),
        ..Default::default()
    }
}

pub fn at(latitude: f64, longitude: f64) -> GeoPoint {
    GeoPoint::new(latitude, longitude)
}

pub fn session(user_id: &str, display_name: &str) -> SessionContext {
    SessionContext::new(Session {
        user_id: user_id.into(),
        email: format!("{display_name}@trail.ca"),
        display_name: display_name.into(),
        phone_number: None,
    })
}

/// Observer that forwards every delivery into a channel.
pub fn recorder<T: Send + 'static>() -> (Observer<T>, mpsc::UnboundedReceiver<Vec<T>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let observer = Observer::new(move |rows| {
        let _ = tx.send(rows);
    });
    (observer, rx)
}

/// Next delivery, failing the test after `WAIT`.
pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<Vec<T>>) -> Vec<T> {
    timeout(WAIT, rx.recv())
        .await
        .expect("delivery timed out")
        .expect("feed closed")
}

/// Skips deliveries until one satisfies `ready`.
pub async fn next_matching<T>(
    rx: &mut mpsc::UnboundedReceiver<Vec<T>>,
    mut ready: impl FnMut(&[T]) -> bool,
) -> Vec<T> {
    loop {
        let rows = next(rx).await;
        if ready(&rows) {
            return rows;
        }
    }
}

/// True when nothing arrives for `quiet`.
pub async fn stays_quiet<T>(rx: &mut mpsc::UnboundedReceiver<Vec<T>>, quiet: Duration) -> bool {
    match timeout(quiet, rx.recv()).await {
        Err(_) | Ok(None) => true,
        Ok(Some(_)) => false,
    }
}
