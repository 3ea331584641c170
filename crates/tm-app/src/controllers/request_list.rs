//! # Request List
//!
//! Live list of every rescue request, newest first, with a comment count and
//! latest-comment preview per row. Preview feeds are held in a registry keyed
//! by request id; they are opened as rows appear, released as rows vanish and
//! all released on teardown.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tm_core::error::AppError;
use tm_core::models::{Comment, RescueRequest, RescueStatus};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{lock, ChangeNotifier};
use crate::repository::CommentRepository;
use crate::subscription::{Observer, Subscription, SubscriptionRegistry};
use crate::AppServices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    Loading,
    Populated,
    /// The feed failed before any data arrived. Data that arrives later
    /// still populates the list.
    ErrorLogged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(RescueStatus),
}

impl StatusFilter {
    pub fn admits(&self, status: RescueStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRow {
    pub request: RescueRequest,
    pub comment_count: usize,
    pub latest_comment: Option<Comment>,
}

struct ListModel {
    state: ListState,
    requests: Vec<RescueRequest>,
    /// Oldest first, per request.
    comments: HashMap<Uuid, Vec<Comment>>,
}

type Previews = Arc<Mutex<SubscriptionRegistry<Uuid>>>;

pub struct RequestListController {
    model: Arc<Mutex<ListModel>>,
    previews: Previews,
    list: Mutex<Option<Subscription>>,
    reconciler: Mutex<Option<JoinHandle<()>>>,
    changes: ChangeNotifier,
}

impl RequestListController {
    /// Opens the list feed. A feed that cannot be established leaves the
    /// controller in `ErrorLogged`; nothing is retried.
    pub async fn open(services: &AppServices) -> Self {
        let model = Arc::new(Mutex::new(ListModel {
            state: ListState::Loading,
            requests: Vec::new(),
            comments: HashMap::new(),
        }));
        let previews: Previews = Arc::new(Mutex::new(SubscriptionRegistry::new()));
        let changes = ChangeNotifier::new();
        let (ids_tx, ids_rx) = mpsc::unbounded_channel();

        let reconciler = tokio::spawn(reconcile_previews(
            services.comment_repository(),
            ids_rx,
            previews.clone(),
            model.clone(),
            changes.clone(),
        ));

        let on_rows = {
            let model = model.clone();
            let changes = changes.clone();
            move |rows: Vec<RescueRequest>| {
                let ids: HashSet<Uuid> = rows.iter().map(|r| r.id).collect();
                {
                    let mut m = lock(&model);
                    m.comments.retain(|id, _| ids.contains(id));
                    m.requests = rows;
                    m.state = ListState::Populated;
                }
                let _ = ids_tx.send(ids);
                changes.bump();
            }
        };
        let on_error = {
            let model = model.clone();
            let changes = changes.clone();
            move |err: AppError| {
                error!(error = %err, "rescue list feed dropped");
                let mut m = lock(&model);
                if m.state == ListState::Loading {
                    m.state = ListState::ErrorLogged;
                }
                drop(m);
                changes.bump();
            }
        };

        let observer = Observer::new(on_rows).on_error(on_error);
        let list = match services.request_repository().subscribe_all(observer).await {
            Ok(sub) => Some(sub),
            Err(err) => {
                error!(error = %err, "could not open rescue list feed");
                lock(&model).state = ListState::ErrorLogged;
                changes.bump();
                None
            }
        };

        Self {
            model,
            previews,
            list: Mutex::new(list),
            reconciler: Mutex::new(Some(reconciler)),
            changes,
        }
    }

    pub fn state(&self) -> ListState {
        lock(&self.model).state
    }

    /// Rows in feed order, narrowed by `filter`.
    pub fn rows(&self, filter: StatusFilter) -> Vec<ThreadRow> {
        let m = lock(&self.model);
        m.requests
            .iter()
            .filter(|r| filter.admits(r.status))
            .map(|r| {
                let comments = m.comments.get(&r.id);
                ThreadRow {
                    request: r.clone(),
                    comment_count: comments.map_or(0, Vec::len),
                    latest_comment: comments.and_then(|c| c.last().cloned()),
                }
            })
            .collect()
    }

    /// Open preview feeds, one per visible request.
    pub fn preview_count(&self) -> usize {
        lock(&self.previews).len()
    }

    pub fn is_live(&self) -> bool {
        lock(&self.list).as_ref().is_some_and(Subscription::is_active)
    }

    /// Bumped after every state change.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Releases the list feed and every preview feed. Safe to call twice.
    pub async fn teardown(&self) {
        if let Some(mut sub) = lock(&self.list).take() {
            sub.unsubscribe();
        }
        let reconciler = lock(&self.reconciler).take();
        if let Some(handle) = reconciler {
            handle.abort();
            let _ = handle.await;
        }
        lock(&self.previews).clear();
        info!("rescue list closed");
    }
}

impl Drop for RequestListController {
    fn drop(&mut self) {
        if let Some(mut sub) = lock(&self.list).take() {
            sub.unsubscribe();
        }
        if let Some(handle) = lock(&self.reconciler).take() {
            handle.abort();
        }
        lock(&self.previews).clear();
    }
}

/// Keeps one preview feed open per listed request.
async fn reconcile_previews(
    repo: CommentRepository,
    mut ids_rx: mpsc::UnboundedReceiver<HashSet<Uuid>>,
    previews: Previews,
    model: Arc<Mutex<ListModel>>,
    changes: ChangeNotifier,
) {
    while let Some(mut ids) = ids_rx.recv().await {
        // Only the latest id set matters.
        while let Ok(newer) = ids_rx.try_recv() {
            ids = newer;
        }

        let missing = lock(&previews).reconcile(&ids);
        for rescue_id in missing {
            let observer = {
                let model = model.clone();
                let changes = changes.clone();
                Observer::new(move |comments: Vec<Comment>| {
                    lock(&model).comments.insert(rescue_id, comments);
                    changes.bump();
                })
            };
            match repo.subscribe_by_request(rescue_id, observer).await {
                Ok(sub) => lock(&previews).insert(rescue_id, sub),
                Err(err) => warn!(%rescue_id, error = %err, "comment preview unavailable"),
            }
        }
    }
}
