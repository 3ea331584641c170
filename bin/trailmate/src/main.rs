//! # TrailMate Binary
//!
//! Assembles the plug-ins into `AppServices` and runs a scripted session
//! against them: sign up, watch the home counter and request list, broadcast
//! a rescue request with a photo, comment on it, print the thread, tear down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use chrono::Utc;
use tm_app::controllers::{
    ActiveRequestCounter, RequestListController, RescueFormController, StatusFilter,
    ThreadController,
};
use tm_app::format::{comment_count_label, relative_time, status_label};
use tm_app::{Alert, AppServices, SessionContext};
use tm_auth_simple::SimpleIdentityProvider;
use tm_config::AppConfig;
use tm_core::models::{CanMove, ExtendedDetails, IssueType, PickedMedia, RecoveryGear};
use tm_device_sim::{FixedLocationProvider, ScriptedMediaPicker};
use tm_media_local::LocalMediaStore;
use tm_store_memory::MemoryDocumentStore;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEMO_EMAIL: &str = "demo@trailmate.app";
const DEMO_PASSWORD: &str = "switchback";
const DEMO_PHONE: &str = "604-555-0100";

/// Small PNG handed to the media picker as the demo photo.
const DEMO_PHOTO: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

fn init_tracing(cfg: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log.filter));
    if cfg.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Waits for a controller's change counter until `ready` holds.
async fn settle(
    rx: &mut watch::Receiver<u64>,
    mut ready: impl FnMut() -> bool,
) -> anyhow::Result<()> {
    timeout(Duration::from_secs(5), async {
        while !ready() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .context("timed out waiting for the live feed")
}

fn show(alert: &Alert) {
    println!("[{}] {}", alert.title, alert.message);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::load().context("loading configuration")?;
    init_tracing(&cfg);

    // 1. Document store
    let store = Arc::new(MemoryDocumentStore::new());

    // 2. Media store
    let media = LocalMediaStore::new(cfg.media.root.clone(), cfg.media.url_prefix.clone());

    // 3. Identity
    let identity = Arc::new(SimpleIdentityProvider::new(
        cfg.auth.min_password_len,
        cfg.auth.pepper.clone(),
    ));

    // 4. Device
    let picker = Arc::new(ScriptedMediaPicker::new(cfg.device.media_permission));
    let location =
        FixedLocationProvider::new(cfg.device.position(), cfg.device.location_permission);

    let services = AppServices {
        rescues: store.clone(),
        comments: store.clone(),
        media: Arc::new(media),
        identity: identity.clone(),
        location: Arc::new(location),
        picker: picker.clone(),
    };
    info!(media_root = %cfg.media.root.display(), "trailmate starting");

    let session = match SessionContext::resume(identity.as_ref()) {
        Some(session) => session,
        None => {
            SessionContext::sign_up(identity.as_ref(), DEMO_EMAIL, DEMO_PASSWORD, DEMO_PHONE)
                .await?
        }
    };
    println!("Signed in as {} ({})", session.display_name(), session.session().email);

    let counter = ActiveRequestCounter::open(&services).await;
    let list = RequestListController::open(&services).await;
    println!("{} - {}", counter.status_line(), counter.subtitle());

    // Request help.
    let form = RescueFormController::new(&services, session.clone());
    let here = match form.acquire_location().await {
        Ok(point) => point,
        Err(alert) => {
            show(&alert);
            return Ok(());
        }
    };
    form.select_issue(IssueType::StuckInMud);
    form.set_details("Rear wheels buried to the hubs");
    form.set_location_context("Ring Creek FSR, left fork past km 6");
    form.set_extended(Some(ExtendedDetails {
        vehicle_type: Some("Pickup".into()),
        recovery_gear: vec![RecoveryGear::Shovel, RecoveryGear::TowStraps],
        num_people: Some(2),
        can_move: CanMove::No,
        ..Default::default()
    }));
    picker.push(PickedMedia {
        file_name: "stuck.png".into(),
        content_type: mime::IMAGE_PNG,
        bytes: Bytes::from_static(DEMO_PHOTO),
    });
    match form.pick_photo().await {
        Ok(true) => {}
        Ok(false) => println!("No photo attached"),
        Err(alert) => show(&alert),
    }

    let rescue_id = match form.submit().await {
        Ok(id) => {
            show(&Alert::request_sent());
            id
        }
        Err(alert) => {
            show(&alert);
            return Ok(());
        }
    };
    println!("Broadcast from {here}");

    // Comment on it.
    let thread = ThreadController::open(&services, session.clone(), rescue_id).await?;
    if let Err(alert) = thread.submit_comment("Winch truck leaving Squamish now").await {
        show(&alert);
    }

    let mut list_updates = list.updates();
    settle(&mut list_updates, || {
        list.rows(StatusFilter::All)
            .first()
            .is_some_and(|row| row.comment_count > 0)
    })
    .await?;
    let mut counter_updates = counter.updates();
    settle(&mut counter_updates, || counter.count() > 0).await?;

    let now = Utc::now();
    println!("{} - {}", counter.status_line(), counter.subtitle());
    for row in list.rows(StatusFilter::All) {
        let request = &row.request;
        println!(
            "* {} [{}] {} - {}",
            request.issue_type,
            status_label(request.status),
            relative_time(now, request.created_at),
            comment_count_label(row.comment_count),
        );
        if let Some(url) = &request.photo_url {
            println!("  photo: {url}");
        }
        if let Some(latest) = &row.latest_comment {
            println!("  {}: {}", latest.user_name, latest.comment_text);
        }
    }

    let request = thread.request();
    println!("Thread: {} at {}", request.issue_type, request.location);
    for comment in thread.comments() {
        println!(
            "  {} ({}): {}",
            comment.user_name,
            relative_time(now, comment.created_at),
            comment.comment_text
        );
    }

    thread.close();
    list.teardown().await;
    counter.teardown();
    session.sign_out(identity.as_ref()).await?;
    info!(open_feeds = store.open_feed_count(), "trailmate finished");
    Ok(())
}
