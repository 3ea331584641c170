//! Account lifecycle through the session context and the Argon2-backed provider.

use std::sync::Arc;

use integration_tests::{rescue_input, services};
use tm_app::controllers::ThreadController;
use tm_app::SessionContext;
use tm_auth_simple::SimpleIdentityProvider;
use tm_core::models::IssueType;
use tm_core::traits::{IdentityProvider, MockMediaStore};
use tm_device_sim::ScriptedMediaPicker;
use tm_store_memory::MemoryDocumentStore;

#[tokio::test]
async fn sign_up_sign_out_sign_in() {
    let identity = SimpleIdentityProvider::default();
    let mut sessions = identity.watch_session();
    assert!(sessions.borrow_and_update().is_none());

    let ctx = SessionContext::sign_up(&identity, "casey@trail.ca", "switchback", "604-555-0199")
        .await
        .unwrap();
    assert_eq!(ctx.display_name(), "casey");
    assert!(sessions.has_changed().unwrap());
    assert_eq!(
        sessions.borrow_and_update().as_ref().map(|s| s.user_id.clone()),
        Some(ctx.user_id().to_string())
    );

    let user_id = ctx.user_id().to_string();
    ctx.sign_out(&identity).await.unwrap();
    assert!(sessions.borrow_and_update().is_none());
    assert!(SessionContext::resume(&identity).is_none());

    let again = SessionContext::sign_in(&identity, "CASEY@trail.ca", "switchback")
        .await
        .unwrap();
    assert_eq!(again.user_id(), user_id);
    assert_eq!(SessionContext::resume(&identity), Some(again));
}

#[tokio::test]
async fn failures_read_as_the_screens_word_them() {
    let identity = SimpleIdentityProvider::default();

    let alert = SessionContext::sign_up(&identity, "", "switchback", "604")
        .await
        .unwrap_err();
    assert_eq!(
        (alert.title.as_str(), alert.message.as_str()),
        ("Missing Information", "Please fill in all fields.")
    );

    let alert = SessionContext::sign_up(&identity, "casey@trail.ca", "short", "604")
        .await
        .unwrap_err();
    assert_eq!(
        (alert.title.as_str(), alert.message.as_str()),
        ("Weak Password", "Password should be at least 6 characters.")
    );

    let alert = SessionContext::sign_up(&identity, "casey at trail", "switchback", "604")
        .await
        .unwrap_err();
    assert_eq!(alert.message, "Please enter a valid email address.");

    SessionContext::sign_up(&identity, "casey@trail.ca", "switchback", "604")
        .await
        .unwrap();
    let alert = SessionContext::sign_up(&identity, "casey@trail.ca", "different1", "604")
        .await
        .unwrap_err();
    assert_eq!(
        (alert.title.as_str(), alert.message.as_str()),
        ("Sign Up Failed", "An account with this email already exists.")
    );

    let alert = SessionContext::sign_in(&identity, "casey@trail.ca", "wrong-one")
        .await
        .unwrap_err();
    assert_eq!(alert.message, "Incorrect password.");
    let alert = SessionContext::sign_in(&identity, "nobody@trail.ca", "switchback")
        .await
        .unwrap_err();
    assert_eq!(
        (alert.title.as_str(), alert.message.as_str()),
        ("Sign In Failed", "No account found with this email.")
    );
}

#[tokio::test]
async fn signed_in_user_comments_under_their_email_name() {
    let identity = Arc::new(SimpleIdentityProvider::default());
    let store = Arc::new(MemoryDocumentStore::new());
    let services = services(
        store,
        Arc::new(MockMediaStore::new()),
        identity.clone(),
        Arc::new(ScriptedMediaPicker::default()),
    );
    let ctx = SessionContext::sign_up(identity.as_ref(), "dana@trail.ca", "logging-road", "604")
        .await
        .unwrap();

    let rescue_id = services
        .request_repository()
        .create(rescue_input(ctx.user_id(), IssueType::FlatTire))
        .await
        .unwrap();
    let thread = ThreadController::open(&services, ctx.clone(), rescue_id)
        .await
        .unwrap();
    thread.submit_comment("Still here, phone at 20%").await.unwrap();

    let mut updates = thread.updates();
    tokio::time::timeout(integration_tests::WAIT, async {
        while thread.comments().is_empty() {
            updates.changed().await.unwrap();
        }
    })
    .await
    .expect("comment delivered");

    let comment = &thread.comments()[0];
    assert_eq!(comment.user_id, ctx.user_id());
    assert_eq!(comment.user_name, "dana");
    assert_eq!(thread.request().requester_id, ctx.user_id());
}
