//! # Session Context
//!
//! The signed-in identity, created once at sign-in and handed explicitly to
//! every controller that writes on the user's behalf.

use std::sync::Arc;

use tm_core::models::Session;
use tm_core::traits::IdentityProvider;
use tracing::info;

use crate::alert::{Action, Alert};

#[derive(Clone, Debug, PartialEq)]
pub struct SessionContext {
    session: Arc<Session>,
}

impl SessionContext {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(session),
        }
    }

    pub async fn sign_up(
        identity: &dyn IdentityProvider,
        email: &str,
        password: &str,
        phone_number: &str,
    ) -> Result<Self, Alert> {
        identity
            .sign_up(email, password, phone_number)
            .await
            .map(Self::new)
            .map_err(|e| Alert::from_error(Action::SignUp, e))
    }

    pub async fn sign_in(
        identity: &dyn IdentityProvider,
        email: &str,
        password: &str,
    ) -> Result<Self, Alert> {
        identity
            .sign_in(email, password)
            .await
            .map(Self::new)
            .map_err(|e| Alert::from_error(Action::SignIn, e))
    }

    /// Restores the provider's current session, if any, at app start.
    pub fn resume(identity: &dyn IdentityProvider) -> Option<Self> {
        identity.current_session().map(Self::new)
    }

    /// On failure the context is still usable; the caller drops it once this
    /// returns `Ok`.
    pub async fn sign_out(&self, identity: &dyn IdentityProvider) -> Result<(), Alert> {
        identity
            .sign_out()
            .await
            .map_err(|e| Alert::from_error(Action::SignOut, e))?;
        info!(user_id = %self.session.user_id, "session closed");
        Ok(())
    }

    pub fn user_id(&self) -> &str {
        &self.session.user_id
    }

    /// Name written onto comments.
    pub fn display_name(&self) -> &str {
        &self.session.display_name
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}
