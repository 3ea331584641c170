//! # tm-auth-simple
//!
//! Argon2-based implementation of `IdentityProvider`.
//! Keeps accounts in process, issues one session at a time and broadcasts
//! every session transition to watchers.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use secrecy::{ExposeSecret, SecretString};
use tm_core::error::{AppError, AuthFailureKind, Result};
use tm_core::models::Session;
use tm_core::traits::IdentityProvider;
use tm_core::validation::{is_plausible_email, MIN_PASSWORD_LEN};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

struct Account {
    password_hash: String,
    session: Session,
}

pub struct SimpleIdentityProvider {
    /// Keyed by lower-cased email.
    accounts: DashMap<String, Account>,
    current: watch::Sender<Option<Session>>,
    min_password_len: usize,
    /// Optional server-side secret mixed into every hash.
    pepper: Option<SecretString>,
}

impl Default for SimpleIdentityProvider {
    fn default() -> Self {
        Self::new(MIN_PASSWORD_LEN, None)
    }
}

fn fail(kind: AuthFailureKind) -> AppError {
    AppError::AuthFailure(kind)
}

impl SimpleIdentityProvider {
    pub fn new(min_password_len: usize, pepper: Option<SecretString>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: DashMap::new(),
            current,
            min_password_len: min_password_len.max(MIN_PASSWORD_LEN),
            pepper,
        }
    }

    fn hasher(&self) -> Result<Argon2<'_>> {
        match &self.pepper {
            Some(secret) => Argon2::new_with_secret(
                secret.expose_secret().as_bytes(),
                Algorithm::Argon2id,
                Version::V0x13,
                Params::default(),
            )
            .map_err(|e| AppError::Internal(e.to_string())),
            None => Ok(Argon2::default()),
        }
    }

    fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()?
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    fn verify_password(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        match self.hasher() {
            Ok(argon) => argon.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }

    fn set_session(&self, session: Option<Session>) {
        self.current.send_replace(session);
    }
}

#[async_trait]
impl IdentityProvider for SimpleIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str, phone_number: &str) -> Result<Session> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() || phone_number.trim().is_empty() {
            return Err(fail(AuthFailureKind::MissingFields));
        }
        if !is_plausible_email(email) {
            return Err(fail(AuthFailureKind::InvalidEmail));
        }
        if password.chars().count() < self.min_password_len {
            return Err(fail(AuthFailureKind::WeakPassword));
        }

        let password_hash = self.hash_password(password)?;
        let session = Session {
            user_id: Uuid::new_v4().simple().to_string(),
            email: email.to_string(),
            display_name: Session::default_display_name(email),
            phone_number: Some(phone_number.trim().to_string()),
        };

        match self.accounts.entry(email.to_ascii_lowercase()) {
            Entry::Occupied(_) => {
                warn!(email, "sign up refused: account exists");
                return Err(fail(AuthFailureKind::EmailInUse));
            }
            Entry::Vacant(slot) => {
                slot.insert(Account {
                    password_hash,
                    session: session.clone(),
                });
            }
        }

        info!(user_id = %session.user_id, "account created");
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(fail(AuthFailureKind::MissingFields));
        }
        if !is_plausible_email(email) {
            return Err(fail(AuthFailureKind::InvalidEmail));
        }

        let (hash, session) = match self.accounts.get(&email.to_ascii_lowercase()) {
            Some(account) => (account.password_hash.clone(), account.session.clone()),
            None => {
                warn!(email, "sign in refused: no such account");
                return Err(fail(AuthFailureKind::UserNotFound));
            }
        };
        if !self.verify_password(password, &hash) {
            warn!(user_id = %session.user_id, "sign in refused: wrong password");
            return Err(fail(AuthFailureKind::WrongPassword));
        }

        info!(user_id = %session.user_id, "signed in");
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        if let Some(previous) = self.current_session() {
            info!(user_id = %previous.user_id, "signed out");
        }
        self.set_session(None);
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    fn watch_session(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }
}
