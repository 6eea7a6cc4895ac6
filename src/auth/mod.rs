//! Session lifecycle for the authenticated backend.
//!
//! [`AuthContext`] owns the current session. It restores a persisted session
//! on start, persists sign-ins, clears everything on sign-out, and publishes
//! every change on a watch channel that the UI and the remote store read.

mod gotrue;

pub(crate) use gotrue::GoTrueClient;

use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::db::{schema::SESSION_SLOT, Database};
use crate::error::{AuthError, ValidationError};
use crate::models::Session;

pub(crate) const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[^@ \t\r\n]+@[^@ \t\r\n]+\.[^@ \t\r\n]+$").unwrap()
});

pub(crate) fn validate_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ValidationError::MissingCredentials);
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
    }
    Ok(())
}

pub(crate) trait AuthProvider {
    /// `None` when the account must be confirmed by email before signing in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SignUpOutcome {
    ConfirmationPending,
    SignedIn,
}

pub(crate) struct AuthContext<A> {
    provider: A,
    db: Arc<Database>,
    session: watch::Sender<Option<Session>>,
}

impl<A: AuthProvider> AuthContext<A> {
    pub(crate) fn new(provider: A, db: Arc<Database>) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            provider,
            db,
            session,
        }
    }

    pub(crate) fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    /// Session-changed notifications. The receiver sees the current value.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    fn publish(&self, session: Option<Session>) {
        self.session.send_replace(session);
    }

    fn persist(&self, session: &Session) -> Result<(), AuthError> {
        let json = serde_json::to_string(session)?;
        self.db.write_slot(SESSION_SLOT, &json)?;
        Ok(())
    }

    fn forget(&self) -> Result<(), AuthError> {
        self.db.clear_slot(SESSION_SLOT)?;
        Ok(())
    }

    /// Resolve the session at startup: reuse the stored one, refreshing it
    /// if it has expired. A session that cannot be refreshed is discarded.
    pub(crate) async fn restore(&self) -> Result<Option<Session>, AuthError> {
        let stored = match self.db.read_slot(SESSION_SLOT)? {
            Some(json) => match serde_json::from_str::<Session>(&json) {
                Ok(session) => session,
                Err(e) => {
                    warn!(error = %e, "discarding unreadable stored session");
                    self.forget()?;
                    return Ok(None);
                }
            },
            None => return Ok(None),
        };

        let session = if stored.is_expired(Utc::now()) {
            match self.provider.refresh(&stored.refresh_token).await {
                Ok(fresh) => {
                    self.persist(&fresh)?;
                    fresh
                }
                Err(e) => {
                    warn!(error = %e, "stored session could not be refreshed");
                    self.forget()?;
                    return Ok(None);
                }
            }
        } else {
            stored
        };

        info!(user = %session.user_id(), "session restored");
        self.publish(Some(session.clone()));
        Ok(Some(session))
    }

    /// Swap an expiring access token for a new one before it is used.
    ///
    /// A refresh the auth service refuses ends the session. A refresh that
    /// cannot reach the service keeps the old session so it can be retried.
    pub(crate) async fn ensure_fresh(&self) -> Result<Option<Session>, AuthError> {
        let Some(current) = self.current_session() else {
            return Ok(None);
        };
        if !current.is_expired(Utc::now()) {
            return Ok(Some(current));
        }

        match self.provider.refresh(&current.refresh_token).await {
            Ok(fresh) => {
                self.persist(&fresh)?;
                info!(user = %fresh.user_id(), expires_at = %fresh.expires_at, "session refreshed");
                self.publish(Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(AuthError::Backend(msg)) => {
                warn!(error = %msg, "session refresh refused, signing out");
                self.forget()?;
                self.publish(None);
                Err(AuthError::Backend(msg))
            }
            Err(e) => {
                warn!(error = %e, "session refresh failed");
                Err(e)
            }
        }
    }

    pub(crate) async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        validate_credentials(email, password)?;
        match self.provider.sign_up(email.trim(), password).await? {
            Some(session) => {
                self.persist(&session)?;
                info!(user = %session.user_id(), "signed up and signed in");
                self.publish(Some(session));
                Ok(SignUpOutcome::SignedIn)
            }
            None => {
                info!("sign-up pending email confirmation");
                Ok(SignUpOutcome::ConfirmationPending)
            }
        }
    }

    pub(crate) async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        validate_credentials(email, password)?;
        let session = self.provider.sign_in(email.trim(), password).await?;
        self.persist(&session)?;
        info!(user = %session.user_id(), "signed in");
        self.publish(Some(session.clone()));
        Ok(session)
    }

    /// Always ends signed out locally; remote revocation is best-effort.
    pub(crate) async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(session) = self.current_session() {
            if let Err(e) = self.provider.sign_out(&session.access_token).await {
                warn!(error = %e, "remote sign-out failed");
            }
        }
        self.forget()?;
        self.publish(None);
        info!("signed out");
        Ok(())
    }
}
