mod cli;
mod tui;

pub(crate) use cli::as_cli;
pub(crate) use tui::as_tui;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::auth::{AuthContext, GoTrueClient};
use crate::config::{BackendKind, Config};
use crate::db::Database;
use crate::ledger::Ledger;
use crate::store::{Backend, LocalStore, RemoteStore, Scope, Subscription};

/// Everything the surfaces share: configuration, storage and the session.
pub(crate) struct Runtime {
    pub(crate) config: Config,
    pub(crate) db: Arc<Database>,
    pub(crate) http: reqwest::Client,
    /// Present only for the authenticated backend.
    pub(crate) auth: Option<AuthContext<GoTrueClient>>,
}

/// A ledger bound to one session, with its change feed.
pub(crate) struct LedgerSession {
    pub(crate) ledger: Ledger<Backend>,
    pub(crate) feed: Option<Subscription>,
}

impl Runtime {
    pub(crate) fn new(config: Config, db: Arc<Database>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.remote.as_ref().and_then(|r| r.timeout) {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        let auth = match (config.backend, &config.remote) {
            (BackendKind::RemoteAuthenticated, Some(remote)) => Some(AuthContext::new(
                GoTrueClient::new(http.clone(), &remote.url, remote.anon_key.clone()),
                db.clone(),
            )),
            _ => None,
        };

        Ok(Self {
            config,
            db,
            http,
            auth,
        })
    }

    pub(crate) fn backend(&self) -> Backend {
        match &self.config.remote {
            None => Backend::Local(LocalStore::new(self.db.clone())),
            Some(remote) => Backend::Remote(RemoteStore::new(
                self.http.clone(),
                &remote.url,
                remote.anon_key.clone(),
                self.auth.as_ref().map(AuthContext::subscribe),
            )),
        }
    }

    /// Rows the current session may see. `None` while signed out of the
    /// authenticated backend.
    pub(crate) fn scope(&self) -> Option<Scope> {
        match &self.auth {
            None => Some(Scope::All),
            Some(auth) => auth
                .current_session()
                .map(|s| Scope::Owner(s.user_id().to_string())),
        }
    }

    pub(crate) fn open_ledger(&self) -> Option<Ledger<Backend>> {
        Some(Ledger::new(self.backend(), self.scope()?))
    }

    /// Ledger plus change feed, for long-lived surfaces.
    pub(crate) fn open_session(&self) -> Option<LedgerSession> {
        let scope = self.scope()?;
        let backend = self.backend();
        let feed = self
            .config
            .remote
            .as_ref()
            .and_then(|remote| backend.subscribe(&scope, remote.realtime_interval));
        Some(LedgerSession {
            ledger: Ledger::new(backend, scope),
            feed,
        })
    }
}
