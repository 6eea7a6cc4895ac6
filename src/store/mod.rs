//! Persistence strategies for the ledger.
//!
//! One [`Persistence`] interface, three variants selected at startup:
//! - **local**: the whole ledger in one durable SQLite slot
//! - **remote**: a PostgREST table, accessed with the anon key
//! - **remote-auth**: the same table, scoped to the signed-in account

mod local;
pub(crate) mod realtime;
mod remote;

pub(crate) use local::LocalStore;
pub(crate) use realtime::{ChangeEvent, Subscription};
pub(crate) use remote::RemoteStore;

use std::time::Duration;

use crate::error::StoreError;
use crate::models::{NewTransaction, Transaction};

/// Which rows an operation may see or touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Scope {
    /// No ownership applies.
    All,
    /// Only rows owned by this account id.
    Owner(String),
}

impl Scope {
    pub(crate) fn owner(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Owner(id) => Some(id),
        }
    }
}

pub(crate) trait Persistence {
    /// Every visible transaction, most recent first.
    async fn fetch_all(&self, scope: &Scope) -> Result<Vec<Transaction>, StoreError>;

    /// Persist a new row and return it as stored, with its assigned id.
    async fn insert(&self, new: &NewTransaction) -> Result<Transaction, StoreError>;

    /// Delete by id. Deleting an id that does not exist is not an error.
    async fn delete(&self, id: &str, scope: &Scope) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub(crate) enum Backend {
    Local(LocalStore),
    Remote(RemoteStore),
}

impl Backend {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(store) if store.is_authenticated() => "remote-auth",
            Self::Remote(_) => "remote",
        }
    }

    /// Start watching for changes made anywhere to the visible rows.
    /// The local store has no change feed.
    pub(crate) fn subscribe(&self, scope: &Scope, interval: Duration) -> Option<Subscription> {
        match self {
            Self::Local(_) => None,
            Self::Remote(store) => Some(realtime::watch(store.clone(), scope.clone(), interval)),
        }
    }
}

impl Persistence for Backend {
    async fn fetch_all(&self, scope: &Scope) -> Result<Vec<Transaction>, StoreError> {
        match self {
            Self::Local(store) => store.fetch_all(scope).await,
            Self::Remote(store) => store.fetch_all(scope).await,
        }
    }

    async fn insert(&self, new: &NewTransaction) -> Result<Transaction, StoreError> {
        match self {
            Self::Local(store) => store.insert(new).await,
            Self::Remote(store) => store.insert(new).await,
        }
    }

    async fn delete(&self, id: &str, scope: &Scope) -> Result<(), StoreError> {
        match self {
            Self::Local(store) => store.delete(id, scope).await,
            Self::Remote(store) => store.delete(id, scope).await,
        }
    }
}

#[cfg(test)]
mod tests;
