//! PostgREST client for the `transactions` table.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/rest/v1/transactions?select=*&order=date.desc` | fetch all |
//! | POST   | `/rest/v1/transactions` (`Prefer: return=representation`) | insert |
//! | DELETE | `/rest/v1/transactions?id=eq.{id}` | delete |
//!
//! Owner-scoped calls add `user_id=eq.{uid}`. Row-level security on the
//! server is the real boundary; the filter mirrors it.

use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{Persistence, Scope};
use crate::error::StoreError;
use crate::models::{NewTransaction, Session, Transaction};

const TABLE_PATH: &str = "rest/v1/transactions";

/// Minimal row projection used to detect changes.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RowStamp {
    pub id: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Clone)]
pub(crate) struct RemoteStore {
    http: reqwest::Client,
    table_url: String,
    anon_key: String,
    /// Present for the authenticated variant: requests carry the user's token.
    session: Option<watch::Receiver<Option<Session>>>,
}

impl RemoteStore {
    pub(crate) fn new(
        http: reqwest::Client,
        base_url: &reqwest::Url,
        anon_key: String,
        session: Option<watch::Receiver<Option<Session>>>,
    ) -> Self {
        let base = base_url.as_str().trim_end_matches('/');
        Self {
            http,
            table_url: format!("{base}/{TABLE_PATH}"),
            anon_key,
            session,
        }
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    fn bearer(&self) -> Result<String, StoreError> {
        match &self.session {
            None => Ok(self.anon_key.clone()),
            Some(rx) => rx
                .borrow()
                .as_ref()
                .map(|s| s.access_token.clone())
                .ok_or(StoreError::NotAuthenticated),
        }
    }

    fn request(&self, method: Method) -> Result<RequestBuilder, StoreError> {
        let token = self.bearer()?;
        Ok(self
            .http
            .request(method, &self.table_url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token))
    }

    async fn send(endpoint: &str, req: RequestBuilder) -> Result<Response, StoreError> {
        let resp = req.send().await.map_err(|e| {
            warn!(endpoint, error = %e, "backend request failed");
            StoreError::Unreachable {
                endpoint: endpoint.into(),
                source: e,
            }
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                endpoint: endpoint.into(),
                status,
                body,
            });
        }
        Ok(resp)
    }

    fn owner_filter(scope: &Scope) -> Vec<(&'static str, String)> {
        scope
            .owner()
            .map(|owner| vec![("user_id", format!("eq.{owner}"))])
            .unwrap_or_default()
    }

    /// `id` and `updated_at` of every visible row, for change detection.
    pub(crate) async fn fingerprint(&self, scope: &Scope) -> Result<Vec<RowStamp>, StoreError> {
        let endpoint = "GET /transactions (fingerprint)";
        let req = self
            .request(Method::GET)?
            .query(&[("select", "id,updated_at")])
            .query(&Self::owner_filter(scope));
        let resp = Self::send(endpoint, req).await?;
        resp.json().await.map_err(|e| StoreError::Decode {
            endpoint: endpoint.into(),
            source: e,
        })
    }
}

impl Persistence for RemoteStore {
    async fn fetch_all(&self, scope: &Scope) -> Result<Vec<Transaction>, StoreError> {
        let endpoint = "GET /transactions";
        let req = self
            .request(Method::GET)?
            .query(&[("select", "*"), ("order", "date.desc")])
            .query(&Self::owner_filter(scope));
        let resp = Self::send(endpoint, req).await?;
        let rows: Vec<Transaction> = resp.json().await.map_err(|e| StoreError::Decode {
            endpoint: endpoint.into(),
            source: e,
        })?;
        debug!(count = rows.len(), "fetched remote transactions");
        Ok(rows)
    }

    async fn insert(&self, new: &NewTransaction) -> Result<Transaction, StoreError> {
        let endpoint = "POST /transactions";
        let req = self
            .request(Method::POST)?
            .header("Prefer", "return=representation")
            .json(&[new]);
        let resp = Self::send(endpoint, req).await?;
        let status = resp.status().as_u16();
        let mut rows: Vec<Transaction> = resp.json().await.map_err(|e| StoreError::Decode {
            endpoint: endpoint.into(),
            source: e,
        })?;
        if rows.is_empty() {
            return Err(StoreError::Rejected {
                endpoint: endpoint.into(),
                status,
                body: "insert returned no rows".into(),
            });
        }
        let stored = rows.swap_remove(0);
        debug!(id = %stored.id, "inserted remote transaction");
        Ok(stored)
    }

    async fn delete(&self, id: &str, scope: &Scope) -> Result<(), StoreError> {
        let endpoint = "DELETE /transactions";
        let req = self
            .request(Method::DELETE)?
            .query(&[("id", format!("eq.{id}"))])
            .query(&Self::owner_filter(scope));
        Self::send(endpoint, req).await?;
        debug!(id, "deleted remote transaction");
        Ok(())
    }
}
