//! Client for the hosted auth service (GoTrue REST API).
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST | `/auth/v1/signup` | sign up |
//! | POST | `/auth/v1/token?grant_type=password` | sign in |
//! | POST | `/auth/v1/token?grant_type=refresh_token` | refresh |
//! | POST | `/auth/v1/logout` | sign out |

use chrono::{DateTime, Duration, Utc};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::AuthProvider;
use crate::error::AuthError;
use crate::models::{Session, User};

const AUTH_PATH: &str = "auth/v1";

/// Token grant as returned by the service. Sign-up with email
/// confirmation enabled answers with a bare user and no tokens.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<User>,
}

impl TokenGrant {
    fn into_session(self, now: DateTime<Utc>) -> Option<Session> {
        let access_token = self.access_token?;
        let refresh_token = self.refresh_token.unwrap_or_default();
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)))
            .unwrap_or(now);
        Some(Session {
            access_token,
            refresh_token,
            expires_at,
            user: self.user?,
        })
    }
}

/// Pull the human-readable message out of an error body. The service has
/// used several field names over time.
pub(super) fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(msg) = value.get(key).and_then(Value::as_str) {
                if !msg.is_empty() {
                    return msg.to_string();
                }
            }
        }
    }
    let body = body.trim();
    if body.is_empty() {
        "authentication failed".to_string()
    } else {
        body.to_string()
    }
}

#[derive(Clone)]
pub(crate) struct GoTrueClient {
    http: reqwest::Client,
    base: String,
    anon_key: String,
}

impl GoTrueClient {
    pub(crate) fn new(http: reqwest::Client, base_url: &reqwest::Url, anon_key: String) -> Self {
        let base = base_url.as_str().trim_end_matches('/');
        Self {
            http,
            base: format!("{base}/{AUTH_PATH}"),
            anon_key,
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}/{path}", self.base))
            .header("apikey", &self.anon_key)
    }

    async fn send(req: RequestBuilder) -> Result<Response, AuthError> {
        let resp = req.send().await.map_err(|e| {
            warn!(error = %e, "auth request failed");
            AuthError::Unreachable(e)
        })?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            debug!(status, "auth request rejected");
            return Err(AuthError::Backend(error_message(&body)));
        }
        Ok(resp)
    }

    async fn grant(req: RequestBuilder) -> Result<TokenGrant, AuthError> {
        let resp = Self::send(req).await?;
        resp.json().await.map_err(AuthError::Decode)
    }

    async fn token(&self, grant_type: &str, body: Value) -> Result<Session, AuthError> {
        let req = self
            .post("token")
            .query(&[("grant_type", grant_type)])
            .json(&body);
        Self::grant(req)
            .await?
            .into_session(Utc::now())
            .ok_or_else(|| AuthError::Backend("auth service returned no session".into()))
    }
}

impl AuthProvider for GoTrueClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, AuthError> {
        let req = self
            .post("signup")
            .json(&json!({ "email": email, "password": password }));
        Ok(Self::grant(req).await?.into_session(Utc::now()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.token("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        self.token("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        Self::send(self.post("logout").bearer_auth(access_token)).await?;
        Ok(())
    }
}
