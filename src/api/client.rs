//! Authenticated HTTP client for the proxied ADX backend.
//!
//! Transient transport failures are retried with exponential backoff by the
//! middleware stack. A 401 on a data call triggers exactly one token
//! refresh and retry; a second 401 (or a failed refresh) clears the session
//! and surfaces as `Error::SessionExpired`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::api::session::Session;
use crate::api::types::{
    AdxRow, Credentials, DeviceInfo, ErrorBody, QueryResponse, RefreshedAccess,
    SearchSerialResponse, TokenPair,
};
use crate::config::BackendConfig;
use crate::error::{Error, Result};

/// Seam used by the dashboard layer; lets tests substitute a stub backend.
#[async_trait]
pub trait TelemetryBackend: Send + Sync {
    /// Run a KQL query and return the raw rows.
    async fn query(&self, kql: &str) -> Result<Vec<AdxRow>>;

    /// Look up a device registration by serial.
    async fn search_serial(&self, serial: &str) -> Result<DeviceInfo>;
}

#[derive(Clone)]
pub struct ProsumerClient {
    http: ClientWithMiddleware,
    base_url: String,
    session: Session,
}

impl ProsumerClient {
    pub fn new(cfg: &BackendConfig, session: Session) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("prosumer-console/0.1"));
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_seconds))
            .default_headers(headers)
            .build()?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(cfg.max_retries);
        let http = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Authenticate and store the token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let body = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp = self
            .http
            .post(self.url("/login/"))
            .json(&body)
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => {
                let pair: TokenPair = resp.json().await?;
                self.session.set(pair).await?;
                info!(username, "logged in");
                Ok(())
            }
            StatusCode::UNAUTHORIZED => Err(Error::InvalidCredentials),
            status => Err(self.backend_error(status, resp).await),
        }
    }

    /// Create a new account. Field validation failures come back as a
    /// 400 with per-field messages, flattened into the error text.
    pub async fn register(&self, username: &str, password: &str) -> Result<()> {
        let body = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp = self
            .http
            .post(self.url("/register/"))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            info!(username, "account registered");
            return Ok(());
        }
        if status == StatusCode::BAD_REQUEST {
            let detail: serde_json::Value = resp.json().await.unwrap_or_default();
            return Err(Error::RegistrationRejected(flatten_field_errors(&detail)));
        }
        Err(self.backend_error(status, resp).await)
    }

    /// Invalidate the refresh token server-side and drop the local session.
    /// Server errors are logged and ignored; the local session is cleared
    /// regardless.
    pub async fn logout(&self) -> Result<()> {
        if let Some(refresh) = self.session.refresh_token().await {
            let access = self.session.access_token().await.unwrap_or_default();
            let result = self
                .http
                .post(self.url("/logout/"))
                .bearer_auth(access)
                .json(&json!({ "refresh": refresh }))
                .send()
                .await;
            if let Err(err) = result {
                warn!(%err, "logout request failed, clearing local session anyway");
            }
        }
        self.session.clear().await;
        info!("logged out");
        Ok(())
    }

    /// Exchange the refresh token for a new access token. Clears the
    /// session when the refresh token itself is rejected.
    async fn refresh_access(&self) -> Result<()> {
        let Some(refresh) = self.session.refresh_token().await else {
            return Err(Error::NotLoggedIn);
        };
        let resp = self
            .http
            .post(self.url("/token/refresh/"))
            .json(&json!({ "refresh": refresh }))
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => {
                let refreshed: RefreshedAccess = resp.json().await?;
                self.session.update_access(refreshed.access).await?;
                debug!("access token refreshed");
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                self.session.clear().await;
                Err(Error::SessionExpired)
            }
            status => Err(self.backend_error(status, resp).await),
        }
    }

    /// POST with bearer auth, refreshing the access token once on 401.
    async fn authed_post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        let Some(access) = self.session.access_token().await else {
            return Err(Error::NotLoggedIn);
        };
        let resp = self
            .http
            .post(self.url(path))
            .bearer_auth(access)
            .json(body)
            .send()
            .await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        debug!(path, "access token rejected, attempting refresh");
        self.refresh_access().await?;
        let access = self
            .session
            .access_token()
            .await
            .ok_or(Error::SessionExpired)?;
        let retry = self
            .http
            .post(self.url(path))
            .bearer_auth(access)
            .json(body)
            .send()
            .await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            self.session.clear().await;
            return Err(Error::SessionExpired);
        }
        Ok(retry)
    }

    async fn backend_error(&self, status: StatusCode, resp: reqwest::Response) -> Error {
        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
        Error::Backend {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl TelemetryBackend for ProsumerClient {
    async fn query(&self, kql: &str) -> Result<Vec<AdxRow>> {
        let resp = self.authed_post("/query_adx/", &json!({ "kql": kql })).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(self.backend_error(status, resp).await);
        }
        let envelope: QueryResponse = resp.json().await?;
        debug!(rows = envelope.data.len(), "query returned");
        Ok(envelope.data)
    }

    async fn search_serial(&self, serial: &str) -> Result<DeviceInfo> {
        let resp = self
            .authed_post("/search_serial/", &json!({ "serial": serial }))
            .await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::SerialNotFound(serial.to_string()));
        }
        if !status.is_success() {
            return Err(self.backend_error(status, resp).await);
        }
        let rows = resp.json::<SearchSerialResponse>().await?.into_rows();
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::SerialNotFound(serial.to_string()))
    }
}

/// Flatten DRF-style `{field: ["msg", ...]}` validation errors into one line.
fn flatten_field_errors(detail: &serde_json::Value) -> String {
    match detail {
        serde_json::Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(field, messages)| match messages {
                    serde_json::Value::Array(list) => {
                        let joined = list
                            .iter()
                            .filter_map(|m| m.as_str())
                            .collect::<Vec<_>>()
                            .join("; ");
                        format!("{field}: {joined}")
                    }
                    other => format!("{field}: {other}"),
                })
                .collect();
            if parts.is_empty() {
                "invalid registration data".to_string()
            } else {
                parts.join(", ")
            }
        }
        serde_json::Value::String(s) => s.clone(),
        _ => "invalid registration data".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_field_errors() {
        let detail = json!({"username": ["already taken"], "password": ["too short", "too common"]});
        let flat = flatten_field_errors(&detail);
        assert!(flat.contains("username: already taken"));
        assert!(flat.contains("password: too short; too common"));

        assert_eq!(flatten_field_errors(&json!("nope")), "nope");
        assert_eq!(
            flatten_field_errors(&json!(null)),
            "invalid registration data"
        );
    }
}
