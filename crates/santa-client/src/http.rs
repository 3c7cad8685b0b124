//! Thin JSON transport over reqwest.
//!
//! Pure I/O plumbing: builds URLs, injects the bearer header from the
//! session context and maps non-2xx responses to `ApiError::Status`.
//! The status-code contract (404/403/401/409/460/461) is interpreted by
//! the auth and group layers, not here.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::session::SessionContext;
use santa_core::ClientConfig;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid api url: {0}")]
    Url(#[from] url::ParseError),

    #[error("server returned {0}: {1}")]
    Status(StatusCode, String),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status(code, _) => Some(*code),
            ApiError::Http(e) => e.status(),
            ApiError::Url(_) => None,
        }
    }
}

pub struct ApiClient {
    base: Url,
    http: Client,
    session: Mutex<SessionContext>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: SessionContext) -> Result<Self, ApiError> {
        let base = Url::parse(&config.api_url())?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            base,
            http,
            session: Mutex::new(session),
        })
    }

    /// Run a closure against the session context under its lock.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut SessionContext) -> R) -> R {
        f(&mut self.session.lock())
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        // base has no trailing slash; paths start with '/'
        Ok(Url::parse(&format!("{}{}", self.base, path))?)
    }

    fn auth_header(&self) -> Option<String> {
        self.session.lock().auth_header()
    }

    async fn check<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status(status, body));
        }
        Ok(response.json::<T>().await?)
    }

    async fn check_empty(response: reqwest::Response) -> Result<(), ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status(status, body));
        }
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let mut req = self.http.get(self.url(path)?);
        if let Some(header) = self.auth_header() {
            req = req.header("Authorization", header);
        }
        Self::check(req.send().await?).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let mut req = self.http.post(self.url(path)?).json(body);
        if let Some(header) = self.auth_header() {
            req = req.header("Authorization", header);
        }
        Self::check(req.send().await?).await
    }

    /// POST for endpoints that return no body.
    pub async fn post_empty<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let mut req = self.http.post(self.url(path)?).json(body);
        if let Some(header) = self.auth_header() {
            req = req.header("Authorization", header);
        }
        Self::check_empty(req.send().await?).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let mut req = self.http.put(self.url(path)?).json(body);
        if let Some(header) = self.auth_header() {
            req = req.header("Authorization", header);
        }
        Self::check(req.send().await?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let mut req = self.http.delete(self.url(path)?);
        if let Some(header) = self.auth_header() {
            req = req.header("Authorization", header);
        }
        Self::check_empty(req.send().await?).await
    }
}

/// Shared handle used by the API surfaces.
pub type SharedApiClient = Arc<ApiClient>;
