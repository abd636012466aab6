//! HTTP connector: base URL handling, session token, uniform error mapping.

use bytes::Bytes;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use matterline_shared::constants::API_PREFIX;

use crate::error::{NetError, Result};

/// Thin wrapper around [`reqwest::Client`] carrying the API base URL and
/// the session token. One instance lives for the whole session; the token
/// slot is cleared and refilled across re-logins.
#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl HttpClient {
    /// Build a connector for the given login domain. A bare domain gets
    /// `https://`; an explicit `http://` is honored for local servers.
    pub fn new(domain: &str) -> Self {
        let trimmed = domain.trim_end_matches('/');
        let base = if trimmed.contains("://") {
            format!("{trimmed}{API_PREFIX}")
        } else {
            format!("https://{trimmed}{API_PREFIX}")
        };

        Self {
            client: reqwest::Client::new(),
            base,
            token: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map a non-success status to [`NetError::Status`], keeping the body
    /// text the server sent along.
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "request failed");
        Err(NetError::Status {
            status: status.as_u16(),
            body,
        })
    }

    // ------------------------------------------------------------------
    // Verb helpers
    // ------------------------------------------------------------------

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.authorize(self.client.get(self.url(path))).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn get_bytes(&self, path: &str) -> Result<Bytes> {
        let response = self.authorize(self.client.get(self.url(path))).send().await?;
        Ok(Self::check(response).await?.bytes().await?)
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .authorize(self.client.post(self.url(path)).json(body))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// POST whose response body is not consumed (the confirmation arrives
    /// out of band, e.g. as a `channel_viewed` event).
    pub async fn post_json_discard<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let response = self
            .authorize(self.client.post(self.url(path)).json(body))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// POST returning the full response, for endpoints whose interesting
    /// payload is a header (login).
    pub async fn post_json_raw<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        let response = self
            .authorize(self.client.post(self.url(path)).json(body))
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn post_bytes<T: DeserializeOwned>(&self, path: &str, body: Bytes) -> Result<T> {
        let response = self
            .authorize(
                self.client
                    .post(self.url(path))
                    .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                    .body(body),
            )
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .authorize(self.client.put(self.url(path)).json(body))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}
