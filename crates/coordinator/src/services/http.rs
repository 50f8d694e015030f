use std::time::Duration;

use common::wire::ErrorResponse;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CoordinatorError, Result};

/// JSON client for one peer service. Every request carries a deadline.
#[derive(Debug, Clone)]
pub(crate) struct PeerClient {
    client: Client,
    service: &'static str,
    base_url: String,
    timeout: Duration,
}

impl PeerClient {
    pub(crate) fn new(service: &'static str, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            service,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GETs `path`. A 404 answer is `None`.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self.send(self.client.get(self.url(path))).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.decode(response).await.map(Some)
    }

    pub(crate) async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.client.post(self.url(path))).await?;
        self.decode(response).await
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(self.client.post(self.url(path)).json(body))
            .await?;
        self.decode(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.unavailable(e))
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(CoordinatorError::RemoteRejected {
                service: self.service,
                status: status.as_u16(),
                message,
            });
        }
        response.json().await.map_err(|e| self.unavailable(e))
    }

    fn unavailable(&self, error: reqwest::Error) -> CoordinatorError {
        let reason = if error.is_timeout() {
            format!("request timed out after {} ms", self.timeout.as_millis())
        } else {
            error.to_string()
        };
        CoordinatorError::RemoteUnavailable {
            service: self.service,
            reason,
        }
    }
}
