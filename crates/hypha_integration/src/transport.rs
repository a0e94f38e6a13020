//! HTTP access to services registered on a Hypha server.
//!
//! A function call is `POST {server_url}/{workspace}/services/{service_id}/{function}`
//! with the keyword arguments as a JSON object body. The response body is the
//! function's JSON return value.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::error::ApiError;
use tracing::debug;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyphaConfig {
    pub server_url: Url,
    pub workspace: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl HyphaConfig {
    pub fn new(server_url: &str, workspace: impl Into<String>) -> Result<Self> {
        let server_url = Url::parse(server_url)
            .with_context(|| format!("invalid hypha server url '{server_url}'"))?;
        if server_url.cannot_be_a_base() {
            return Err(anyhow!("hypha server url '{server_url}' cannot carry a path"));
        }
        Ok(Self {
            server_url,
            workspace: workspace.into(),
            token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|token| !token.trim().is_empty());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Clone)]
pub struct HyphaClient {
    http: Client,
    config: HyphaConfig,
}

impl HyphaClient {
    pub fn new(config: HyphaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build hypha http client")?;
        Ok(Self { http, config })
    }

    pub fn function_url(&self, service_id: &str, function: &str) -> Result<Url> {
        let mut url = self.config.server_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("hypha server url cannot carry a path"))?
            .pop_if_empty()
            .extend([
                self.config.workspace.as_str(),
                "services",
                service_id,
                function,
            ]);
        Ok(url)
    }

    pub async fn call<A, R>(&self, service_id: &str, function: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.function_url(service_id, function)?;
        debug!(service_id, function, %url, "calling hypha service function");

        let mut request = self.http.post(url).json(args);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("failed to reach service '{service_id}' for '{function}'"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "service '{service_id}' function '{function}' failed ({status}): {}",
                describe_failure(status, &body)
            ));
        }

        response.json::<R>().await.with_context(|| {
            format!("service '{service_id}' function '{function}' returned an unexpected payload")
        })
    }

    pub async fn invoke<A>(&self, service_id: &str, function: &str, args: &A) -> Result<()>
    where
        A: Serialize + ?Sized + Sync,
    {
        let _: serde_json::Value = self.call(service_id, function, args).await?;
        Ok(())
    }
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    if let Ok(error) = serde_json::from_str::<ApiError>(body) {
        return error.message;
    }
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(detail) = map.get("detail").and_then(|detail| detail.as_str()) {
            return detail.to_string();
        }
    }
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        body.trim().to_string()
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
