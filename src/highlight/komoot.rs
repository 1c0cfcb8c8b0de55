use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::{Highlight, HighlightResolver};
use crate::fetch::DEFAULT_TIMEOUT_SECS;

pub const DEFAULT_API_BASE: &str = "https://api.komoot.de/v007";

/// Resolves highlights through the public route API
/// (`GET {api_base}/highlights/{id}`).
pub struct KomootHighlightResolver {
    api_base: String,
    client: Client,
}

impl KomootHighlightResolver {
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_base, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(api_base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl HighlightResolver for KomootHighlightResolver {
    fn name(&self) -> &str {
        "komoot"
    }

    async fn resolve(&self, id: &str) -> Result<Highlight> {
        let url = format!("{}/highlights/{id}", self.api_base);
        log::debug!("GET {url}");

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/hal+json, application/json")
            .send()
            .await
            .context("Highlight request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("Failed to read highlight response")?;

        if !status.is_success() {
            anyhow::bail!("Highlight API error ({}): {}", status, text);
        }

        serde_json::from_str(&text).context("Failed to parse highlight response JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_highlight() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/highlights/4711")
            .with_status(200)
            .with_header("content-type", "application/hal+json")
            .with_body(r#"{"base_name": "Zugspitze", "_embedded": {"creator": {"display_name": "Jane"}}}"#)
            .create_async()
            .await;

        let resolver = KomootHighlightResolver::new(format!("{}/", server.url())).unwrap();
        let h = resolver.resolve("4711").await.unwrap();
        assert_eq!(h.description(), "Zugspitze");
        assert_eq!(h.author(), "Jane");
    }

    #[tokio::test]
    async fn missing_fields_are_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/highlights/1")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let resolver = KomootHighlightResolver::new(server.url()).unwrap();
        let h = resolver.resolve("1").await.unwrap();
        assert_eq!(h.description(), "");
        assert_eq!(h.author(), "");
    }

    #[tokio::test]
    async fn http_error_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/highlights/2")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let resolver = KomootHighlightResolver::new(server.url()).unwrap();
        let err = resolver.resolve("2").await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn invalid_json_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/highlights/3")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let resolver = KomootHighlightResolver::new(server.url()).unwrap();
        assert!(resolver.resolve("3").await.is_err());
    }
}
