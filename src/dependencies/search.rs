//! Search index warmup.
//!
//! # Responsibilities
//! - Check the index health endpoint before workers start
//! - Report cluster status as health detail

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::json;
use tokio::time;

use crate::config::SearchSettings;
use crate::dependencies::{Dependency, Readiness};
use crate::error::BoxError;

pub const SEARCH_DEPENDENCY: &str = "search";

/// Search index checked over HTTP.
pub struct HttpSearchIndex {
    settings: SearchSettings,
    client: Client<HttpConnector, Body>,
}

impl HttpSearchIndex {
    pub fn new(settings: SearchSettings) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self { settings, client }
    }

    fn health_uri(&self) -> String {
        format!(
            "{}{}",
            self.settings.url.trim_end_matches('/'),
            self.settings.health_path
        )
    }
}

#[async_trait]
impl Dependency for HttpSearchIndex {
    fn name(&self) -> &str {
        SEARCH_DEPENDENCY
    }

    async fn warm(&self) -> Result<Readiness, BoxError> {
        if !self.settings.enabled {
            return Ok(Readiness::Disabled(json!({ "disabled": true })));
        }

        let uri = self.health_uri();
        let request = Request::builder()
            .method("GET")
            .uri(&uri)
            .header("user-agent", "platform-runtime-warmup")
            .body(Body::empty())?;

        let timeout = Duration::from_millis(self.settings.timeout_ms);
        let response = match time::timeout(timeout, self.client.request(request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(format!("search index health check timed out after {}ms", self.settings.timeout_ms).into())
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(format!("search index answered {} at {}", status, uri).into());
        }

        tracing::debug!(uri = %uri, status = %status, "Search index reachable");
        Ok(Readiness::Ready(json!({ "url": self.settings.url, "status": status.as_u16() })))
    }
}
