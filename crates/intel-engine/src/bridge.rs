//! HTTP bridge to the remote analysis backend.
//!
//! One call per investigation: `POST <base_url>/run` with the fixed JSON
//! body and the shared-secret header. A 200 body is returned verbatim as
//! JSON; everything else becomes an [`EngineError`] value.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use intel_core::config::{BackendConfig, Secret};
use intel_core::types::EngineRequest;

use crate::error::EngineError;

/// Header carrying the backend shared secret.
pub const ENGINE_KEY_HEADER: &str = "x-engine-key";

/// Characters of the probe response body kept in a [`ProbeReport`].
const PROBE_EXCERPT_CHARS: usize = 200;

/// Anything that can turn an [`EngineRequest`] into an evidence payload.
///
/// [`EngineBridge`] is the production implementation; tests substitute
/// canned sources.
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    async fn run(&self, request: &EngineRequest) -> Result<Value, EngineError>;
}

/// Result of a liveness probe against the backend root.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub status: u16,
    pub live: bool,
    pub excerpt: String,
    pub elapsed: Duration,
}

/// Client for the backend `/run` endpoint.
pub struct EngineBridge {
    http: reqwest::Client,
    base_url: Url,
    api_key: Secret,
    timeout: Duration,
}

impl EngineBridge {
    pub fn new(base_url: Url, api_key: Secret, timeout: Duration) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url,
            api_key,
            timeout,
        })
    }

    pub fn from_config(config: &BackendConfig, api_key: Secret) -> Result<Self, EngineError> {
        let base_url = config
            .base_url()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Self::new(base_url, api_key, config.timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `<base_url>/run`, keeping any path prefix on the base URL.
    pub fn run_url(&self) -> Result<Url, EngineError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                EngineError::Config(format!("base URL '{}' cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .push("run");
        Ok(url)
    }

    /// `GET <base_url>` to check (and wake) the backend.
    pub async fn probe(&self) -> Result<ProbeReport, EngineError> {
        let started = Instant::now();
        let resp = self
            .http
            .get(self.base_url.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.classify(e))?;
        let excerpt: String = body.chars().take(PROBE_EXCERPT_CHARS).collect();

        let report = ProbeReport {
            status: status.as_u16(),
            live: status.is_success(),
            excerpt,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            status = report.status,
            live = report.live,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Backend probe finished"
        );
        Ok(report)
    }

    fn classify(&self, err: reqwest::Error) -> EngineError {
        if err.is_timeout() {
            EngineError::Timeout(self.timeout)
        } else {
            EngineError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl EvidenceSource for EngineBridge {
    async fn run(&self, request: &EngineRequest) -> Result<Value, EngineError> {
        let url = self.run_url()?;
        let started = Instant::now();
        tracing::info!(
            company = %request.target_company,
            portal = %request.portal_url,
            mode = %request.execution_mode,
            "Dispatching engine request"
        );

        let resp = self
            .http
            .post(url)
            .header(ENGINE_KEY_HEADER, self.api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.classify(e))?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if status != reqwest::StatusCode::OK {
            tracing::warn!(status = status.as_u16(), elapsed_ms, "Backend returned an error status");
            return Err(EngineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value =
            serde_json::from_str(&body).map_err(|e| EngineError::Decode(e.to_string()))?;
        tracing::info!(elapsed_ms, "Engine request completed");
        Ok(payload)
    }
}
