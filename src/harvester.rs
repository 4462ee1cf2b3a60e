//! Token-harvester control surface
//!
//! The bearer token is produced by an external process that logs into the
//! cloud portal on a fixed schedule and submits whatever token it
//! intercepts. That harvester exposes a small HTTP surface of its own; this
//! client covers the operational "harvest a token now" signal and a
//! liveness probe. Neither is part of the credential contract itself.

use reqwest::Client;
use thiserror::Error;
use tracing::info;

/// Errors from the harvester control surface
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// No trigger endpoint was configured for this deployment
    #[error("no harvester endpoint configured")]
    NotConfigured,

    /// The trigger request could not be delivered
    #[error("harvester trigger failed")]
    Trigger(#[source] reqwest::Error),

    /// The harvester answered with a non-success status
    #[error("harvester trigger refused ({status})")]
    Refused { status: u16 },
}

/// Client for the harvester's trigger and health endpoints
#[derive(Debug, Clone)]
pub struct HarvesterClient {
    http: Client,
    base_url: Option<String>,
}

impl HarvesterClient {
    /// Creates a client; `base_url` is `None` when no harvester is deployed
    pub fn new(http: Client, base_url: Option<String>) -> Self {
        Self { http, base_url }
    }

    /// Asks the harvester to fetch and submit a fresh token immediately.
    ///
    /// The token itself still arrives through the normal intake path once
    /// the harvester completes its browser run.
    pub async fn trigger_refresh(&self) -> Result<(), HarvesterError> {
        let base = self.base_url.as_ref().ok_or(HarvesterError::NotConfigured)?;
        let url = format!("{base}/trigger");
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(HarvesterError::Trigger)?;

        if response.status().is_success() {
            info!("token harvest triggered");
            Ok(())
        } else {
            Err(HarvesterError::Refused {
                status: response.status().as_u16(),
            })
        }
    }

    /// Best-effort liveness probe of the harvester process
    pub async fn alive(&self) -> bool {
        let Some(base) = &self.base_url else {
            return false;
        };
        match self.http.get(format!("{base}/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_without_endpoint_is_not_configured() {
        let client = HarvesterClient::new(Client::new(), None);
        let err = client.trigger_refresh().await.unwrap_err();
        assert!(matches!(err, HarvesterError::NotConfigured));
    }

    #[tokio::test]
    async fn test_alive_without_endpoint_is_false() {
        let client = HarvesterClient::new(Client::new(), None);
        assert!(!client.alive().await);
    }
}
