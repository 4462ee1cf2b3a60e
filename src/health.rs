//! Cloud health aggregation and eager prefetch
//!
//! Fans out over the cloud server list, joins per-server detail calls, and
//! feeds the normalized records into the day-scale cache. The cache is the
//! load-bearing piece: the bearer token is valid for roughly an hour and
//! arrives at most once a day, so the summary captured while it is fresh
//! must remain servable long after the token itself has expired.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::TtlCache;
use crate::data::cloud::{
    normalize_record, CloudClient, CloudError, CloudServerSummary, ServerHealthDetail,
};
use crate::data::{HealthRecord, TokenStatus};
use crate::token::{CloudToken, TokenError, TokenGuardError, TokenStore};

/// Cache key for the aggregated health summary
pub const HEALTH_SUMMARY_CACHE_KEY: &str = "cloud_health_summary";

/// Cache key for the cloud server list
pub const SERVER_LIST_CACHE_KEY: &str = "cloud_server_list";

/// TTL for operational data: listings refetched within minutes
pub const OPERATIONAL_TTL_SECS: u64 = 300;

/// TTL for aggregated health snapshots: servable for a full day
pub const SNAPSHOT_TTL_SECS: u64 = 86_400;

/// Errors surfaced by direct (non-cached) health reads
#[derive(Debug, Error)]
pub enum HealthError {
    /// Token guard failed: nothing was ever submitted, or it has expired
    #[error(transparent)]
    Token(#[from] TokenGuardError),

    /// The server listing itself failed; per-server failures never land here
    #[error("cloud request failed: {0}")]
    Cloud(#[from] CloudError),
}

/// Seam between the aggregator and the cloud transport
#[async_trait]
pub trait HealthBackend: Send + Sync {
    async fn list_servers(&self, bearer: &str) -> Result<Vec<CloudServerSummary>, CloudError>;
    async fn server_health(
        &self,
        bearer: &str,
        server_id: &str,
    ) -> Result<ServerHealthDetail, CloudError>;
}

#[async_trait]
impl HealthBackend for CloudClient {
    async fn list_servers(&self, bearer: &str) -> Result<Vec<CloudServerSummary>, CloudError> {
        CloudClient::list_servers(self, bearer).await
    }

    async fn server_health(
        &self,
        bearer: &str,
        server_id: &str,
    ) -> Result<ServerHealthDetail, CloudError> {
        CloudClient::server_health(self, bearer, server_id).await
    }
}

/// Aggregates cloud hardware health behind the response cache
pub struct HealthService<B> {
    backend: B,
    tokens: TokenStore,
    cache: Arc<TtlCache>,
}

impl<B: HealthBackend + 'static> HealthService<B> {
    pub fn new(backend: B, tokens: TokenStore, cache: Arc<TtlCache>) -> Self {
        Self {
            backend,
            tokens,
            cache,
        }
    }

    /// Accepts a newly delivered bearer token.
    ///
    /// On success every cached entry is dropped (the identity behind the
    /// cached cloud data changed), the token is stored, and a full summary
    /// fetch is launched in the background to capture data while the token
    /// is still valid. The prefetch is fire-and-forget: its failure is
    /// logged and never surfaces here. A malformed token changes nothing.
    pub fn set_token(self: &Arc<Self>, raw: &str) -> Result<CloudToken, TokenError> {
        let token = self.tokens.set(raw)?;
        self.cache.clear();

        let service = Arc::clone(self);
        tokio::spawn(async move {
            match service.get_all_server_health_summary().await {
                Ok(records) => {
                    info!(servers = records.len(), "eager health prefetch complete")
                }
                Err(e) => warn!(error = %e, "eager health prefetch failed"),
            }
        });

        Ok(token)
    }

    /// Drops the stored token.
    ///
    /// Cached snapshots are left in place; they remain servable for the rest
    /// of their day-scale TTL.
    pub fn clear_token(&self) {
        self.tokens.clear();
    }

    /// Reports token and cache state as two independent signals.
    ///
    /// `is_expired` may be true while `has_cached_data` is also true; the
    /// dashboard keeps serving the day-old summary in that window.
    pub fn token_status(&self) -> TokenStatus {
        let state = self.tokens.state();
        TokenStatus {
            has_token: state.has_token,
            is_expired: state.is_expired,
            expires_at: state.expires_at,
            has_cached_data: self.cache.contains(HEALTH_SUMMARY_CACHE_KEY),
        }
    }

    /// Returns the normalized health summary for every cloud server.
    ///
    /// Cache-first: a cached summary is returned without consulting the
    /// token at all. On a miss the token guard applies, the (short-TTL
    /// cached) server list is fetched, and per-server detail calls run
    /// concurrently. An individual detail failure degrades only that
    /// server's record to identity-only; the result is cached under the
    /// day-scale TTL regardless of how many detail calls failed, because a
    /// full retry happens on the next scheduled refresh, not on every read.
    pub async fn get_all_server_health_summary(&self) -> Result<Vec<HealthRecord>, HealthError> {
        if let Some(records) = self.cache.get::<Vec<HealthRecord>>(HEALTH_SUMMARY_CACHE_KEY) {
            return Ok(records);
        }

        let bearer = self.tokens.ensure()?;
        let servers = self.server_list(&bearer).await?;

        let fetches = servers.iter().map(|s| self.fetch_record(&bearer, s));
        let records: Vec<HealthRecord> = join_all(fetches).await;

        self.cache
            .set(HEALTH_SUMMARY_CACHE_KEY, &records, SNAPSHOT_TTL_SECS);
        info!(servers = records.len(), "health summary aggregated and cached");
        Ok(records)
    }

    /// Cloud server list, cached under the operational TTL
    async fn server_list(&self, bearer: &str) -> Result<Vec<CloudServerSummary>, HealthError> {
        if let Some(servers) = self.cache.get::<Vec<CloudServerSummary>>(SERVER_LIST_CACHE_KEY) {
            return Ok(servers);
        }

        match self.backend.list_servers(bearer).await {
            Ok(servers) => {
                self.cache
                    .set(SERVER_LIST_CACHE_KEY, &servers, OPERATIONAL_TTL_SECS);
                Ok(servers)
            }
            Err(CloudError::Unauthorized) => {
                self.tokens.mark_rejected();
                Err(CloudError::Unauthorized.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One per-server detail call, degraded to identity-only on failure
    async fn fetch_record(&self, bearer: &str, summary: &CloudServerSummary) -> HealthRecord {
        match self.backend.server_health(bearer, &summary.id).await {
            Ok(detail) => normalize_record(summary, Some(&detail)),
            Err(e) => {
                if matches!(e, CloudError::Unauthorized) {
                    self.tokens.mark_rejected();
                }
                warn!(server = %summary.id, error = %e, "server detail failed; keeping identity-only record");
                normalize_record(summary, None)
            }
        }
    }
}
