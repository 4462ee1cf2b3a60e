//! Fleet dashboard statistics
//!
//! Fans in over the VMS camera and server listings to produce the
//! pre-computed counts shown on the dashboard landing page. Servers named in
//! the standby set are excluded from active counts; each active server's
//! address is resolved best-effort from its name. Pure read-aggregation
//! whose only side effect is populating its own cache entry.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;

use crate::cache::TtlCache;
use crate::data::vms::{VmsCamera, VmsClient, VmsError, VmsServer};
use crate::data::{DashboardStats, ServerStats};
use crate::health::OPERATIONAL_TTL_SECS;
use crate::resolve::resolve_host;
use crate::session::{LoginBackend, SessionError, SessionManager};

/// Cache key for the dashboard statistics
pub const DASHBOARD_STATS_CACHE_KEY: &str = "dashboard_stats";

/// Seam between the aggregator and the VMS listing calls
#[async_trait]
pub trait FleetBackend: Send + Sync {
    async fn list_cameras(&self, session_id: &str) -> Result<Vec<VmsCamera>, VmsError>;
    async fn list_servers(&self, session_id: &str) -> Result<Vec<VmsServer>, VmsError>;
}

#[async_trait]
impl FleetBackend for VmsClient {
    async fn list_cameras(&self, session_id: &str) -> Result<Vec<VmsCamera>, VmsError> {
        VmsClient::list_cameras(self, session_id).await
    }

    async fn list_servers(&self, session_id: &str) -> Result<Vec<VmsServer>, VmsError> {
        VmsClient::list_servers(self, session_id).await
    }
}

/// Aggregates fleet counts behind the response cache
pub struct DashboardService<B> {
    sessions: Arc<SessionManager<B>>,
    cache: Arc<TtlCache>,
    standby_servers: HashSet<String>,
}

impl<B: LoginBackend + FleetBackend> DashboardService<B> {
    pub fn new(
        sessions: Arc<SessionManager<B>>,
        cache: Arc<TtlCache>,
        standby_servers: HashSet<String>,
    ) -> Self {
        Self {
            sessions,
            cache,
            standby_servers,
        }
    }

    /// Returns the fleet statistics, computing them on a cache miss.
    ///
    /// Camera and server listings are fetched concurrently, both through the
    /// session retry wrapper, so a session that expired since the last call
    /// renews transparently.
    pub async fn get_stats(&self) -> Result<DashboardStats, SessionError> {
        if let Some(stats) = self.cache.get::<DashboardStats>(DASHBOARD_STATS_CACHE_KEY) {
            return Ok(stats);
        }

        let backend = self.sessions.backend();
        let (cameras, servers) = tokio::try_join!(
            self.sessions
                .with_session(move |sid| async move { backend.list_cameras(&sid).await }),
            self.sessions
                .with_session(move |sid| async move { backend.list_servers(&sid).await }),
        )?;

        let active: Vec<&VmsServer> = servers
            .iter()
            .filter(|s| !self.standby_servers.contains(&s.name))
            .collect();
        let resolutions = join_all(active.iter().map(|s| resolve_host(&s.name))).await;
        let addresses: HashMap<String, Option<String>> = active
            .iter()
            .zip(resolutions)
            .map(|(server, ip)| (server.id.clone(), ip.map(|ip| ip.to_string())))
            .collect();

        let stats = compute_stats(&cameras, &servers, &self.standby_servers, &addresses);
        self.cache
            .set(DASHBOARD_STATS_CACHE_KEY, &stats, OPERATIONAL_TTL_SECS);
        Ok(stats)
    }
}

/// Computes per-server and fleet counts from the raw listings.
///
/// Standby servers are skipped entirely; cameras without a server
/// association contribute to no row and no total.
pub(crate) fn compute_stats(
    cameras: &[VmsCamera],
    servers: &[VmsServer],
    standby: &HashSet<String>,
    addresses: &HashMap<String, Option<String>>,
) -> DashboardStats {
    let mut server_stats = Vec::new();

    for server in servers {
        if standby.contains(&server.name) {
            continue;
        }

        let mut camera_count = 0;
        let mut channel_count = 0;
        let mut view_count = 0;
        for camera in cameras {
            if camera.server_id.as_deref() != Some(server.id.as_str()) {
                continue;
            }
            camera_count += 1;
            channel_count += camera.channels;
            if camera.connected {
                view_count += 1;
            }
        }

        server_stats.push(ServerStats {
            id: server.id.clone(),
            name: server.name.clone(),
            address: addresses.get(&server.id).cloned().flatten(),
            camera_count,
            channel_count,
            view_count,
        });
    }

    DashboardStats {
        server_count: server_stats.len(),
        total_views: server_stats.iter().map(|s| s.view_count).sum(),
        total_camera_channels: server_stats.iter().map(|s| s.channel_count).sum(),
        servers: server_stats,
        generated_at: Utc::now(),
    }
}
