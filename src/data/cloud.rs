//! Vendor cloud hardware-health API client
//!
//! Fetches the cloud server list and per-server hardware detail, and
//! normalizes the heterogeneous upstream shapes into `HealthRecord`. Every
//! call carries the externally supplied bearer token; a 401 means the token
//! has expired upstream regardless of what its claims say.

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    AnalyticsInfo, ConnectionState, CoolingDevice, CpuHealth, DiskHealth, HardwareHealth,
    HealthRecord, LicenseInfo, MemoryHealth, NetworkAdapter, NetworkHealth, PowerSupply,
    TemperatureProbe,
};

/// Errors that can occur when talking to the cloud API
#[derive(Debug, Error)]
pub enum CloudError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The bearer token was not accepted; it has expired upstream
    #[error("cloud token rejected")]
    Unauthorized,

    /// Unexpected response status
    #[error("unexpected cloud response ({status})")]
    Api { status: u16 },

    /// Failed to parse a response body
    #[error("failed to parse cloud response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A server as it appears in the cloud server list.
///
/// Also serialized into the short-TTL cache so the prefetch window does not
/// multiply listing traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudServerSummary {
    pub id: String,
    pub name: Option<String>,
    pub connection_state: Option<String>,
}

/// Raw per-server health detail as the cloud reports it.
///
/// Every section is optional; normalization degrades missing sections to
/// empty sequences or `None` rather than failing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHealthDetail {
    pub hardware: Option<HardwareSection>,
    pub cpu: Option<CpuSection>,
    pub memory: Option<MemorySection>,
    pub network: Option<NetworkSection>,
    pub license: Option<LicenseSection>,
    pub analytics: Option<AnalyticsSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareSection {
    pub power_supplies: Option<Vec<PowerSupplyRecord>>,
    pub temperature_probes: Option<Vec<TemperatureProbeRecord>>,
    pub cooling_devices: Option<Vec<CoolingDeviceRecord>>,
    pub disks: Option<Vec<DiskRecord>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerSupplyRecord {
    pub id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureProbeRecord {
    pub id: Option<String>,
    pub status: Option<String>,
    pub reading_celsius: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoolingDeviceRecord {
    pub id: Option<String>,
    pub status: Option<String>,
    pub speed_rpm: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskRecord {
    pub id: Option<String>,
    pub status: Option<String>,
    pub capacity_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuSection {
    pub usage_percent: Option<f64>,
    pub temperature_celsius: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySection {
    pub used_bytes: Option<u64>,
    pub available_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSection {
    pub adapters: Option<Vec<NetworkAdapterRecord>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAdapterRecord {
    pub name: Option<String>,
    pub status: Option<String>,
    pub speed_mbps: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseSection {
    pub kind: Option<String>,
    pub count_used: Option<u32>,
    pub count_total: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSection {
    pub status: Option<String>,
    pub backlog: Option<u32>,
}

/// Server list response
#[derive(Debug, Deserialize)]
struct ServersResponse {
    servers: Vec<CloudServerSummary>,
}

/// Client for the cloud hardware-health API
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: Client,
    base_url: String,
}

impl CloudClient {
    /// Creates a new client against the given base URL
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Lists the servers visible to this cloud account
    pub async fn list_servers(&self, bearer: &str) -> Result<Vec<CloudServerSummary>, CloudError> {
        let url = format!("{}/servers", self.base_url);
        let text = self.get_bearer(&url, bearer).await?;
        let parsed: ServersResponse = serde_json::from_str(&text)?;
        Ok(parsed.servers)
    }

    /// Fetches hardware-health detail for one server
    pub async fn server_health(
        &self,
        bearer: &str,
        server_id: &str,
    ) -> Result<ServerHealthDetail, CloudError> {
        let url = format!("{}/servers/{}/health", self.base_url, server_id);
        let text = self.get_bearer(&url, bearer).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Performs a bearer-authenticated GET, mapping 401 to `Unauthorized`
    async fn get_bearer(&self, url: &str, bearer: &str) -> Result<String, CloudError> {
        let response = self.http.get(url).bearer_auth(bearer).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(CloudError::Unauthorized),
            status if status.is_success() => Ok(response.text().await?),
            status => Err(CloudError::Api {
                status: status.as_u16(),
            }),
        }
    }
}

/// Computes memory utilization as `round(used / (used + available) * 100)`.
///
/// Returns `None` when the total is zero so a server reporting no memory
/// figures never causes a division error.
pub fn memory_usage_percent(used_bytes: u64, available_bytes: u64) -> Option<u8> {
    let total = used_bytes.checked_add(available_bytes)?;
    if total == 0 {
        return None;
    }
    Some(((used_bytes as f64 / total as f64) * 100.0).round() as u8)
}

/// Maps the upstream connection-state string into the crate enum
fn map_connection_state(raw: Option<&str>) -> ConnectionState {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("connected") | Some("online") => ConnectionState::Connected,
        Some("disconnected") | Some("offline") => ConnectionState::Disconnected,
        _ => ConnectionState::Unknown,
    }
}

/// Normalizes a {listing, detail} pair into a `HealthRecord`.
///
/// With `detail` absent (the per-server call failed) the record carries only
/// identity fields: empty hardware lists and no optional sections. Partial
/// data beats none.
pub fn normalize_record(
    summary: &CloudServerSummary,
    detail: Option<&ServerHealthDetail>,
) -> HealthRecord {
    let mut record = HealthRecord {
        id: summary.id.clone(),
        name: summary.name.clone().unwrap_or_else(|| summary.id.clone()),
        connection_state: map_connection_state(summary.connection_state.as_deref()),
        hardware: HardwareHealth::default(),
        cpu: None,
        memory: None,
        network: None,
        license: None,
        analytics: None,
        fetched_at: Utc::now(),
    };

    let Some(detail) = detail else {
        return record;
    };

    if let Some(hw) = &detail.hardware {
        record.hardware = normalize_hardware(hw);
    }
    record.cpu = detail.cpu.as_ref().map(|c| CpuHealth {
        usage_percent: c.usage_percent,
        temperature_celsius: c.temperature_celsius,
    });
    record.memory = detail.memory.as_ref().map(|m| MemoryHealth {
        used_bytes: m.used_bytes,
        available_bytes: m.available_bytes,
        usage_percent: match (m.used_bytes, m.available_bytes) {
            (Some(used), Some(available)) => memory_usage_percent(used, available),
            _ => None,
        },
    });
    record.network = detail.network.as_ref().map(|n| NetworkHealth {
        adapters: n
            .adapters
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|a| NetworkAdapter {
                name: a.name.clone(),
                status: a.status.clone(),
                speed_mbps: a.speed_mbps,
            })
            .collect(),
    });
    record.license = detail.license.as_ref().map(|l| LicenseInfo {
        kind: l.kind.clone(),
        count_used: l.count_used,
        count_total: l.count_total,
    });
    record.analytics = detail.analytics.as_ref().map(|a| AnalyticsInfo {
        status: a.status.clone(),
        backlog: a.backlog,
    });

    record
}

/// Flattens the optional hardware sub-lists, defaulting each to empty
fn normalize_hardware(section: &HardwareSection) -> HardwareHealth {
    HardwareHealth {
        power_supplies: section
            .power_supplies
            .as_deref()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, p)| PowerSupply {
                id: p.id.clone().unwrap_or_else(|| format!("psu-{i}")),
                status: p.status.clone(),
            })
            .collect(),
        temperature_probes: section
            .temperature_probes
            .as_deref()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, t)| TemperatureProbe {
                id: t.id.clone().unwrap_or_else(|| format!("probe-{i}")),
                status: t.status.clone(),
                reading_celsius: t.reading_celsius,
            })
            .collect(),
        cooling_devices: section
            .cooling_devices
            .as_deref()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, c)| CoolingDevice {
                id: c.id.clone().unwrap_or_else(|| format!("fan-{i}")),
                status: c.status.clone(),
                speed_rpm: c.speed_rpm,
            })
            .collect(),
        disks: section
            .disks
            .as_deref()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, d)| DiskHealth {
                id: d.id.clone().unwrap_or_else(|| format!("disk-{i}")),
                status: d.status.clone(),
                capacity_bytes: d.capacity_bytes,
            })
            .collect(),
    }
}
