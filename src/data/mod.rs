//! Core data models for the fleet dashboard
//!
//! This module contains the normalized types shared across the services:
//! fleet statistics derived from the on-prem VMS, hardware-health snapshots
//! derived from the cloud API, and the token status reported to operators.
//! Consumers never see raw upstream shapes; the client submodules map wire
//! records into these types.

pub mod cloud;
pub mod vms;

pub use cloud::{CloudClient, CloudError, CloudServerSummary, ServerHealthDetail};
pub use vms::{VmsCamera, VmsClient, VmsError, VmsServer};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection state of a server as reported by the cloud API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Unknown,
}

/// A power supply unit inside a server chassis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSupply {
    /// Identifier or slot label
    pub id: String,
    /// Reported status string, e.g. "ok" or "failed"
    pub status: Option<String>,
}

/// A temperature probe reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureProbe {
    /// Identifier or location label
    pub id: String,
    /// Reported status string
    pub status: Option<String>,
    /// Current reading in degrees Celsius
    pub reading_celsius: Option<f64>,
}

/// A fan or other cooling device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoolingDevice {
    /// Identifier or slot label
    pub id: String,
    /// Reported status string
    pub status: Option<String>,
    /// Current speed in RPM
    pub speed_rpm: Option<u32>,
}

/// A physical disk in a server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskHealth {
    /// Identifier or bay label
    pub id: String,
    /// Reported status string
    pub status: Option<String>,
    /// Raw capacity in bytes
    pub capacity_bytes: Option<u64>,
}

/// Chassis hardware inventory for one server.
///
/// Every sub-list defaults to an empty sequence when the upstream omits the
/// section; consumers can always iterate without null checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareHealth {
    pub power_supplies: Vec<PowerSupply>,
    pub temperature_probes: Vec<TemperatureProbe>,
    pub cooling_devices: Vec<CoolingDevice>,
    pub disks: Vec<DiskHealth>,
}

/// CPU load snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuHealth {
    /// Utilization percentage (0-100)
    pub usage_percent: Option<f64>,
    /// Package temperature in degrees Celsius
    pub temperature_celsius: Option<f64>,
}

/// Memory usage snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryHealth {
    /// Bytes in use
    pub used_bytes: Option<u64>,
    /// Bytes still available
    pub available_bytes: Option<u64>,
    /// Percentage of total in use; `None` when the total is zero or unknown
    pub usage_percent: Option<u8>,
}

/// A network adapter on a server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAdapter {
    /// Adapter name
    pub name: Option<String>,
    /// Link status string
    pub status: Option<String>,
    /// Negotiated link speed in Mbps
    pub speed_mbps: Option<u32>,
}

/// Network health section for one server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkHealth {
    pub adapters: Vec<NetworkAdapter>,
}

/// Camera licensing information for one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseInfo {
    /// License edition or kind
    pub kind: Option<String>,
    /// Camera channels consumed
    pub count_used: Option<u32>,
    /// Camera channels licensed in total
    pub count_total: Option<u32>,
}

/// Video-analytics service information for one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsInfo {
    /// Reported analytics service status
    pub status: Option<String>,
    /// Queued items awaiting processing
    pub backlog: Option<u32>,
}

/// Normalized hardware-health snapshot for one server.
///
/// A record degraded by a failed detail call carries only the identity
/// fields from the server listing: `hardware` stays at its empty default and
/// every optional section is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Cloud server identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Connectivity as seen from the cloud
    pub connection_state: ConnectionState,
    /// Chassis hardware inventory
    pub hardware: HardwareHealth,
    /// CPU snapshot
    pub cpu: Option<CpuHealth>,
    /// Memory snapshot
    pub memory: Option<MemoryHealth>,
    /// Network snapshot
    pub network: Option<NetworkHealth>,
    /// Licensing snapshot
    pub license: Option<LicenseInfo>,
    /// Analytics snapshot
    pub analytics: Option<AnalyticsInfo>,
    /// When this record was assembled
    pub fetched_at: DateTime<Utc>,
}

/// Per-server slice of the dashboard statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStats {
    /// VMS server identifier
    pub id: String,
    /// Server name
    pub name: String,
    /// Resolved network address, if name resolution succeeded
    pub address: Option<String>,
    /// Cameras attached to this server
    pub camera_count: u32,
    /// Total camera channels across those cameras
    pub channel_count: u32,
    /// Cameras currently connected and viewable
    pub view_count: u32,
}

/// Pre-computed fleet counts for the dashboard landing page.
///
/// Derived from the VMS listings on demand and never persisted beyond its
/// cache TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// Active (non-standby) servers in the fleet
    pub server_count: usize,
    /// Connected, viewable cameras across the fleet
    pub total_views: u32,
    /// Camera channels across the fleet
    pub total_camera_channels: u32,
    /// Per-server breakdown for active servers
    pub servers: Vec<ServerStats>,
    /// When these counts were computed
    pub generated_at: DateTime<Utc>,
}

/// Operator-facing view of the cloud token state.
///
/// `is_expired` and `has_cached_data` are deliberately independent signals:
/// the dashboard keeps serving day-old health data even after the token
/// itself has expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenStatus {
    /// A token has been submitted and not cleared
    pub has_token: bool,
    /// The buffered expiry has passed (or no token exists)
    pub is_expired: bool,
    /// Decoded expiry claim, possibly collapsed after an upstream rejection
    pub expires_at: Option<DateTime<Utc>>,
    /// An unexpired health summary is present in the cache
    pub has_cached_data: bool,
}
