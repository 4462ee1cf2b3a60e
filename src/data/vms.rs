//! On-premises VMS API client
//!
//! Talks to the video-management system's REST surface: the custom
//! challenge-response login plus the camera and server listings the dashboard
//! aggregates over. The session obtained at login rides along on every call
//! in the `x-session-token` header; a 401 on any listing signals that the
//! session has silently expired upstream.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header carrying the VMS session on authenticated calls
const SESSION_HEADER: &str = "x-session-token";

/// Errors that can occur when talking to the VMS
#[derive(Debug, Error)]
pub enum VmsError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The VMS refused the submitted credentials
    #[error("credentials rejected")]
    LoginRejected,

    /// The session was not accepted; it has expired upstream
    #[error("session expired")]
    SessionExpired,

    /// Unexpected response status
    #[error("unexpected VMS response ({status})")]
    Api { status: u16 },

    /// Failed to parse a response body
    #[error("failed to parse VMS response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Login payload submitted to the VMS.
///
/// `authorization_token` is the one-time challenge proof computed by the
/// session layer; the VMS validates it against the same shared key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub client_name: String,
    pub authorization_token: String,
}

/// Successful login response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub session_id: String,
}

/// A camera known to the VMS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmsCamera {
    /// Camera identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Identifier of the server the camera records to
    pub server_id: Option<String>,
    /// Number of video channels (multisensor cameras report more than one)
    pub channels: u32,
    /// Whether the camera is currently connected and viewable
    pub connected: bool,
}

/// A recording server known to the VMS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmsServer {
    /// Server identifier
    pub id: String,
    /// Server name, also used for best-effort address resolution
    pub name: String,
}

/// Client for the on-prem VMS REST API
#[derive(Debug, Clone)]
pub struct VmsClient {
    http: Client,
    base_url: String,
}

impl VmsClient {
    /// Creates a new client against the given base URL
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Submits the login request.
    ///
    /// A 401 here means the credentials or the challenge proof were rejected,
    /// not that a session expired; it is surfaced as `LoginRejected`.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, VmsError> {
        let url = format!("{}/login", self.base_url);
        let response = self.http.post(&url).json(request).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(VmsError::LoginRejected),
            status if status.is_success() => {
                let text = response.text().await?;
                Ok(serde_json::from_str(&text)?)
            }
            status => Err(VmsError::Api {
                status: status.as_u16(),
            }),
        }
    }

    /// Invalidates the session upstream. Local state is not touched here.
    pub async fn logout(&self, session_id: &str) -> Result<(), VmsError> {
        let url = format!("{}/logout", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(SESSION_HEADER, session_id)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(VmsError::SessionExpired),
            status => Err(VmsError::Api {
                status: status.as_u16(),
            }),
        }
    }

    /// Lists all cameras with their server association and channel counts
    pub async fn list_cameras(&self, session_id: &str) -> Result<Vec<VmsCamera>, VmsError> {
        let text = self.get_authenticated("cameras", session_id).await?;
        let parsed: CamerasResponse = serde_json::from_str(&text)?;
        Ok(parsed.cameras.into_iter().map(map_camera).collect())
    }

    /// Lists all recording servers
    pub async fn list_servers(&self, session_id: &str) -> Result<Vec<VmsServer>, VmsError> {
        let text = self.get_authenticated("servers", session_id).await?;
        let parsed: ServersResponse = serde_json::from_str(&text)?;
        Ok(parsed.servers.into_iter().map(map_server).collect())
    }

    /// Performs an authenticated GET, mapping 401 to `SessionExpired`
    async fn get_authenticated(&self, path: &str, session_id: &str) -> Result<String, VmsError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .header(SESSION_HEADER, session_id)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(VmsError::SessionExpired),
            status if status.is_success() => Ok(response.text().await?),
            status => Err(VmsError::Api {
                status: status.as_u16(),
            }),
        }
    }
}

/// Cameras listing response
#[derive(Debug, Deserialize)]
struct CamerasResponse {
    cameras: Vec<CameraRecord>,
}

/// A single camera record as the VMS reports it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CameraRecord {
    id: String,
    name: Option<String>,
    server_id: Option<String>,
    channel_count: Option<u32>,
    connected: Option<bool>,
}

/// Servers listing response
#[derive(Debug, Deserialize)]
struct ServersResponse {
    servers: Vec<ServerRecord>,
}

/// A single server record as the VMS reports it
#[derive(Debug, Deserialize)]
struct ServerRecord {
    id: String,
    name: Option<String>,
}

/// Maps a wire camera record into the crate model, defaulting missing fields
fn map_camera(record: CameraRecord) -> VmsCamera {
    VmsCamera {
        name: record.name.unwrap_or_else(|| record.id.clone()),
        id: record.id,
        server_id: record.server_id,
        channels: record.channel_count.unwrap_or(1),
        connected: record.connected.unwrap_or(false),
    }
}

/// Maps a wire server record into the crate model
fn map_server(record: ServerRecord) -> VmsServer {
    VmsServer {
        name: record.name.unwrap_or_else(|| record.id.clone()),
        id: record.id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sample cameras listing as the VMS returns it
    const CAMERAS_RESPONSE: &str = r#"{
        "cameras": [
            {
                "id": "cam-001",
                "name": "Lobby East",
                "serverId": "srv-1",
                "channelCount": 1,
                "connected": true
            },
            {
                "id": "cam-002",
                "name": "Parking Multisensor",
                "serverId": "srv-1",
                "channelCount": 4,
                "connected": true
            },
            {
                "id": "cam-003",
                "serverId": "srv-2",
                "connected": false
            }
        ]
    }"#;

    const SERVERS_RESPONSE: &str = r#"{
        "servers": [
            { "id": "srv-1", "name": "HQ-Recorder" },
            { "id": "srv-2" }
        ]
    }"#;

    #[test]
    fn test_parse_cameras_response() {
        let parsed: CamerasResponse =
            serde_json::from_str(CAMERAS_RESPONSE).expect("Failed to parse cameras response");
        let cameras: Vec<VmsCamera> = parsed.cameras.into_iter().map(map_camera).collect();

        assert_eq!(cameras.len(), 3);
        assert_eq!(cameras[0].id, "cam-001");
        assert_eq!(cameras[0].name, "Lobby East");
        assert_eq!(cameras[0].server_id.as_deref(), Some("srv-1"));
        assert_eq!(cameras[1].channels, 4);
        assert!(cameras[1].connected);
    }

    #[test]
    fn test_camera_defaults_for_missing_fields() {
        let parsed: CamerasResponse =
            serde_json::from_str(CAMERAS_RESPONSE).expect("Failed to parse cameras response");
        let cameras: Vec<VmsCamera> = parsed.cameras.into_iter().map(map_camera).collect();

        // cam-003 has no name and no channel count
        assert_eq!(cameras[2].name, "cam-003");
        assert_eq!(cameras[2].channels, 1);
        assert!(!cameras[2].connected);
    }

    #[test]
    fn test_parse_servers_response() {
        let parsed: ServersResponse =
            serde_json::from_str(SERVERS_RESPONSE).expect("Failed to parse servers response");
        let servers: Vec<VmsServer> = parsed.servers.into_iter().map(map_server).collect();

        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].name, "HQ-Recorder");
        // Unnamed server falls back to its id
        assert_eq!(servers[1].name, "srv-2");
    }

    #[test]
    fn test_login_request_serializes_camel_case() {
        let request = LoginRequest {
            username: "operator".to_string(),
            password: "secret".to_string(),
            client_name: "fleetwatch".to_string(),
            authorization_token: "nonce:123:abcd".to_string(),
        };

        let json = serde_json::to_string(&request).expect("Failed to serialize LoginRequest");
        assert!(json.contains("\"clientName\""));
        assert!(json.contains("\"authorizationToken\""));
        assert!(!json.contains("client_name"));
    }

    #[test]
    fn test_parse_login_response() {
        let response: LoginResponse = serde_json::from_str(r#"{"sessionId": "sess-42"}"#)
            .expect("Failed to parse login response");
        assert_eq!(response.session_id, "sess-42");
    }

    #[test]
    fn test_parse_malformed_listing_fails() {
        let result: Result<CamerasResponse, _> = serde_json::from_str("{ not json }");
        assert!(result.is_err());
    }
}
