//! Cloud bearer-token intake and state
//!
//! The bearer token for the cloud health API arrives out-of-band from an
//! external harvester; this system is not the issuer and holds no
//! verification key, so claims are decoded without cryptographic
//! verification and the delivery channel is trusted. The decoded expiry is
//! authoritative until the upstream answers 401, at which point it is
//! defensively collapsed to "now" regardless of what the claim says.

use base64::prelude::{Engine as _, BASE64_URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Buffer applied before the decoded expiry when judging token freshness
const EXPIRY_BUFFER_SECS: i64 = 300;

/// A structurally invalid token submitted at intake
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("bearer token is malformed: {0}")]
    Structure(String),
}

/// Guard failures for direct (non-cached) cloud calls
#[derive(Debug, Error)]
pub enum TokenGuardError {
    /// No token was ever submitted
    #[error("no cloud token configured")]
    NotConfigured,

    /// The buffered expiry has passed
    #[error("cloud token expired")]
    Expired,
}

/// Claims decoded from the token payload
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

/// Wire shape of the payload claims we read
#[derive(Debug, Deserialize)]
struct RawClaims {
    iat: Option<i64>,
    exp: Option<i64>,
}

/// The currently held cloud token
#[derive(Debug, Clone)]
pub struct CloudToken {
    /// Raw token string attached as the bearer header
    pub raw: String,
    /// Decoded issue time, defaulting to submission time when absent
    pub issued_at: DateTime<Utc>,
    /// Decoded expiry; collapsed to the rejection time after an upstream 401
    pub expires_at: DateTime<Utc>,
    /// When this token was submitted
    pub set_at: DateTime<Utc>,
}

/// Snapshot of token state, before cache presence is folded in
#[derive(Debug, Clone, PartialEq)]
pub struct TokenState {
    pub has_token: bool,
    pub is_expired: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Decodes the claims of a three-segment token without verifying it.
///
/// Structural failures never touch any previously stored token; callers
/// decode first and replace only on success.
pub fn decode_claims(raw: &str) -> Result<TokenClaims, TokenError> {
    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Structure(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(TokenError::Structure("empty segment".to_string()));
    }

    let payload = BASE64_URL_SAFE_NO_PAD
        .decode(segments[1])
        .map_err(|e| TokenError::Structure(format!("payload is not base64url: {e}")))?;
    let claims: RawClaims = serde_json::from_slice(&payload)
        .map_err(|e| TokenError::Structure(format!("payload is not JSON: {e}")))?;

    let exp = claims
        .exp
        .ok_or_else(|| TokenError::Structure("missing exp claim".to_string()))?;
    let expires_at = Utc
        .timestamp_opt(exp, 0)
        .single()
        .ok_or_else(|| TokenError::Structure("exp claim out of range".to_string()))?;
    let issued_at = claims.iat.and_then(|iat| Utc.timestamp_opt(iat, 0).single());

    Ok(TokenClaims {
        issued_at,
        expires_at,
    })
}

/// Holds the single current cloud token.
///
/// Replaced wholesale on each submission; cleared on explicit clear. Reads
/// and writes never cross an await point.
#[derive(Default)]
pub struct TokenStore {
    inner: RwLock<Option<CloudToken>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores a newly delivered token, replacing any previous
    /// one. On a structural failure the previous token is left untouched.
    pub fn set(&self, raw: &str) -> Result<CloudToken, TokenError> {
        let claims = decode_claims(raw)?;
        let now = Utc::now();
        let token = CloudToken {
            raw: raw.to_string(),
            issued_at: claims.issued_at.unwrap_or(now),
            expires_at: claims.expires_at,
            set_at: now,
        };
        info!(expires_at = %token.expires_at, "cloud token accepted");
        *self.inner.write() = Some(token.clone());
        Ok(token)
    }

    /// Drops the stored token
    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    /// Collapses the expiry to now after the upstream rejected the token.
    ///
    /// The decoded claim stops being authoritative the moment a 401 is
    /// observed.
    pub fn mark_rejected(&self) {
        if let Some(token) = self.inner.write().as_mut() {
            warn!("cloud upstream rejected the token; collapsing local expiry");
            token.expires_at = Utc::now();
        }
    }

    /// The raw bearer string, if a token is held
    pub fn bearer(&self) -> Option<String> {
        self.inner.read().as_ref().map(|t| t.raw.clone())
    }

    /// A copy of the held token
    pub fn snapshot(&self) -> Option<CloudToken> {
        self.inner.read().clone()
    }

    /// Precondition guard for direct cloud calls.
    ///
    /// Callers that only need the long-TTL cache check cache presence first
    /// and bypass this guard entirely.
    pub fn ensure(&self) -> Result<String, TokenGuardError> {
        let guard = self.inner.read();
        let Some(token) = guard.as_ref() else {
            return Err(TokenGuardError::NotConfigured);
        };
        if Utc::now() + Duration::seconds(EXPIRY_BUFFER_SECS) >= token.expires_at {
            return Err(TokenGuardError::Expired);
        }
        Ok(token.raw.clone())
    }

    /// Token half of the operator status report
    pub fn state(&self) -> TokenState {
        let guard = self.inner.read();
        match guard.as_ref() {
            Some(token) => TokenState {
                has_token: true,
                is_expired: Utc::now() + Duration::seconds(EXPIRY_BUFFER_SECS)
                    >= token.expires_at,
                expires_at: Some(token.expires_at),
            },
            None => TokenState {
                has_token: false,
                is_expired: true,
                expires_at: None,
            },
        }
    }
}
