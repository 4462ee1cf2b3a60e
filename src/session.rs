//! VMS session management
//!
//! Owns the short-lived on-prem session: computes the challenge-response
//! login proof, renews the session transparently when it nears its estimated
//! expiry, and wraps outbound calls with a single retry when the upstream
//! reports the session gone mid-request.
//!
//! The expiry is a local heuristic. The VMS communicates no lifetime, so each
//! successful login stamps a conservative fixed estimate and a trailing
//! buffer forces renewal before the estimate is reached.

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::VmsConfig;
use crate::data::vms::{LoginRequest, LoginResponse, VmsClient, VmsError};

/// Fixed local estimate of how long a session lives after login
const SESSION_LIFETIME_SECS: i64 = 3600;

/// Trailing safety buffer; a session this close to its estimate is renewed
const EXPIRY_BUFFER_SECS: i64 = 300;

/// Characters in the login nonce
const NONCE_LEN: usize = 16;

/// Errors surfaced by the session layer
#[derive(Debug, Error)]
pub enum SessionError {
    /// The VMS refused the account credentials; not retried
    #[error("credentials rejected")]
    Rejected,

    /// Transport or upstream failure, including a session expiry that
    /// survived the single re-login retry
    #[error(transparent)]
    Vms(#[from] VmsError),
}

/// Seam between the session manager and the VMS transport.
///
/// Lets the retry and coalescing logic be exercised against a counting mock
/// instead of a live endpoint.
#[async_trait]
pub trait LoginBackend: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, VmsError>;
    async fn logout(&self, session_id: &str) -> Result<(), VmsError>;
}

#[async_trait]
impl LoginBackend for VmsClient {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, VmsError> {
        VmsClient::login(self, request).await
    }

    async fn logout(&self, session_id: &str) -> Result<(), VmsError> {
        VmsClient::logout(self, session_id).await
    }
}

/// A session obtained from the VMS
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque session identifier attached to authenticated calls
    pub session_id: String,
    /// When the login completed
    pub obtained_at: DateTime<Utc>,
    /// Local estimate of when the session stops being usable
    pub estimated_expiry: DateTime<Utc>,
}

impl Session {
    /// True while `now` is more than the safety buffer before the estimate
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_BUFFER_SECS) < self.estimated_expiry
    }
}

/// Computes the one-time login authorization proof.
///
/// Format: `nonce:timestamp:hex(sha256(timestamp + shared_key))`, with the
/// timestamp concatenated as its decimal string.
pub fn authorization_token(shared_key: &str, nonce: &str, timestamp: i64) -> String {
    let digest = Sha256::digest(format!("{timestamp}{shared_key}").as_bytes());
    format!("{nonce}:{timestamp}:{}", hex::encode(digest))
}

/// Generates a random alphanumeric nonce for one login attempt
fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

/// Manages the on-prem session lifecycle.
///
/// The session slot sits behind an async mutex that is held across the login
/// call itself, so a burst of callers arriving after expiry coalesces into
/// exactly one upstream login.
pub struct SessionManager<B> {
    backend: B,
    config: VmsConfig,
    session: Mutex<Option<Session>>,
}

impl<B: LoginBackend> SessionManager<B> {
    /// Creates a manager with no session; the first call logs in
    pub fn new(backend: B, config: VmsConfig) -> Self {
        Self {
            backend,
            config,
            session: Mutex::new(None),
        }
    }

    /// The transport behind this manager, for callers issuing listing calls
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns a usable session id, logging in first if none exists or the
    /// current one is within the safety buffer of its estimated expiry.
    ///
    /// Idempotent: callers holding a valid session pay only a lock round trip.
    pub async fn ensure_session(&self) -> Result<String, SessionError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            if session.is_valid_at(Utc::now()) {
                return Ok(session.session_id.clone());
            }
            debug!("session within expiry buffer; renewing");
        }

        let session = self.perform_login().await?;
        let session_id = session.session_id.clone();
        *guard = Some(session);
        Ok(session_id)
    }

    /// Discards the current session and logs in again unconditionally
    async fn relogin(&self) -> Result<String, SessionError> {
        let mut guard = self.session.lock().await;
        let session = self.perform_login().await?;
        let session_id = session.session_id.clone();
        *guard = Some(session);
        Ok(session_id)
    }

    /// Runs one login round trip and stamps the local expiry estimate
    async fn perform_login(&self) -> Result<Session, SessionError> {
        let timestamp = Utc::now().timestamp();
        let nonce = generate_nonce();
        let request = LoginRequest {
            username: self.config.username.clone(),
            password: self.config.password.clone(),
            client_name: self.config.client_name.clone(),
            authorization_token: authorization_token(&self.config.shared_key, &nonce, timestamp),
        };

        match self.backend.login(&request).await {
            Ok(response) => {
                let now = Utc::now();
                info!(client = %self.config.client_name, "VMS login succeeded");
                Ok(Session {
                    session_id: response.session_id,
                    obtained_at: now,
                    estimated_expiry: now + Duration::seconds(SESSION_LIFETIME_SECS),
                })
            }
            Err(VmsError::LoginRejected) => Err(SessionError::Rejected),
            Err(e) => Err(SessionError::Vms(e)),
        }
    }

    /// Clears local session state unconditionally.
    ///
    /// The remote logout is attempted afterwards; its failure is logged and
    /// otherwise ignored.
    pub async fn logout(&self) {
        let taken = self.session.lock().await.take();
        if let Some(session) = taken {
            if let Err(e) = self.backend.logout(&session.session_id).await {
                warn!(error = %e, "remote logout failed; local session already cleared");
            }
        }
    }

    /// Runs `op` with a valid session, retrying once on session expiry.
    ///
    /// If the first attempt fails with `VmsError::SessionExpired`, exactly
    /// one re-login and one retry follow; a second consecutive expiry
    /// propagates unmodified. Any other error propagates immediately.
    pub async fn with_session<T, F, Fut>(&self, op: F) -> Result<T, SessionError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, VmsError>>,
    {
        let session_id = self.ensure_session().await?;
        match op(session_id).await {
            Err(VmsError::SessionExpired) => {
                debug!("session rejected mid-call; one re-login and retry");
                let session_id = self.relogin().await?;
                op(session_id).await.map_err(SessionError::from)
            }
            other => other.map_err(SessionError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Counting backend that mints sequential session ids
    struct MockBackend {
        logins: AtomicU32,
        logouts: AtomicU32,
        reject_login: bool,
        fail_logout: bool,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                logins: AtomicU32::new(0),
                logouts: AtomicU32::new(0),
                reject_login: false,
                fail_logout: false,
            }
        }

        fn login_count(&self) -> u32 {
            self.logins.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LoginBackend for MockBackend {
        async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, VmsError> {
            assert!(!request.authorization_token.is_empty());
            let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
            if self.reject_login {
                return Err(VmsError::LoginRejected);
            }
            Ok(LoginResponse {
                session_id: format!("sess-{n}"),
            })
        }

        async fn logout(&self, _session_id: &str) -> Result<(), VmsError> {
            self.logouts.fetch_add(1, Ordering::SeqCst);
            if self.fail_logout {
                return Err(VmsError::Api { status: 500 });
            }
            Ok(())
        }
    }

    fn test_config() -> VmsConfig {
        VmsConfig {
            base_url: "http://vms.local".to_string(),
            username: "operator".to_string(),
            password: "secret".to_string(),
            client_name: "fleetwatch".to_string(),
            shared_key: "shared-key".to_string(),
        }
    }

    fn manager() -> SessionManager<MockBackend> {
        SessionManager::new(MockBackend::new(), test_config())
    }

    #[test]
    fn test_authorization_token_format() {
        let token = authorization_token("shared-key", "abc123", 1700000000);
        let parts: Vec<&str> = token.split(':').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "abc123");
        assert_eq!(parts[1], "1700000000");

        let expected = hex::encode(Sha256::digest("1700000000shared-key".as_bytes()));
        assert_eq!(parts[2], expected);
    }

    #[test]
    fn test_generate_nonce_is_alphanumeric() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), NONCE_LEN);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_session_validity_respects_buffer() {
        let now = Utc::now();
        let session = Session {
            session_id: "s".to_string(),
            obtained_at: now,
            estimated_expiry: now + Duration::seconds(SESSION_LIFETIME_SECS),
        };

        assert!(session.is_valid_at(now));
        // Inside the 5-minute buffer counts as invalid
        assert!(!session.is_valid_at(session.estimated_expiry - Duration::seconds(60)));
        assert!(!session.is_valid_at(session.estimated_expiry + Duration::seconds(1)));
    }

    #[tokio::test]
    async fn test_repeated_ensure_session_logs_in_once() {
        let manager = manager();

        let first = manager.ensure_session().await.expect("login should work");
        for _ in 0..4 {
            let id = manager.ensure_session().await.expect("login should work");
            assert_eq!(id, first);
        }

        assert_eq!(manager.backend.login_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_session_coalesces_to_one_login() {
        let manager = Arc::new(manager());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = Arc::clone(&manager);
            handles.push(tokio::spawn(async move { m.ensure_session().await }));
        }
        for handle in handles {
            handle
                .await
                .expect("task should not panic")
                .expect("login should work");
        }

        assert_eq!(manager.backend.login_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_session_triggers_new_login() {
        let manager = manager();
        manager.ensure_session().await.expect("login should work");

        // Backdate the stored session past the buffer
        {
            let mut guard = manager.session.lock().await;
            let session = guard.as_mut().expect("session should exist");
            session.estimated_expiry = Utc::now() - Duration::seconds(1);
        }

        let id = manager.ensure_session().await.expect("relogin should work");
        assert_eq!(id, "sess-2");
        assert_eq!(manager.backend.login_count(), 2);
    }

    #[tokio::test]
    async fn test_rejected_login_surfaces_without_retry() {
        let backend = MockBackend {
            reject_login: true,
            ..MockBackend::new()
        };
        let manager = SessionManager::new(backend, test_config());

        let err = manager.ensure_session().await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected));
        assert_eq!(manager.backend.login_count(), 1);
    }

    #[tokio::test]
    async fn test_with_session_retries_once_on_expiry() {
        let manager = manager();
        let attempts = Arc::new(AtomicU32::new(0));

        let attempts_in = Arc::clone(&attempts);
        let result = manager
            .with_session(move |session_id| {
                let attempts = Arc::clone(&attempts_in);
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(VmsError::SessionExpired)
                    } else {
                        Ok(format!("data-via-{session_id}"))
                    }
                }
            })
            .await
            .expect("retry should recover");

        // The retried result comes back unchanged, produced with the new session
        assert_eq!(result, "data-via-sess-2");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(manager.backend.login_count(), 2);
    }

    #[tokio::test]
    async fn test_with_session_second_expiry_propagates() {
        let manager = manager();
        let attempts = Arc::new(AtomicU32::new(0));

        let attempts_in = Arc::clone(&attempts);
        let err = manager
            .with_session(move |_session_id| {
                let attempts = Arc::clone(&attempts_in);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(VmsError::SessionExpired)
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Vms(VmsError::SessionExpired)));
        // No third attempt
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(manager.backend.login_count(), 2);
    }

    #[tokio::test]
    async fn test_with_session_other_errors_propagate_immediately() {
        let manager = manager();
        let attempts = Arc::new(AtomicU32::new(0));

        let attempts_in = Arc::clone(&attempts);
        let err = manager
            .with_session(move |_session_id| {
                let attempts = Arc::clone(&attempts_in);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(VmsError::Api { status: 500 })
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Vms(VmsError::Api { status: 500 })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.backend.login_count(), 1);
    }

    #[tokio::test]
    async fn test_logout_clears_state_even_when_remote_fails() {
        let backend = MockBackend {
            fail_logout: true,
            ..MockBackend::new()
        };
        let manager = SessionManager::new(backend, test_config());
        manager.ensure_session().await.expect("login should work");

        manager.logout().await;

        assert!(manager.session.lock().await.is_none());
        // A later call starts a fresh session
        let id = manager.ensure_session().await.expect("relogin should work");
        assert_eq!(id, "sess-2");
    }

    #[tokio::test]
    async fn test_logout_without_session_is_a_noop() {
        let manager = manager();
        manager.logout().await;
        assert_eq!(manager.backend.logouts.load(Ordering::SeqCst), 0);
    }
}
