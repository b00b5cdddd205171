//! Session state for the gateway and the pluggable re-authentication hook.

use std::time::Duration;

use async_trait::async_trait;
use tokio::{
    sync::{Mutex, MutexGuard},
    time::Instant,
};

use crate::{errors::GatewayError, providers::ib_gateway::client::GatewayClient};

/// Default interval after which a verified session is checked again.
pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, Default)]
struct AuthState {
    authenticated: bool,
    last_checked: Option<Instant>,
}

/// Whether the client believes its gateway session is valid.
///
/// All access goes through `needs_check`, `mark_verified` and `invalidate`;
/// a second lock serialises refreshes so concurrent callers check once.
#[derive(Debug)]
pub struct AuthSession {
    state: Mutex<AuthState>,
    refresh: Mutex<()>,
    recheck_interval: Duration,
}

impl AuthSession {
    pub fn new(recheck_interval: Duration) -> Self {
        Self {
            state: Mutex::new(AuthState::default()),
            refresh: Mutex::new(()),
            recheck_interval,
        }
    }

    /// True when the session is not authenticated or was last verified more
    /// than the recheck interval ago.
    pub async fn needs_check(&self) -> bool {
        let state = self.state.lock().await;
        !state.authenticated
            || state
                .last_checked
                .is_none_or(|at| at.elapsed() > self.recheck_interval)
    }

    pub async fn mark_verified(&self) {
        let mut state = self.state.lock().await;
        state.authenticated = true;
        state.last_checked = Some(Instant::now());
    }

    /// Clears the authenticated flag. Returns whether it was set.
    pub async fn invalidate(&self) -> bool {
        let mut state = self.state.lock().await;
        std::mem::replace(&mut state.authenticated, false)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.authenticated
    }

    pub(crate) async fn refresh_guard(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock().await
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new(DEFAULT_RECHECK_INTERVAL)
    }
}

/// Re-establishes a gateway session after a failed liveness check.
///
/// The gateway's login flow is deployment specific, so it is supplied by the
/// caller. Returning `Ok` marks the session verified.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, client: &GatewayClient) -> Result<(), GatewayError>;
}

/// Authenticator for gateways that need an interactive browser login.
///
/// It cannot log in by itself and always reports an authentication error
/// asking the operator to log in.
#[derive(Debug, Clone, Default)]
pub struct ManualLoginAuthenticator;

#[async_trait]
impl Authenticator for ManualLoginAuthenticator {
    async fn authenticate(&self, client: &GatewayClient) -> Result<(), GatewayError> {
        Err(GatewayError::Authentication {
            path: crate::providers::ib_gateway::params::TICKLE_PATH.to_string(),
            message: format!(
                "gateway session is not authenticated; log in at {}",
                client.base_url()
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn session_expires_after_recheck_interval() {
        let session = AuthSession::new(Duration::from_secs(60));
        assert!(session.needs_check().await);

        session.mark_verified().await;
        assert!(!session.needs_check().await);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!session.needs_check().await);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(session.needs_check().await);
    }

    #[tokio::test]
    async fn invalidate_clears_flag() {
        let session = AuthSession::default();
        session.mark_verified().await;
        assert!(session.invalidate().await);
        assert!(!session.is_authenticated().await);
        assert!(session.needs_check().await);
        assert!(!session.invalidate().await);
    }
}
