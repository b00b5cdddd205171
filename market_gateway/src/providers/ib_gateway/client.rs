use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Method, StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use shared_utils::env::env_opt;
use snafu::{ResultExt, ensure};
use tracing::{debug, info, warn};

use crate::{
    auth::{AuthSession, Authenticator, DEFAULT_RECHECK_INTERVAL, ManualLoginAuthenticator},
    errors::GatewayError,
    models::{
        account::{AccountSummary, Execution, Position},
        bar_series::BarSeries,
        contract::{ContractCandidate, InstrumentId},
        order::{OrderReply, OrderTicket, OrdersRequest},
        request_params::HistoryRequest,
    },
    providers::{
        ClientBuildSnafu, ClientInitError, InvalidBaseUrlSnafu, InvalidTokenSnafu, MarketGateway,
        ib_gateway::{
            params::{
                HISTORY_PATH, SEARCH_PATH, SearchBody, TICKLE_PATH, executions_path,
                executions_query, history_query, orders_path, positions_path, summary_path,
            },
            response::normalize_history,
        },
    },
    rate_limit::{RateLimitConfig, RateLimiters},
};

pub const DEFAULT_BASE_URL: &str = "https://localhost:5055/v1/api";
pub const BASE_URL_ENV: &str = "GATEWAY_BASE_URL";
pub const SESSION_TOKEN_ENV: &str = "GATEWAY_SESSION_TOKEN";

/// Connection settings for [`GatewayClient`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Optional bearer token sent with every request.
    #[serde(skip_serializing)]
    pub session_token: Option<String>,
    pub request_timeout_secs: u64,
    /// The local gateway serves a self-signed certificate.
    pub accept_invalid_certs: bool,
    pub auth_recheck_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_token: None,
            request_timeout_secs: 30,
            accept_invalid_certs: true,
            auth_recheck_secs: DEFAULT_RECHECK_INTERVAL.as_secs(),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("auth_recheck_secs", &self.auth_recheck_secs)
            .finish()
    }
}

impl GatewayConfig {
    /// Applies `GATEWAY_BASE_URL` and `GATEWAY_SESSION_TOKEN` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = env_opt(BASE_URL_ENV) {
            self.base_url = url;
        }
        if let Some(token) = env_opt(SESSION_TOKEN_ENV) {
            self.session_token = Some(token);
        }
        self
    }
}

/// HTTP client for the broker gateway.
///
/// Every request passes the rate limiters first; every request except the
/// liveness check then makes sure the session is authenticated. A 401 on
/// any request clears the session so the next one checks again. Errors are
/// returned as [`GatewayError`] and never retried here.
pub struct GatewayClient {
    http: Client,
    base_url: String,
    limiters: RateLimiters,
    session: AuthSession,
    authenticator: Arc<dyn Authenticator>,
    _session_token: Option<SecretString>,
}

impl GatewayClient {
    /// Creates a client with the [`ManualLoginAuthenticator`].
    pub fn new(
        config: &GatewayConfig,
        rate_limits: &RateLimitConfig,
    ) -> Result<Self, ClientInitError> {
        let parsed = reqwest::Url::parse(&config.base_url).map_err(|e| {
            InvalidBaseUrlSnafu {
                url: config.base_url.clone(),
                reason: e.to_string(),
            }
            .build()
        })?;
        ensure!(
            matches!(parsed.scheme(), "http" | "https"),
            InvalidBaseUrlSnafu {
                url: config.base_url.clone(),
                reason: "scheme must be http or https",
            }
        );

        let session_token = config
            .session_token
            .as_ref()
            .map(|t| SecretString::from(t.clone()));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(token) = &session_token {
            let mut value =
                header::HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                    .context(InvalidTokenSnafu)?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiters: RateLimiters::new(rate_limits),
            session: AuthSession::new(Duration::from_secs(config.auth_recheck_secs)),
            authenticator: Arc::new(ManualLoginAuthenticator),
            _session_token: session_token,
        })
    }

    /// Replaces the re-authentication hook.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn limiters(&self) -> &RateLimiters {
        &self.limiters
    }

    /// Issues the liveness check. Does not check authentication first.
    pub async fn tickle(&self) -> Result<(), GatewayError> {
        self.limiters.admit(TICKLE_PATH).await;
        self.dispatch(Method::GET, TICKLE_PATH, &[], None::<&()>)
            .await
            .map(|_| ())
    }

    /// Posts to `path` without the authentication check.
    ///
    /// Meant for [`Authenticator`] implementations, which run while the
    /// session refresh is in progress and must not wait on it.
    pub async fn post_unchecked(&self, path: &str, body: &Value) -> Result<Value, GatewayError> {
        self.limiters.admit(path).await;
        let bytes = self.dispatch(Method::POST, path, &[], Some(body)).await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        decode(path, &bytes)
    }

    /// Checks the session when it is unauthenticated or stale and runs the
    /// authenticator when the check is rejected.
    pub async fn ensure_authenticated(&self) -> Result<(), GatewayError> {
        if !self.session.needs_check().await {
            return Ok(());
        }
        let _refresh = self.session.refresh_guard().await;
        // another caller may have refreshed while we waited
        if !self.session.needs_check().await {
            return Ok(());
        }

        match self.tickle().await {
            Ok(()) => {
                self.session.mark_verified().await;
                debug!("gateway session verified");
                Ok(())
            }
            Err(err) if err.is_transport() => Err(err),
            Err(err) => {
                warn!(error = %err, "liveness check rejected, re-authenticating");
                self.authenticator.authenticate(self).await?;
                self.session.mark_verified().await;
                info!("gateway session re-established");
                Ok(())
            }
        }
    }

    /// Rate limit, authentication check, then the request itself.
    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Vec<u8>, GatewayError>
    where
        B: Serialize + ?Sized + Sync,
    {
        self.limiters.admit(path).await;
        self.ensure_authenticated().await?;
        self.dispatch(method, path, query, body).await
    }

    async fn dispatch<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Vec<u8>, GatewayError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, path, "gateway request");
        let mut request = self.http.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::transport(path, e))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            if self.session.invalidate().await {
                warn!(path, "gateway rejected the session");
            }
            let message = response
                .text()
                .await
                .ok()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| status.to_string());
            return Err(GatewayError::Authentication {
                path: path.to_string(),
                message,
            });
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            warn!(path, %status, "gateway request failed");
            return Err(GatewayError::HttpStatus {
                path: path.to_string(),
                status,
                body,
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| GatewayError::transport(path, e))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let bytes = self
            .send(Method::GET, path, query, None::<&()>)
            .await?;
        decode(path, &bytes)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let bytes = self
            .send(Method::POST, path, &[], Some(body))
            .await?;
        decode(path, &bytes)
    }
}

fn decode<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<T, GatewayError> {
    serde_json::from_slice(bytes).map_err(|source| GatewayError::Decode {
        path: path.to_string(),
        source,
    })
}

#[async_trait]
impl MarketGateway for GatewayClient {
    async fn historical_bars(
        &self,
        instrument: &InstrumentId,
        request: &HistoryRequest,
    ) -> Result<BarSeries, GatewayError> {
        let query = history_query(instrument, request);
        let bytes = self
            .send(
                Method::GET,
                HISTORY_PATH,
                &query,
                None::<&()>,
            )
            .await?;
        Ok(normalize_history(instrument, request.bar, &bytes))
    }

    async fn search_contracts(
        &self,
        symbol: &str,
    ) -> Result<Vec<ContractCandidate>, GatewayError> {
        self.post_json(SEARCH_PATH, &SearchBody { symbol }).await
    }

    async fn positions(&self, account_id: &str) -> Result<Vec<Position>, GatewayError> {
        self.get_json(&positions_path(account_id), &[]).await
    }

    async fn account_summary(&self, account_id: &str) -> Result<AccountSummary, GatewayError> {
        self.get_json(&summary_path(account_id), &[]).await
    }

    async fn place_order(
        &self,
        account_id: &str,
        orders: &[OrderTicket],
    ) -> Result<Vec<OrderReply>, GatewayError> {
        self.post_json(&orders_path(account_id), &OrdersRequest { orders })
            .await
    }

    async fn executions(
        &self,
        account_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<Execution>, GatewayError> {
        self.get_json(&executions_path(account_id), &executions_query(since))
            .await
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn rejects_non_http_base_url() {
        let config = GatewayConfig {
            base_url: "ftp://localhost/v1/api".into(),
            ..Default::default()
        };
        let err = GatewayClient::new(&config, &RateLimitConfig::default())
            .err()
            .expect("ftp base url must be rejected");
        assert!(matches!(err, ClientInitError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn rejects_token_with_control_characters() {
        let config = GatewayConfig {
            session_token: Some("abc\ndef".into()),
            ..Default::default()
        };
        let err = GatewayClient::new(&config, &RateLimitConfig::default())
            .err()
            .expect("token with newline must be rejected");
        assert!(matches!(err, ClientInitError::InvalidToken { .. }));
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = GatewayConfig {
            session_token: Some("super-secret".into()),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = GatewayConfig {
            base_url: "http://127.0.0.1:5000/v1/api/".into(),
            ..Default::default()
        };
        let client = GatewayClient::new(&config, &RateLimitConfig::default()).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:5000/v1/api");
    }

    #[test]
    #[serial]
    fn env_overrides_replace_url_and_token() {
        // SAFETY: env-mutating tests are #[serial].
        unsafe {
            std::env::set_var(BASE_URL_ENV, " http://10.0.0.5:5000/v1/api ");
            std::env::set_var(SESSION_TOKEN_ENV, "tok");
        }
        let config = GatewayConfig::default().with_env_overrides();
        unsafe {
            std::env::remove_var(BASE_URL_ENV);
            std::env::remove_var(SESSION_TOKEN_ENV);
        }
        assert_eq!(config.base_url, "http://10.0.0.5:5000/v1/api");
        assert_eq!(config.session_token.as_deref(), Some("tok"));

        let untouched = GatewayConfig::default().with_env_overrides();
        assert_eq!(untouched.base_url, DEFAULT_BASE_URL);
        assert!(untouched.session_token.is_none());
    }
}
