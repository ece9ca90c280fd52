//! IAM token management
//!
//! Exchanges a long-lived API key for an access/refresh token pair and renews
//! the pair on demand. Tokens are immutable values: every renewal returns a
//! new [`AccessToken`] that supersedes the one it was renewed from.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::{HttpRequest, HttpResponse, RequestExecutor};
use crate::config::Endpoints;
use crate::error::ProvisionError;

pub const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";
pub const REFRESH_TOKEN_GRANT_TYPE: &str = "refresh_token";

/// Client credentials of the public IBM Cloud CLI client (`bx:bx`)
pub const IAM_CLIENT_AUTHORIZATION: &str = "Basic Yng6Yng=";

/// Long-lived IBM Cloud API key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Access token plus the refresh token that renews it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    token_endpoint: String,
}

pub struct TokenManager {
    executor: Arc<dyn RequestExecutor>,
    endpoints: Arc<Endpoints>,
    strict_renewal: bool,
}

impl TokenManager {
    pub fn new(executor: Arc<dyn RequestExecutor>, endpoints: Arc<Endpoints>) -> Self {
        Self {
            executor,
            endpoints,
            strict_renewal: false,
        }
    }

    /// Treat a non-200 renewal response as an authentication failure
    /// instead of decoding whatever came back.
    pub fn with_strict_renewal(mut self, strict: bool) -> Self {
        self.strict_renewal = strict;
        self
    }

    /// Exchange an API key for a fresh token pair.
    pub async fn authenticate(&self, api_key: &ApiKey) -> Result<AccessToken, ProvisionError> {
        let token_endpoint = self.discover_token_endpoint().await?;
        let response = self
            .exchange(
                &token_endpoint,
                &[
                    ("grant_type", APIKEY_GRANT_TYPE),
                    ("apikey", api_key.expose()),
                ],
            )
            .await?;

        if response.status != 200 {
            return Err(ProvisionError::Auth(format!(
                "token exchange rejected with HTTP {}",
                response.status
            )));
        }

        debug!("Obtained IAM access token");
        decode_token(response)
    }

    /// Exchange the refresh token of `current` for a new token pair.
    pub async fn renew(&self, current: &AccessToken) -> Result<AccessToken, ProvisionError> {
        let token_endpoint = self.discover_token_endpoint().await?;
        let response = self
            .exchange(
                &token_endpoint,
                &[
                    ("grant_type", REFRESH_TOKEN_GRANT_TYPE),
                    ("refresh_token", current.refresh_token.as_str()),
                ],
            )
            .await?;

        if response.status != 200 {
            if self.strict_renewal {
                return Err(ProvisionError::Auth(format!(
                    "token renewal rejected with HTTP {}",
                    response.status
                )));
            }
            warn!(
                "Token renewal returned HTTP {}, decoding body anyway",
                response.status
            );
        }

        decode_token(response)
    }

    async fn discover_token_endpoint(&self) -> Result<String, ProvisionError> {
        let request = HttpRequest::get(&self.endpoints.identity_discovery);
        let response = self
            .executor
            .execute(request)
            .await
            .map_err(|e| ProvisionError::Auth(format!("discovery request failed: {}", e)))?;

        if response.status != 200 {
            return Err(ProvisionError::Auth(format!(
                "discovery returned HTTP {}",
                response.status
            )));
        }

        let document: DiscoveryDocument = serde_json::from_value(response.body)
            .map_err(|e| ProvisionError::Auth(format!("invalid discovery document: {}", e)))?;
        Ok(document.token_endpoint)
    }

    async fn exchange(
        &self,
        token_endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<HttpResponse, ProvisionError> {
        let mut request =
            HttpRequest::post(token_endpoint).header("Authorization", IAM_CLIENT_AUTHORIZATION);
        for (name, value) in params {
            request = request.query(*name, *value);
        }

        self.executor
            .execute(request)
            .await
            .map_err(|e| ProvisionError::Auth(format!("token request failed: {}", e)))
    }
}

fn decode_token(response: HttpResponse) -> Result<AccessToken, ProvisionError> {
    serde_json::from_value(response.body)
        .map_err(|e| ProvisionError::Auth(format!("invalid token response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::executor::mock::MockExecutor;
    use crate::client::{ExecutorError, HttpMethod};
    use serde_json::json;

    const DISCOVERY: &str = "http://iam.test/identity/.well-known/openid-configuration";

    fn endpoints() -> Arc<Endpoints> {
        Arc::new(Endpoints::rooted_at("http://iam.test"))
    }

    fn token_json(n: u32) -> serde_json::Value {
        json!({
            "access_token": format!("access-{}", n),
            "refresh_token": format!("refresh-{}", n),
            "token_type": "Bearer",
            "expires_in": 3600
        })
    }

    /// IAM fake: discovery always succeeds, the token endpoint answers with
    /// `token_status` and a token body.
    fn iam(token_status: u16) -> Arc<MockExecutor> {
        Arc::new(MockExecutor::new(move |req| {
            if req.url == DISCOVERY {
                return Ok(HttpResponse::new(
                    200,
                    json!({"token_endpoint": "http://iam.test/identity/token"}),
                ));
            }
            Ok(HttpResponse::new(token_status, token_json(1)))
        }))
    }

    #[tokio::test]
    async fn test_authenticate_uses_apikey_grant() {
        let executor = iam(200);
        let manager = TokenManager::new(executor.clone(), endpoints());

        let token = manager.authenticate(&ApiKey::new("secret")).await.unwrap();
        assert_eq!(token.access_token, "access-1");
        assert_eq!(token.refresh_token, "refresh-1");
        assert_eq!(token.expires_in, Some(3600));

        let exchanges = executor.matching(HttpMethod::Post, "/identity/token");
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].query_value("grant_type"), Some(APIKEY_GRANT_TYPE));
        assert_eq!(exchanges[0].query_value("apikey"), Some("secret"));
        assert_eq!(
            exchanges[0].header_value("Authorization"),
            Some(IAM_CLIENT_AUTHORIZATION)
        );
    }

    #[tokio::test]
    async fn test_authenticate_rejected() {
        let manager = TokenManager::new(iam(400), endpoints());
        let result = manager.authenticate(&ApiKey::new("bad")).await;
        assert!(matches!(result, Err(ProvisionError::Auth(_))));
    }

    #[tokio::test]
    async fn test_discovery_failure_is_auth_error() {
        let executor = Arc::new(MockExecutor::new(|_| {
            Ok(HttpResponse::new(503, json!("unavailable")))
        }));
        let manager = TokenManager::new(executor.clone(), endpoints());

        let result = manager.authenticate(&ApiKey::new("k")).await;
        assert!(matches!(result, Err(ProvisionError::Auth(msg)) if msg.contains("503")));
        assert!(executor.matching(HttpMethod::Post, "").is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_auth_error() {
        let executor = Arc::new(MockExecutor::new(|_| {
            Err(ExecutorError::Http("connection refused".to_string()))
        }));
        let manager = TokenManager::new(executor, endpoints());
        let result = manager.authenticate(&ApiKey::new("k")).await;
        assert!(matches!(result, Err(ProvisionError::Auth(_))));
    }

    #[tokio::test]
    async fn test_renew_sends_refresh_token() {
        let executor = iam(200);
        let manager = TokenManager::new(executor.clone(), endpoints());
        let current: AccessToken = serde_json::from_value(token_json(0)).unwrap();

        let renewed = manager.renew(&current).await.unwrap();
        assert_eq!(renewed.access_token, "access-1");

        let exchanges = executor.matching(HttpMethod::Post, "/identity/token");
        assert_eq!(
            exchanges[0].query_value("grant_type"),
            Some(REFRESH_TOKEN_GRANT_TYPE)
        );
        assert_eq!(exchanges[0].query_value("refresh_token"), Some("refresh-0"));
    }

    #[tokio::test]
    async fn test_renew_is_permissive_by_default() {
        let manager = TokenManager::new(iam(500), endpoints());
        let current: AccessToken = serde_json::from_value(token_json(0)).unwrap();
        assert!(manager.renew(&current).await.is_ok());
    }

    #[tokio::test]
    async fn test_strict_renewal_rejects_non_200() {
        let manager = TokenManager::new(iam(500), endpoints()).with_strict_renewal(true);
        let current: AccessToken = serde_json::from_value(token_json(0)).unwrap();
        let result = manager.renew(&current).await;
        assert!(matches!(result, Err(ProvisionError::Auth(_))));
    }

    #[tokio::test]
    async fn test_renew_undecodable_body() {
        let executor = Arc::new(MockExecutor::new(|req| {
            if req.url == DISCOVERY {
                return Ok(HttpResponse::new(
                    200,
                    json!({"token_endpoint": "http://iam.test/identity/token"}),
                ));
            }
            Ok(HttpResponse::new(400, json!({"errorCode": "BXNIM0407E"})))
        }));
        let manager = TokenManager::new(executor, endpoints());
        let current: AccessToken = serde_json::from_value(token_json(0)).unwrap();
        let result = manager.renew(&current).await;
        assert!(matches!(result, Err(ProvisionError::Auth(_))));
    }

    #[test]
    fn test_secrets_are_redacted() {
        let key = ApiKey::new("super-secret");
        assert!(!format!("{:?}", key).contains("super-secret"));

        let token: AccessToken = serde_json::from_value(token_json(7)).unwrap();
        let debug = format!("{:?}", token);
        assert!(!debug.contains("access-7"));
        assert!(!debug.contains("refresh-7"));
    }
}
