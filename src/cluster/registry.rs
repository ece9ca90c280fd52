//! Cluster registry client
//!
//! Looks clusters up by id or name and submits creation requests. A conflict
//! on creation means a cluster with that name already exists in the resource
//! group; it is reported as [`CreateOutcome::Conflict`], not as an error.

use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::model::{ClusterIdentity, ClusterSnapshot};
use super::request::ClusterRequest;
use crate::client::{HttpRequest, RequestExecutor};
use crate::config::Endpoints;
use crate::error::ProvisionError;
use crate::iam::AccessToken;
use crate::retry::{retry_fixed, FixedBackoff, RetryError, Step};

pub const RESOURCE_GROUP_HEADER: &str = "X-Auth-Resource-Group";

/// Result of a creation request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The service accepted the request and assigned this identity
    Created(ClusterIdentity),
    /// A cluster with the requested name already exists
    Conflict,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

pub struct ClusterRegistry {
    executor: Arc<dyn RequestExecutor>,
    endpoints: Arc<Endpoints>,
}

impl ClusterRegistry {
    pub fn new(executor: Arc<dyn RequestExecutor>, endpoints: Arc<Endpoints>) -> Self {
        Self {
            executor,
            endpoints,
        }
    }

    /// Fetch a cluster by id or name within a resource group.
    pub async fn get(
        &self,
        id_or_name: &str,
        resource_group: &str,
        token: &AccessToken,
    ) -> Result<ClusterSnapshot, ProvisionError> {
        let url = self.endpoints.cluster_url(id_or_name);
        let request = HttpRequest::get(&url)
            .bearer(&token.access_token)
            .header(RESOURCE_GROUP_HEADER, resource_group);

        let response = self.executor.execute(request).await?;
        match response.status {
            404 => Err(ProvisionError::NotFound(id_or_name.to_string())),
            status if !response.is_success() => Err(ProvisionError::Api {
                url,
                status,
                body: response.body,
            }),
            _ => ClusterSnapshot::from_document(response.body),
        }
    }

    /// Submit `request`, resubmitting while the service answers with
    /// anything other than 201 (created) or 409 (conflict).
    pub async fn create(
        &self,
        request: &ClusterRequest,
        token: &AccessToken,
        backoff: &FixedBackoff,
        cancel: &CancellationToken,
    ) -> Result<CreateOutcome, ProvisionError> {
        let payload = serde_json::to_value(request.creation_payload())
            .map_err(|e| ProvisionError::InvalidRequest(e.to_string()))?;
        let url = self.endpoints.clusters.as_str();
        let executor = &self.executor;

        let outcome = retry_fixed(
            backoff,
            "create_cluster",
            cancel,
            String::from("no attempt made"),
            move |_, attempt| {
                let http = HttpRequest::post(url)
                    .bearer(&token.access_token)
                    .header(RESOURCE_GROUP_HEADER, &request.resource_group)
                    .json(payload.clone());
                async move {
                    let response = match executor.execute(http).await {
                        Ok(response) => response,
                        Err(e) => {
                            warn!(
                                "Create attempt {} for '{}' failed: {}",
                                attempt, request.name, e
                            );
                            return Ok(Step::Retry(e.to_string()));
                        }
                    };

                    match response.status {
                        201 => {
                            let parsed = serde_json::from_value::<CreatedResponse>(response.body);
                            let created = match parsed {
                                Ok(created) => created,
                                Err(e) => {
                                    return Err(ProvisionError::Decode(format!(
                                        "creation response: {}",
                                        e
                                    )))
                                }
                            };
                            info!("Cluster created: {} ({})", request.name, created.id);
                            Ok(Step::Done(CreateOutcome::Created(ClusterIdentity {
                                id: created.id,
                                name: request.name.clone(),
                                crn: None,
                            })))
                        }
                        409 => {
                            info!("Cluster already exists: {}", request.name);
                            Ok(Step::Done(CreateOutcome::Conflict))
                        }
                        status => {
                            warn!(
                                "Create attempt {} for '{}' returned HTTP {}",
                                attempt, request.name, status
                            );
                            Ok(Step::Retry(format!("HTTP {}", status)))
                        }
                    }
                }
            },
        )
        .await;

        match outcome {
            Ok(outcome) => Ok(outcome),
            Err(RetryError::Exhausted { attempts, last }) => Err(ProvisionError::Create {
                name: request.name.clone(),
                attempts,
                last_failure: last,
            }),
            Err(RetryError::Aborted(e)) => Err(e),
            Err(RetryError::Cancelled) => Err(ProvisionError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::executor::mock::MockExecutor;
    use crate::client::{ExecutorError, HttpMethod, HttpResponse};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn endpoints() -> Arc<Endpoints> {
        Arc::new(Endpoints::rooted_at("http://cloud.test"))
    }

    fn token() -> AccessToken {
        AccessToken {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: None,
            expires_in: None,
        }
    }

    fn request() -> ClusterRequest {
        ClusterRequest::new("demo", "rg-1", "dal10", "b3c.4x16", "1.29.5")
    }

    fn quick() -> FixedBackoff {
        FixedBackoff::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_get_sends_auth_and_resource_group() {
        let executor = Arc::new(MockExecutor::new(|_| {
            Ok(HttpResponse::new(
                200,
                json!({"id": "c-123", "name": "demo", "state": "deploying"}),
            ))
        }));
        let registry = ClusterRegistry::new(executor.clone(), endpoints());

        let snapshot = registry.get("demo", "rg-1", &token()).await.unwrap();
        assert_eq!(snapshot.identity.id, "c-123");
        assert_eq!(snapshot.status.state, "deploying");

        let sent = executor.requests();
        assert_eq!(sent[0].url, "http://cloud.test/global/v1/clusters/demo");
        assert_eq!(sent[0].header_value("Authorization"), Some("Bearer access"));
        assert_eq!(sent[0].header_value(RESOURCE_GROUP_HEADER), Some("rg-1"));
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let executor = Arc::new(MockExecutor::new(|_| Ok(HttpResponse::new(404, json!({})))));
        let registry = ClusterRegistry::new(executor, endpoints());

        let result = registry.get("ghost", "rg-1", &token()).await;
        assert!(matches!(result, Err(ProvisionError::NotFound(name)) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_get_unexpected_status() {
        let executor = Arc::new(MockExecutor::new(|_| {
            Ok(HttpResponse::new(401, json!({"description": "expired"})))
        }));
        let registry = ClusterRegistry::new(executor, endpoints());

        let result = registry.get("demo", "rg-1", &token()).await;
        assert!(matches!(result, Err(ProvisionError::Api { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_create_returns_identity() {
        let executor = Arc::new(MockExecutor::new(|_| {
            Ok(HttpResponse::new(201, json!({"id": "c-123"})))
        }));
        let registry = ClusterRegistry::new(executor.clone(), endpoints());
        let cancel = CancellationToken::new();

        let outcome = registry
            .create(&request(), &token(), &quick(), &cancel)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CreateOutcome::Created(ClusterIdentity {
                id: "c-123".to_string(),
                name: "demo".to_string(),
                crn: None,
            })
        );

        let posts = executor.matching(HttpMethod::Post, "/global/v1/clusters");
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].header_value(RESOURCE_GROUP_HEADER), Some("rg-1"));
        assert_eq!(posts[0].body.as_ref().unwrap()["dataCenter"], "dal10");
    }

    #[tokio::test]
    async fn test_create_conflict_is_not_an_error() {
        let executor = Arc::new(MockExecutor::new(|_| Ok(HttpResponse::new(409, json!({})))));
        let registry = ClusterRegistry::new(executor.clone(), endpoints());
        let cancel = CancellationToken::new();

        let outcome = registry
            .create(&request(), &token(), &quick(), &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, CreateOutcome::Conflict);
        assert_eq!(executor.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_create_retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let executor = Arc::new(MockExecutor::new(move |_| {
            match c.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(HttpResponse::new(500, json!("oops"))),
                1 => Err(ExecutorError::Http("reset".to_string())),
                _ => Ok(HttpResponse::new(201, json!({"id": "c-9"}))),
            }
        }));
        let registry = ClusterRegistry::new(executor, endpoints());
        let cancel = CancellationToken::new();

        let outcome = registry
            .create(&request(), &token(), &quick(), &cancel)
            .await
            .unwrap();
        assert!(matches!(outcome, CreateOutcome::Created(id) if id.id == "c-9"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_create_gives_up_after_three_attempts() {
        let executor = Arc::new(MockExecutor::new(|_| {
            Ok(HttpResponse::new(503, json!("busy")))
        }));
        let registry = ClusterRegistry::new(executor.clone(), endpoints());
        let cancel = CancellationToken::new();

        let result = registry
            .create(&request(), &token(), &quick(), &cancel)
            .await;
        match result {
            Err(ProvisionError::Create {
                name,
                attempts,
                last_failure,
            }) => {
                assert_eq!(name, "demo");
                assert_eq!(attempts, 3);
                assert_eq!(last_failure, "HTTP 503");
            }
            other => panic!("expected CreateError, got {:?}", other),
        }
        assert_eq!(executor.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_create_cancelled_before_start() {
        let executor = Arc::new(MockExecutor::new(|_| {
            Ok(HttpResponse::new(201, json!({"id": "c-1"})))
        }));
        let registry = ClusterRegistry::new(executor.clone(), endpoints());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = registry
            .create(&request(), &token(), &quick(), &cancel)
            .await;
        assert!(matches!(result, Err(ProvisionError::Cancelled)));
        assert!(executor.requests().is_empty());
    }
}
