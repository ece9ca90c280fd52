//! Provisioning orchestrator - create, tag, and wait for a cluster
//!
//! A run moves through `Validating → Authenticating → Creating → Tagging →
//! Polling` and ends either with a ready cluster or a [`ProvisionFailure`]
//! naming the phase that failed.
//!
//! - Creation is idempotent: a conflict adopts the existing cluster by name.
//! - Tagging is best-effort and never stops the run.
//! - Polling renews the access token on every iteration and always renews
//!   from the newest token pair.
//!
//! With the default policy the readiness wait is bounded by 200 polls five
//! minutes apart, roughly 16.6 hours.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::RequestExecutor;
use crate::cluster::{
    is_ready, unmet_conditions, ClusterIdentity, ClusterRegistry, ClusterRequest, ClusterStatus,
    CreateOutcome, TagFailure, TagReport, TaggingService,
};
use crate::config::{Endpoints, ProvisionPolicy};
use crate::error::{Phase, ProvisionError, ProvisionFailure};
use crate::iam::{AccessToken, ApiKey, TokenManager};
use crate::retry::{cancellable, retry_fixed, RetryError, Step};

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionOutcome {
    pub run_id: Uuid,
    pub identity: ClusterIdentity,
    pub status: ClusterStatus,
    /// Cluster document from the final poll
    pub cluster: Value,
    /// The cluster existed before this run and was adopted
    pub already_existed: bool,
    /// Poll iterations used, including the one that saw the cluster ready
    pub polls: u32,
    pub tags: TagReport,
    pub started_at: DateTime<Utc>,
    pub ready_at: DateTime<Utc>,
}

/// State threaded from one poll to the next.
struct PollState {
    token: AccessToken,
    last_status: Option<ClusterStatus>,
}

struct Ready {
    identity: ClusterIdentity,
    status: ClusterStatus,
    document: Value,
    polls: u32,
}

pub struct Provisioner {
    tokens: TokenManager,
    registry: ClusterRegistry,
    tagging: TaggingService,
    policy: ProvisionPolicy,
}

impl Provisioner {
    pub fn new(
        executor: Arc<dyn RequestExecutor>,
        endpoints: Arc<Endpoints>,
        policy: ProvisionPolicy,
    ) -> Self {
        Self {
            tokens: TokenManager::new(executor.clone(), endpoints.clone())
                .with_strict_renewal(policy.strict_renewal),
            registry: ClusterRegistry::new(executor.clone(), endpoints.clone()),
            tagging: TaggingService::new(executor, endpoints),
            policy,
        }
    }

    pub fn policy(&self) -> &ProvisionPolicy {
        &self.policy
    }

    /// Provision `request` and wait until it is ready.
    pub async fn provision(
        &self,
        api_key: &ApiKey,
        request: &ClusterRequest,
        cancel: &CancellationToken,
    ) -> Result<ProvisionOutcome, ProvisionFailure> {
        let run_id = Uuid::new_v4();
        let span = info_span!("provision", run_id = %run_id, cluster = %request.name);
        self.run(run_id, api_key, request, cancel)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        run_id: Uuid,
        api_key: &ApiKey,
        request: &ClusterRequest,
        cancel: &CancellationToken,
    ) -> Result<ProvisionOutcome, ProvisionFailure> {
        let started_at = Utc::now();

        request
            .validate()
            .map_err(|e| ProvisionFailure::new(Phase::Validating, e))?;

        info!(phase = %Phase::Authenticating, "Authenticating with IAM");
        let token = guarded(
            Phase::Authenticating,
            cancel,
            self.tokens.authenticate(api_key),
        )
        .await?;

        info!(
            phase = %Phase::Creating,
            "Creating cluster {} in {}", request.name, request.datacenter
        );
        let (identity, already_existed) = self
            .ensure_cluster(request, &token, cancel)
            .await
            .map_err(|e| ProvisionFailure::new(Phase::Creating, e))?;

        let (identity, tags) = if request.tags.is_empty() {
            (identity, TagReport::default())
        } else {
            info!(
                phase = %Phase::Tagging,
                "Attaching {} tag(s) to {}",
                request.tags.len(),
                identity.id
            );
            self.attach_tags(request, identity, &token, cancel).await?
        };

        info!(
            phase = %Phase::Polling,
            "Waiting for cluster {} to become ready (up to {} polls, {}s apart)",
            identity.id,
            self.policy.poll.max_attempts,
            self.policy.poll.interval.as_secs()
        );
        let ready = self
            .wait_until_ready(&identity, &request.resource_group, token, cancel)
            .await
            .map_err(|e| ProvisionFailure::new(Phase::Polling, e))?;

        info!("Cluster {} is ready after {} poll(s)", ready.identity.id, ready.polls);

        Ok(ProvisionOutcome {
            run_id,
            identity: ready.identity,
            status: ready.status,
            cluster: ready.document,
            already_existed,
            polls: ready.polls,
            tags,
            started_at,
            ready_at: Utc::now(),
        })
    }

    /// Create the cluster, or adopt the existing one on conflict.
    async fn ensure_cluster(
        &self,
        request: &ClusterRequest,
        token: &AccessToken,
        cancel: &CancellationToken,
    ) -> Result<(ClusterIdentity, bool), ProvisionError> {
        let outcome = self
            .registry
            .create(request, token, &self.policy.create, cancel)
            .await?;

        match outcome {
            CreateOutcome::Created(identity) => Ok((identity, false)),
            CreateOutcome::Conflict => {
                let lookup = self
                    .registry
                    .get(&request.name, &request.resource_group, token);
                let snapshot = cancellable(cancel, lookup)
                    .await
                    .ok_or(ProvisionError::Cancelled)??;
                info!("Adopting existing cluster {} ({})", request.name, snapshot.identity.id);
                Ok((snapshot.identity, true))
            }
        }
    }

    /// Attach every requested tag in order, recording failures instead of
    /// stopping. Only cancellation ends the run here.
    async fn attach_tags(
        &self,
        request: &ClusterRequest,
        mut identity: ClusterIdentity,
        token: &AccessToken,
        cancel: &CancellationToken,
    ) -> Result<(ClusterIdentity, TagReport), ProvisionFailure> {
        let mut report = TagReport::default();

        if identity.crn.is_none() {
            let lookup = self
                .registry
                .get(&identity.id, &request.resource_group, token);
            match guarded(Phase::Tagging, cancel, lookup).await {
                Ok(snapshot) => identity.crn = snapshot.identity.crn,
                Err(failure) if matches!(failure.error, ProvisionError::Cancelled) => {
                    return Err(failure)
                }
                Err(failure) => {
                    warn!("Could not resolve CRN of {}: {}", identity.id, failure.error);
                }
            }
        }

        for tag in &request.tags {
            let attach = self.tagging.attach(tag, &identity, token);
            let result = match cancellable(cancel, attach).await {
                Some(result) => result,
                None => {
                    return Err(ProvisionFailure::new(
                        Phase::Tagging,
                        ProvisionError::Cancelled,
                    ))
                }
            };

            match result {
                Ok(()) => report.attached.push(tag.to_string()),
                Err(e) => {
                    warn!("Failed to attach tag '{}' to {}: {}", tag, identity.id, e);
                    report.failed.push(TagFailure {
                        tag: tag.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if report.is_complete() {
            info!("Attached {} tag(s)", report.attached.len());
        }
        Ok((identity, report))
    }

    async fn wait_until_ready(
        &self,
        identity: &ClusterIdentity,
        resource_group: &str,
        token: AccessToken,
        cancel: &CancellationToken,
    ) -> Result<Ready, ProvisionError> {
        let initial = PollState {
            token,
            last_status: None,
        };
        let cluster_id = identity.id.as_str();

        let result = retry_fixed(
            &self.policy.poll,
            "wait_for_ready",
            cancel,
            initial,
            move |state, attempt| self.poll_once(cluster_id, resource_group, state, attempt),
        )
        .await;

        match result {
            Ok(ready) => Ok(ready),
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!("Cluster {} not ready after {} poll(s), giving up", cluster_id, attempts);
                Err(ProvisionError::Timeout {
                    cluster_id: cluster_id.to_string(),
                    attempts,
                    last_status: last.last_status,
                })
            }
            Err(RetryError::Aborted(e)) => Err(e),
            Err(RetryError::Cancelled) => Err(ProvisionError::Cancelled),
        }
    }

    /// One poll: renew the token from the previous pair, fetch, evaluate.
    async fn poll_once(
        &self,
        cluster_id: &str,
        resource_group: &str,
        state: PollState,
        attempt: u32,
    ) -> Result<Step<Ready, PollState>, ProvisionError> {
        let token = self.tokens.renew(&state.token).await?;
        let snapshot = self.registry.get(cluster_id, resource_group, &token).await?;

        if is_ready(&snapshot.status) {
            return Ok(Step::Done(Ready {
                identity: snapshot.identity,
                status: snapshot.status,
                document: snapshot.document,
                polls: attempt,
            }));
        }

        debug!(
            "Poll {}/{}: waiting on {}",
            attempt,
            self.policy.poll.max_attempts,
            unmet_conditions(&snapshot.status).join(", ")
        );
        info!(
            "Cluster {} not ready (state={}, masterStatus={}), checking again in {}s",
            cluster_id,
            snapshot.status.state,
            snapshot.status.master_status,
            self.policy.poll.interval.as_secs()
        );

        Ok(Step::Retry(PollState {
            token,
            last_status: Some(snapshot.status),
        }))
    }
}

/// Await a single call, attributing its error or a cancellation to `phase`.
async fn guarded<T, F>(
    phase: Phase,
    cancel: &CancellationToken,
    future: F,
) -> Result<T, ProvisionFailure>
where
    F: Future<Output = Result<T, ProvisionError>>,
{
    match cancellable(cancel, future).await {
        Some(result) => result.map_err(|e| ProvisionFailure::new(phase, e)),
        None => Err(ProvisionFailure::new(phase, ProvisionError::Cancelled)),
    }
}
