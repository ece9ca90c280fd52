//! Attaches user tags to a cluster through the global tagging service.
//!
//! Attachment is best-effort per tag: nothing is rolled back when a later
//! tag fails.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::model::ClusterIdentity;
use super::request::Tag;
use crate::client::{HttpRequest, RequestExecutor};
use crate::config::Endpoints;
use crate::error::ProvisionError;
use crate::iam::AccessToken;

/// Provider of the tagged resource (classic infrastructure and platform)
pub const TAG_PROVIDER: &str = "ghost";

#[derive(Debug, Serialize)]
struct AttachRequest<'a> {
    tag_name: &'a str,
    resources: [ResourceRef<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ResourceRef<'a> {
    resource_id: &'a str,
}

/// Tags that were attached and tags that were not, with the reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagReport {
    pub attached: Vec<String>,
    pub failed: Vec<TagFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagFailure {
    pub tag: String,
    pub reason: String,
}

impl TagReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct TaggingService {
    executor: Arc<dyn RequestExecutor>,
    endpoints: Arc<Endpoints>,
}

impl TaggingService {
    pub fn new(executor: Arc<dyn RequestExecutor>, endpoints: Arc<Endpoints>) -> Self {
        Self {
            executor,
            endpoints,
        }
    }

    /// Attach one tag to the cluster's CRN.
    pub async fn attach(
        &self,
        tag: &Tag,
        cluster: &ClusterIdentity,
        token: &AccessToken,
    ) -> Result<(), ProvisionError> {
        let crn = cluster.crn.as_deref().ok_or_else(|| {
            ProvisionError::InvalidRequest(format!("cluster '{}' has no CRN to tag", cluster.id))
        })?;

        let body = serde_json::to_value(AttachRequest {
            tag_name: tag.as_str(),
            resources: [ResourceRef { resource_id: crn }],
        })
        .map_err(|e| ProvisionError::InvalidRequest(e.to_string()))?;

        let url = self.endpoints.tag_attach_url();
        let request = HttpRequest::post(&url)
            .bearer(&token.access_token)
            .query("providers", TAG_PROVIDER)
            .json(body);

        let response = self.executor.execute(request).await?;
        if !response.is_success() {
            return Err(ProvisionError::Api {
                url,
                status: response.status,
                body: response.body,
            });
        }

        debug!("Attached tag '{}' to {}", tag, cluster.id);
        Ok(())
    }
}
