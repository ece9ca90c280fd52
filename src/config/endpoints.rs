//! Remote endpoint locations
//!
//! One immutable value is built per process and shared by every component
//! through an `Arc`.

use serde::{Deserialize, Serialize};

pub const IBM_CLOUD_DISCOVERY_URL: &str =
    "https://iam.cloud.ibm.com/identity/.well-known/openid-configuration";
pub const IBM_CLOUD_CLUSTERS_URL: &str = "https://containers.cloud.ibm.com/global/v1/clusters";
pub const IBM_CLOUD_TAGS_URL: &str = "https://tags.global-search-tagging.cloud.ibm.com/v3/tags";

/// URLs of the identity, container and tagging services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Endpoints {
    /// Well-known document that advertises the IAM token endpoint
    #[serde(default = "default_discovery_url")]
    pub identity_discovery: String,
    /// Cluster collection resource
    #[serde(default = "default_clusters_url")]
    pub clusters: String,
    /// Global tagging resource
    #[serde(default = "default_tags_url")]
    pub tags: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::ibm_cloud()
    }
}

fn default_discovery_url() -> String {
    IBM_CLOUD_DISCOVERY_URL.to_string()
}

fn default_clusters_url() -> String {
    IBM_CLOUD_CLUSTERS_URL.to_string()
}

fn default_tags_url() -> String {
    IBM_CLOUD_TAGS_URL.to_string()
}

impl Endpoints {
    /// Public IBM Cloud endpoints.
    pub fn ibm_cloud() -> Self {
        Self {
            identity_discovery: default_discovery_url(),
            clusters: default_clusters_url(),
            tags: default_tags_url(),
        }
    }

    /// All services served under one base URL, using the IBM Cloud paths.
    /// Useful for proxies and local fakes.
    pub fn rooted_at(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            identity_discovery: format!("{}/identity/.well-known/openid-configuration", base),
            clusters: format!("{}/global/v1/clusters", base),
            tags: format!("{}/v3/tags", base),
        }
    }

    pub fn cluster_url(&self, id_or_name: &str) -> String {
        format!("{}/{}", self.clusters.trim_end_matches('/'), id_or_name)
    }

    pub fn tag_attach_url(&self) -> String {
        format!("{}/attach", self.tags.trim_end_matches('/'))
    }
}
