use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProvisionError;

/// Stable handle of a cluster. The id is assigned by the remote system and
/// never changes for the rest of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIdentity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Cloud Resource Name, the address used for tagging. Creation
    /// responses do not carry it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crn: Option<String>,
}

/// Status fields that decide readiness. Missing fields decode as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterStatus {
    pub state: String,
    pub master_state: String,
    pub master_status: String,
    pub ingress_hostname: String,
    pub ingress_secret_name: String,
}

/// One fetch of a cluster: identity, status, and the full document as
/// returned by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSnapshot {
    pub identity: ClusterIdentity,
    pub status: ClusterStatus,
    pub document: Value,
}

#[derive(Deserialize)]
struct ClusterDocument {
    #[serde(flatten)]
    identity: ClusterIdentity,
    #[serde(flatten)]
    status: ClusterStatus,
}

impl ClusterSnapshot {
    pub fn from_document(document: Value) -> Result<Self, ProvisionError> {
        let parsed: ClusterDocument = serde_json::from_value(document.clone())
            .map_err(|e| ProvisionError::Decode(format!("cluster document: {}", e)))?;
        Ok(Self {
            identity: parsed.identity,
            status: parsed.status,
            document,
        })
    }
}
