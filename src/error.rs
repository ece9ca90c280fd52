use std::fmt;

use thiserror::Error;

use crate::client::ExecutorError;
use crate::cluster::ClusterStatus;

/// Errors produced while provisioning a cluster.
///
/// Every variant is terminal for the current run. The only recovery happens
/// inside the bounded creation-retry and polling loops, which surface
/// [`ProvisionError::Create`] and [`ProvisionError::Timeout`] on exhaustion.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("IAM authentication failed: {0}")]
    Auth(String),

    #[error("Cluster '{0}' not found")]
    NotFound(String),

    #[error("Could not create cluster '{name}' after {attempts} attempt(s): {last_failure}")]
    Create {
        name: String,
        attempts: u32,
        last_failure: String,
    },

    #[error("Cluster '{cluster_id}' did not become ready after {attempts} poll(s)")]
    Timeout {
        cluster_id: String,
        attempts: u32,
        last_status: Option<ClusterStatus>,
    },

    #[error("Unexpected response from {url}: HTTP {status}")]
    Api {
        url: String,
        status: u16,
        body: serde_json::Value,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request failed: {0}")]
    Transport(#[from] ExecutorError),

    #[error("Provisioning cancelled")]
    Cancelled,

    #[error("Invalid cluster request: {0}")]
    InvalidRequest(String),
}

/// Phases of a provisioning run, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Validating,
    Authenticating,
    Creating,
    Tagging,
    Polling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Validating => "validating",
            Phase::Authenticating => "authenticating",
            Phase::Creating => "creating",
            Phase::Tagging => "tagging",
            Phase::Polling => "polling",
        };
        f.write_str(name)
    }
}

/// A terminal failure together with the phase it happened in.
#[derive(Error, Debug)]
#[error("{phase} failed: {error}")]
pub struct ProvisionFailure {
    pub phase: Phase,
    #[source]
    pub error: ProvisionError,
}

impl ProvisionFailure {
    pub fn new(phase: Phase, error: ProvisionError) -> Self {
        Self { phase, error }
    }

    /// True when the run ended because the readiness budget ran out.
    pub fn is_timeout(&self) -> bool {
        matches!(self.error, ProvisionError::Timeout { .. })
    }
}
