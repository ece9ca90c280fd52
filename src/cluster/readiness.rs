//! Readiness predicate over a cluster's status fields.

use super::model::ClusterStatus;

pub const READY_STATE: &str = "normal";
pub const READY_MASTER_STATE: &str = "deployed";
pub const READY_MASTER_STATUS: &str = "Ready";

/// True when the cluster is usable: normal state, deployed and ready master,
/// and an ingress hostname and secret assigned.
pub fn is_ready(status: &ClusterStatus) -> bool {
    unmet_conditions(status).is_empty()
}

/// Names of the readiness checks that `status` does not pass yet.
pub fn unmet_conditions(status: &ClusterStatus) -> Vec<&'static str> {
    let mut unmet = Vec::new();
    if status.state != READY_STATE {
        unmet.push("state");
    }
    if status.ingress_hostname.is_empty() {
        unmet.push("ingressHostname");
    }
    if status.ingress_secret_name.is_empty() {
        unmet.push("ingressSecretName");
    }
    if status.master_state != READY_MASTER_STATE {
        unmet.push("masterState");
    }
    if status.master_status != READY_MASTER_STATUS {
        unmet.push("masterStatus");
    }
    unmet
}
