use clap::{ArgAction, Parser};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::warn;

use crate::cluster::ClusterRequest;
use crate::config::{Endpoints, ProvisionPolicy};
use crate::error::ProvisionFailure;
use crate::iam::ApiKey;
use crate::orchestrator::ProvisionOutcome;

/// Environment variable consulted for the API key
pub const API_KEY_ENV: &str = "IC_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "kubeadmin")]
#[command(about = "Create an IBM Cloud Kubernetes cluster and wait until it is ready")]
#[command(version)]
pub struct Args {
    /// Cluster name
    #[arg(long)]
    pub name: String,

    /// Resource group the cluster belongs to
    #[arg(long)]
    pub resource_group: String,

    /// Datacenter where the cluster will be deployed (e.g. dal10)
    #[arg(long)]
    pub datacenter: String,

    /// Worker machine type (e.g. b3c.4x16)
    #[arg(long)]
    pub machine_type: String,

    /// Kubernetes or OpenShift version of the master
    #[arg(long)]
    pub master_version: String,

    /// Size of the default worker pool
    #[arg(long, default_value = "1")]
    pub default_pool_size: u32,

    /// Private VLAN id (only used together with --public-vlan-id)
    #[arg(long, value_name = "ID")]
    pub private_vlan_id: Option<String>,

    /// Public VLAN id (only used together with --private-vlan-id)
    #[arg(long, value_name = "ID")]
    pub public_vlan_id: Option<String>,

    /// Worker pool entitlement (OpenShift clusters only)
    #[arg(long)]
    pub entitlement: Option<String>,

    /// Comma-separated tags to attach to the cluster
    #[arg(long, default_value = "")]
    pub tags: String,

    /// IBM Cloud API key (falls back to IC_API_KEY)
    #[arg(
        long = "ibmcloud-api-key",
        value_name = "KEY",
        env = "IC_API_KEY",
        hide_env_values = true
    )]
    pub api_key: Option<String>,

    /// Path to config file (default: ~/.kubeadmin/config.yaml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to a .env file for loading the API key
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Dry-run mode: print the creation request without calling the cloud
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    /// Build the cluster request. A lone VLAN id is dropped: both ids are
    /// required for custom networking.
    pub fn cluster_request(&self) -> ClusterRequest {
        let mut request = ClusterRequest::new(
            &self.name,
            &self.resource_group,
            &self.datacenter,
            &self.machine_type,
            &self.master_version,
        )
        .with_worker_count(self.default_pool_size)
        .with_tags(&self.tags);

        match (non_empty(&self.private_vlan_id), non_empty(&self.public_vlan_id)) {
            (Some(private), Some(public)) => request = request.with_vlans(private, public),
            (None, None) => {}
            _ => warn!(
                "Ignoring VLAN settings: both --private-vlan-id and --public-vlan-id are required"
            ),
        }

        if let Some(entitlement) = non_empty(&self.entitlement) {
            request = request.with_entitlement(entitlement);
        }

        request
    }

    /// API key from the command line, or from the environment (after any
    /// env file has been loaded).
    pub fn api_key(&self) -> Option<ApiKey> {
        non_empty(&self.api_key)
            .map(str::to_string)
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
            .map(ApiKey::new)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// SBIO: Pure display logic (no I/O - returns formatted strings)
// ============================================================================

/// Format a dry-run output showing what would be sent.
pub fn format_dry_run(
    request: &ClusterRequest,
    endpoints: &Endpoints,
    policy: &ProvisionPolicy,
) -> String {
    let mut output = String::new();

    output.push_str("kubeadmin - Dry Run Mode\n\n");
    output.push_str(&format!(
        "Cluster: {} (resource group {})\n",
        request.name, request.resource_group
    ));
    output.push_str(&format!("POST {}\n", endpoints.clusters));

    let payload = serde_json::to_string_pretty(&request.creation_payload())
        .unwrap_or_else(|e| format!("<unserializable payload: {}>", e));
    output.push_str(&payload);
    output.push_str("\n\n");

    if request.tags.is_empty() {
        output.push_str("Tags: none\n");
    } else {
        let tags: Vec<&str> = request.tags.iter().map(|t| t.as_str()).collect();
        output.push_str(&format!("Tags: {}\n", tags.join(", ")));
    }

    output.push_str(&format!(
        "Create: up to {} attempt(s), {}s apart\n",
        policy.create.max_attempts,
        policy.create.interval.as_secs()
    ));
    output.push_str(&format!(
        "Readiness: up to {} poll(s), {}s apart (at most ~{:.1}h)\n",
        policy.poll.max_attempts,
        policy.poll.interval.as_secs(),
        policy.poll.total_wait().as_secs_f64() / 3600.0
    ));

    output
}

/// JSON result printed after a successful run. `changed` is false when an
/// existing cluster was adopted.
pub fn success_report(outcome: &ProvisionOutcome) -> Value {
    json!({
        "changed": !outcome.already_existed,
        "run_id": outcome.run_id,
        "id": outcome.identity.id,
        "polls": outcome.polls,
        "tags": outcome.tags,
        "data": outcome.cluster,
    })
}

/// JSON result printed after a failed run.
pub fn failure_report(failure: &ProvisionFailure) -> Value {
    json!({
        "failed": true,
        "changed": false,
        "phase": failure.phase,
        "msg": failure.to_string(),
    })
}
