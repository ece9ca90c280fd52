//! # kubeadmin
//!
//! Provisions IBM Cloud Kubernetes clusters: authenticates against IAM,
//! creates the cluster (or adopts an existing one with the same name), tags
//! it, and polls until the master is deployed and ingress is assigned.
//!
//! ```text
//! Provisioner ──► TokenManager ──► ClusterRegistry ──► TaggingService
//!      │                                  │
//!      └──── poll: renew token ─► get ─► is_ready ─┘
//! ```
//!
//! All HTTP goes through the [`client::RequestExecutor`] trait so that every
//! component can be exercised without a network.

pub mod cli;
pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod iam;
pub mod orchestrator;
pub mod retry;

pub use error::{Phase, ProvisionError, ProvisionFailure};
pub use orchestrator::{ProvisionOutcome, Provisioner};
