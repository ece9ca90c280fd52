//! # Cluster resources
//!
//! Everything that talks about one IBM Cloud Kubernetes cluster:
//!
//! - **model**: identity, status fields and fetched snapshots
//! - **request**: the desired cluster, its creation payload and tag parsing
//! - **registry**: lookup and idempotent creation
//! - **tagging**: label attachment by CRN
//! - **readiness**: the predicate that ends the polling phase

pub mod model;
pub mod readiness;
pub mod registry;
pub mod request;
pub mod tagging;

pub use model::{ClusterIdentity, ClusterSnapshot, ClusterStatus};
pub use readiness::{is_ready, unmet_conditions};
pub use registry::{ClusterRegistry, CreateOutcome, RESOURCE_GROUP_HEADER};
pub use request::{parse_tags, ClusterRequest, CreateClusterPayload, Tag, VlanPair};
pub use tagging::{TagFailure, TagReport, TaggingService};
