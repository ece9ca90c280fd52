use std::fmt;

use serde::Serialize;

use crate::error::ProvisionError;

/// A trimmed, non-empty label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Trim `raw`; `None` when nothing remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split a comma-separated tag list, keeping order and dropping blanks.
pub fn parse_tags(raw: &str) -> Vec<Tag> {
    raw.split(',').filter_map(Tag::parse).collect()
}

/// Private and public VLAN ids. Only ever sent together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VlanPair {
    pub private: String,
    pub public: String,
}

/// Desired cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterRequest {
    pub name: String,
    pub resource_group: String,
    pub datacenter: String,
    pub machine_type: String,
    pub master_version: String,
    pub worker_count: u32,
    pub entitlement: Option<String>,
    pub vlans: Option<VlanPair>,
    pub tags: Vec<Tag>,
}

/// Body of the cluster creation call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterPayload<'a> {
    pub data_center: &'a str,
    pub public_service_endpoint: bool,
    pub machine_type: &'a str,
    pub master_version: &'a str,
    pub name: &'a str,
    pub skit_perm_precheck: bool,
    pub worker_num: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_vlan: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_vlan: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_worker_pool_entitlement: Option<&'a str>,
}

impl ClusterRequest {
    pub fn new(
        name: impl Into<String>,
        resource_group: impl Into<String>,
        datacenter: impl Into<String>,
        machine_type: impl Into<String>,
        master_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_group: resource_group.into(),
            datacenter: datacenter.into(),
            machine_type: machine_type.into(),
            master_version: master_version.into(),
            worker_count: 1,
            entitlement: None,
            vlans: None,
            tags: Vec::new(),
        }
    }

    pub fn with_worker_count(mut self, count: u32) -> Self {
        self.worker_count = count;
        self
    }

    pub fn with_vlans(mut self, private: impl Into<String>, public: impl Into<String>) -> Self {
        self.vlans = Some(VlanPair {
            private: private.into(),
            public: public.into(),
        });
        self
    }

    pub fn with_entitlement(mut self, entitlement: impl Into<String>) -> Self {
        self.entitlement = Some(entitlement.into());
        self
    }

    /// Replace the tag list with the tags parsed from `raw`.
    pub fn with_tags(mut self, raw: &str) -> Self {
        self.tags = parse_tags(raw);
        self
    }

    pub fn is_openshift(&self) -> bool {
        self.master_version.contains("openshift")
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        let required = [
            ("name", &self.name),
            ("resource group", &self.resource_group),
            ("datacenter", &self.datacenter),
            ("machine type", &self.machine_type),
            ("master version", &self.master_version),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ProvisionError::InvalidRequest(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }
        if self.worker_count == 0 {
            return Err(ProvisionError::InvalidRequest(
                "worker count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn creation_payload(&self) -> CreateClusterPayload<'_> {
        let entitlement = if self.is_openshift() {
            self.entitlement.as_deref()
        } else {
            None
        };

        CreateClusterPayload {
            data_center: &self.datacenter,
            public_service_endpoint: true,
            machine_type: &self.machine_type,
            master_version: &self.master_version,
            name: &self.name,
            skit_perm_precheck: true,
            worker_num: self.worker_count,
            private_vlan: self.vlans.as_ref().map(|v| v.private.as_str()),
            public_vlan: self.vlans.as_ref().map(|v| v.public.as_str()),
            default_worker_pool_entitlement: entitlement,
        }
    }
}
