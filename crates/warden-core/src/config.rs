//! ACL configuration toggles.

use serde::Deserialize;

fn default_parent_depth_limit() -> usize {
    32
}

/// Configuration for the ACL engine and administration service.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    /// Whether mutating operations emit `ACL_AUDIT` log lines.
    pub audit_enabled: bool,

    /// Maximum parent-identity chain length accepted when wiring an object
    /// identity under a parent. Bounds the referential walk and catches
    /// cycles in pre-existing data.
    #[serde(default = "default_parent_depth_limit")]
    pub parent_depth_limit: usize,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            audit_enabled: false,
            parent_depth_limit: default_parent_depth_limit(),
        }
    }
}
