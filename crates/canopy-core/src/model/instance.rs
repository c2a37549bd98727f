//! Materialized check instances
//!
//! A check instance is one concrete binding of a check to an entity and,
//! if service-scoped, one specific service-configuration permutation.
//! Instance identity (`instance_id`) persists across recomputation while
//! the relevant identity hash is unchanged; `version` advances on every
//! recompute that reproduces the instance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One materialized binding of a check to an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInstance {
    pub instance_id: String,
    pub check_id: String,
    pub config_id: String,
    /// Monotonic per-instance recompute counter
    pub version: u64,
    /// Digest over the sorted ids of all matched constraints
    pub constraint_hash: String,
    /// Digest additionally covering matched constraint values
    pub constraint_val_hash: String,
    /// Digest over the concrete service-attribute assignment; empty for
    /// instances without a service binding
    pub instance_svc_cfg_hash: String,
    /// Matched native attributes (attribute name → value)
    pub matched_native: BTreeMap<String, String>,
    pub matched_system: BTreeMap<String, String>,
    pub matched_custom: BTreeMap<String, String>,
    pub matched_oncall: BTreeMap<String, String>,
    /// Attribute constraints that pinned service configuration values
    pub matched_attributes: BTreeMap<String, String>,
    /// Name of the bound service property, empty if none
    pub instance_service: String,
    /// The concrete attribute assignment of this permutation
    pub instance_service_config: BTreeMap<String, String>,
}

impl CheckInstance {
    /// Hash that identifies this instance across recomputation
    ///
    /// Service-bound instances are matched by their configuration hash,
    /// unconstrained ones by the constraint hash.
    pub fn identity_hash(&self) -> &str {
        if self.instance_svc_cfg_hash.is_empty() {
            &self.constraint_hash
        } else {
            &self.instance_svc_cfg_hash
        }
    }

    /// Whether this instance is bound to a service permutation
    pub fn is_service_bound(&self) -> bool {
        !self.instance_service.is_empty()
    }
}
