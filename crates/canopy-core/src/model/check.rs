//! Check definitions and their constraints
//!
//! A check describes one monitoring rule; its constraints determine which
//! entities it binds to. Checks inherit through the tree exactly like
//! properties but are never deduplicated by value and have no update
//! operation: configuration changes are a delete followed by a set.

use canopy_core_types::{ConstraintKind, EntityKind, View};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One alarm threshold of a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    /// Comparison predicate, e.g. `>=`
    pub predicate: String,
    /// Notification level the threshold escalates to
    pub level: u8,
    pub value: i64,
}

/// One binding constraint of a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub key: String,
    pub value: String,
}

impl Constraint {
    /// Stable identifier used when hashing matched constraint sets
    pub fn ident(&self) -> String {
        format!("{}/{}", self.kind, self.key)
    }
}

/// A monitoring check definition held by one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    /// This instance's id
    pub id: String,
    /// Id of the originating source instance of the chain
    pub source_id: String,
    /// Kind of the entity owning the source instance
    pub source_kind: EntityKind,
    /// Whether this instance is an inherited copy
    pub inherited: bool,
    /// Id of the entity owning the source instance
    pub inherited_from: String,
    /// Monitoring capability this check exercises
    pub capability_id: String,
    /// Persisted check configuration this definition was derived from
    pub config_id: String,
    /// Whether this check propagates to descendants
    pub inheritance: bool,
    /// Applies to descendants only, not the holding entity itself
    pub children_only: bool,
    pub view: View,
    /// Execution interval in seconds
    pub interval: u64,
    pub thresholds: Vec<Threshold>,
    pub constraints: Vec<Constraint>,
}

impl Check {
    /// Build the clone pushed to a child during propagation
    pub fn child_copy(&self) -> Check {
        Check {
            id: String::new(),
            source_id: self.source_id.clone(),
            source_kind: self.source_kind,
            inherited: true,
            inherited_from: self.inherited_from.clone(),
            capability_id: self.capability_id.clone(),
            config_id: self.config_id.clone(),
            inheritance: self.inheritance,
            children_only: self.children_only,
            view: self.view.clone(),
            interval: self.interval,
            thresholds: self.thresholds.clone(),
            constraints: self.constraints.clone(),
        }
    }

    /// Whether the compiler should evaluate this check on its holder
    ///
    /// Skipped if children-only and held at the source, or scoped to the
    /// local view.
    pub fn compiles_on_holder(&self) -> bool {
        if self.children_only && !self.inherited {
            return false;
        }
        !self.view.is_local()
    }
}

/// Request record for setting a check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInput {
    pub capability_id: String,
    pub config_id: String,
    pub view: View,
    pub inheritance: bool,
    pub children_only: bool,
    pub interval: u64,
    pub thresholds: Vec<Threshold>,
    pub constraints: Vec<Constraint>,
}

impl CheckInput {
    /// Materialize the source instance of a new check chain
    pub fn into_source(self, owner_id: &str, owner_kind: EntityKind) -> Check {
        let id = Uuid::now_v7().to_string();
        Check {
            id: id.clone(),
            source_id: id,
            source_kind: owner_kind,
            inherited: false,
            inherited_from: owner_id.to_string(),
            capability_id: self.capability_id,
            config_id: self.config_id,
            inheritance: self.inheritance,
            children_only: self.children_only,
            view: self.view,
            interval: self.interval,
            thresholds: self.thresholds,
            constraints: self.constraints,
        }
    }
}
