//! Typed properties and their inheritance metadata
//!
//! A property is one instance in a logical chain: exactly one instance per
//! chain is the source (`inherited == false`); every reachable descendant
//! holds at most one inherited copy referencing that source, until shadowed
//! by a local override.

use canopy_core_types::{EntityKind, PropertyKind, View};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One named attribute of a service property
///
/// Multi-valued attributes are represented as repeated entries with the
/// same name; the instance compiler expands the Cartesian product over
/// the distinct values of each name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAttribute {
    pub name: String,
    pub value: String,
}

/// Type-specific property payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PropertyPayload {
    Custom { key: String, value: String },
    System { key: String, value: String },
    Service { name: String, attributes: Vec<ServiceAttribute> },
    Oncall { name: String, number: String },
}

impl PropertyPayload {
    /// Property kind of this payload
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyPayload::Custom { .. } => PropertyKind::Custom,
            PropertyPayload::System { .. } => PropertyKind::System,
            PropertyPayload::Service { .. } => PropertyKind::Service,
            PropertyPayload::Oncall { .. } => PropertyKind::Oncall,
        }
    }

    /// Key under which duplicates are detected
    pub fn dedup_key(&self) -> &str {
        match self {
            PropertyPayload::Custom { key, .. } => key,
            PropertyPayload::System { key, .. } => key,
            PropertyPayload::Service { name, .. } => name,
            PropertyPayload::Oncall { name, .. } => name,
        }
    }

    /// Duplicate rule between two payloads
    ///
    /// Custom/Service/Oncall duplicate on exact key (or service name)
    /// match. System special-cases `tag`: two tags are duplicates only if
    /// both key and value match, otherwise they coexist.
    pub fn duplicates(&self, other: &PropertyPayload) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        match (self, other) {
            (
                PropertyPayload::System { key: k1, value: v1 },
                PropertyPayload::System { key: k2, value: v2 },
            ) => {
                if k1 == "tag" {
                    k1 == k2 && v1 == v2
                } else {
                    k1 == k2
                }
            }
            _ => self.dedup_key() == other.dedup_key(),
        }
    }
}

/// Stable-id recovery hint, recorded by the startup loader
///
/// Maps a descendant entity to the instance id its inherited copy held in
/// the previous incarnation of the tree, so reload reproduces ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceHint {
    pub object_id: String,
    pub object_kind: EntityKind,
    pub instance_id: String,
}

/// A typed property instance held by one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
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
    /// Whether this property propagates to descendants
    pub inheritance: bool,
    /// Applies to descendants only, not the holding entity itself
    pub children_only: bool,
    pub view: View,
    pub payload: PropertyPayload,
    /// Stable-id hints consumed while propagating inherited copies
    pub instances: Vec<InstanceHint>,
}

impl Property {
    /// Build the clone pushed to a child during propagation
    ///
    /// The copy is marked inherited with a blank instance id; the receiving
    /// entity mints or recovers the id. Source identity and the hint list
    /// travel unchanged so the whole subtree can recover stable ids.
    pub fn child_copy(&self) -> Property {
        Property {
            id: String::new(),
            source_id: self.source_id.clone(),
            source_kind: self.source_kind,
            inherited: true,
            inherited_from: self.inherited_from.clone(),
            inheritance: self.inheritance,
            children_only: self.children_only,
            view: self.view.clone(),
            payload: self.payload.clone(),
            instances: self.instances.clone(),
        }
    }

    /// Look up a recorded instance id for the given entity
    pub fn hinted_instance_id(&self, object_id: &str) -> Option<&str> {
        self.instances
            .iter()
            .find(|h| h.object_id == object_id)
            .map(|h| h.instance_id.as_str())
    }

    /// Whether this property applies to the entity holding it
    ///
    /// A children-only source is carried for propagation but does not bind
    /// to its owner; the inherited copies downstream do apply.
    pub fn applies_to_holder(&self) -> bool {
        !(self.children_only && !self.inherited)
    }
}

/// Request record for setting or updating a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyInput {
    pub payload: PropertyPayload,
    pub view: View,
    pub inheritance: bool,
    pub children_only: bool,
    /// Stable-id hints, populated by the startup loader, empty otherwise
    #[serde(default)]
    pub instances: Vec<InstanceHint>,
}

impl PropertyInput {
    /// Materialize the source instance of a new property chain
    pub fn into_source(self, owner_id: &str, owner_kind: EntityKind) -> Property {
        let id = Uuid::now_v7().to_string();
        Property {
            id: id.clone(),
            source_id: id,
            source_kind: owner_kind,
            inherited: false,
            inherited_from: owner_id.to_string(),
            inheritance: self.inheritance,
            children_only: self.children_only,
            view: self.view,
            payload: self.payload,
            instances: self.instances,
        }
    }
}
