//! Tree entity arena records
//!
//! Entities are owned by the tree arena and reference each other by id:
//! one optional parent back-reference and an owned, ordered set of child
//! ids. Ordered children make every propagation walk deterministic.

use std::collections::{BTreeSet, HashMap};

use canopy_core_types::{EntityKind, EntityState, PropertyKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::check::Check;
use super::instance::CheckInstance;
use super::property::Property;
use super::spec::{BucketSpec, ClusterSpec, GroupSpec, NodeSpec, RepositorySpec};

/// Per-kind property maps of one entity, keyed by property instance id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyStore {
    pub custom: HashMap<String, Property>,
    pub system: HashMap<String, Property>,
    pub service: HashMap<String, Property>,
    pub oncall: HashMap<String, Property>,
}

impl PropertyStore {
    /// Map for the given property kind
    pub fn map(&self, kind: PropertyKind) -> &HashMap<String, Property> {
        match kind {
            PropertyKind::Custom => &self.custom,
            PropertyKind::System => &self.system,
            PropertyKind::Service => &self.service,
            PropertyKind::Oncall => &self.oncall,
        }
    }

    /// Mutable map for the given property kind
    pub fn map_mut(&mut self, kind: PropertyKind) -> &mut HashMap<String, Property> {
        match kind {
            PropertyKind::Custom => &mut self.custom,
            PropertyKind::System => &mut self.system,
            PropertyKind::Service => &mut self.service,
            PropertyKind::Oncall => &mut self.oncall,
        }
    }

    /// Iterate all properties across kinds in canonical kind order,
    /// sorted by instance id within each kind
    pub fn iter_sorted(&self) -> Vec<&Property> {
        let mut out = Vec::new();
        for kind in PropertyKind::all() {
            let mut props: Vec<&Property> = self.map(kind).values().collect();
            props.sort_by(|a, b| a.id.cmp(&b.id));
            out.extend(props);
        }
        out
    }

    /// Locate a property by instance id across all kinds
    pub fn get(&self, property_id: &str) -> Option<&Property> {
        for kind in PropertyKind::all() {
            if let Some(p) = self.map(kind).get(property_id) {
                return Some(p);
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.custom.is_empty()
            && self.system.is_empty()
            && self.service.is_empty()
            && self.oncall.is_empty()
    }
}

/// One node of the configuration tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier (UUID)
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    pub state: EntityState,
    /// Deployment environment, inherited from the enclosing bucket for
    /// groups and clusters at attach time
    pub environment: String,
    /// Owning team id
    pub team_id: String,
    /// Repository id recorded on buckets
    pub repository_id: Option<String>,
    /// Inventory asset id recorded on nodes
    pub asset_id: Option<u64>,
    /// Physical server id recorded on nodes
    pub server_id: Option<String>,
    /// Node liveness flag
    pub online: bool,
    /// Parent back-reference, id only (non-owning)
    pub parent: Option<String>,
    /// Owned child ids; always empty for nodes
    pub children: BTreeSet<String>,
    pub properties: PropertyStore,
    /// Checks keyed by check instance id
    pub checks: HashMap<String, Check>,
    /// Compiled instances per check id (Group/Cluster/Node only)
    pub check_instances: HashMap<String, Vec<CheckInstance>>,
    /// Transient startup-reconciliation buffer per check id
    #[serde(skip)]
    pub loaded_instances: HashMap<String, Vec<CheckInstance>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    fn blank(id: String, name: String, kind: EntityKind, team_id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            kind,
            state: EntityState::Floating,
            environment: String::new(),
            team_id,
            repository_id: None,
            asset_id: None,
            server_id: None,
            online: true,
            parent: None,
            children: BTreeSet::new(),
            properties: PropertyStore::default(),
            checks: HashMap::new(),
            check_instances: HashMap::new(),
            loaded_instances: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The tree root; one per tree, never destroyed
    pub fn root(id: String, name: String) -> Self {
        let mut root = Self::blank(id, name, EntityKind::Root, String::new());
        root.state = EntityState::Attached;
        root
    }

    pub fn repository(spec: RepositorySpec) -> Self {
        Self::blank(spec.id, spec.name, EntityKind::Repository, spec.team_id)
    }

    pub fn bucket(spec: BucketSpec) -> Self {
        let mut e = Self::blank(spec.id, spec.name, EntityKind::Bucket, spec.team_id);
        e.environment = spec.environment;
        e.repository_id = Some(spec.repository_id);
        e
    }

    pub fn group(spec: GroupSpec) -> Self {
        Self::blank(spec.id, spec.name, EntityKind::Group, spec.team_id)
    }

    pub fn cluster(spec: ClusterSpec) -> Self {
        Self::blank(spec.id, spec.name, EntityKind::Cluster, spec.team_id)
    }

    pub fn node(spec: NodeSpec) -> Self {
        let mut e = Self::blank(spec.id, spec.name, EntityKind::Node, spec.team_id);
        e.asset_id = Some(spec.asset_id);
        e.server_id = Some(spec.server_id);
        e.online = spec.online;
        e
    }

    /// Check if this entity is linked into the tree
    pub fn is_attached(&self) -> bool {
        self.parent.is_some()
    }

    /// Export snapshot attached to outbound action events
    ///
    /// A flat structural record; property/check payloads travel in their
    /// own events.
    pub fn export(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "type": self.kind.as_str(),
            "state": self.state.as_str(),
            "environment": self.environment,
            "team_id": self.team_id,
            "parent_id": self.parent,
        })
    }

    /// Touch the update timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core_types::View;
    use crate::model::property::{PropertyInput, PropertyPayload};

    const ID: &str = "018f3c2e-1111-7def-8000-000000000001";

    #[test]
    fn test_new_entity_is_floating() {
        let repo = Entity::repository(RepositorySpec {
            id: ID.to_string(),
            name: "production".to_string(),
            team_id: ID.to_string(),
        });
        assert_eq!(repo.state, EntityState::Floating);
        assert!(!repo.is_attached());
        assert!(repo.children.is_empty());
        assert!(repo.properties.is_empty());
    }

    #[test]
    fn test_bucket_carries_environment() {
        let bucket = Entity::bucket(BucketSpec {
            id: ID.to_string(),
            name: "prod-eu".to_string(),
            environment: "production".to_string(),
            team_id: ID.to_string(),
            repository_id: ID.to_string(),
        });
        assert_eq!(bucket.environment, "production");
        assert_eq!(bucket.repository_id.as_deref(), Some(ID));
    }

    #[test]
    fn test_property_store_lookup_across_kinds() {
        let mut store = PropertyStore::default();
        let prop = PropertyInput {
            payload: PropertyPayload::Custom {
                key: "team".to_string(),
                value: "infra".to_string(),
            },
            view: View::any(),
            inheritance: false,
            children_only: false,
            instances: Vec::new(),
        }
        .into_source(ID, EntityKind::Repository);
        let id = prop.id.clone();
        store.custom.insert(id.clone(), prop);

        assert!(store.get(&id).is_some());
        assert!(store.get("missing").is_none());
        assert_eq!(store.iter_sorted().len(), 1);
    }

    #[test]
    fn test_export_is_flat() {
        let repo = Entity::repository(RepositorySpec {
            id: ID.to_string(),
            name: "production".to_string(),
            team_id: ID.to_string(),
        });
        let export = repo.export();
        assert_eq!(export["type"], "repository");
        assert_eq!(export["state"], "floating");
        assert!(export["parent_id"].is_null());
    }
}
