//! Tree arena
//!
//! All entities are owned by a single arena keyed by id; parent/child
//! links are id references. This keeps O(1) parent lookup without
//! reference cycles and makes the snapshot shadow a plain deep clone.

pub mod attach;

use std::collections::HashMap;

use canopy_core_types::{EntityKind, EntityState};
use canopy_errors::{Fault, Result, TreeError};
use crossbeam_channel::Receiver;
use uuid::Uuid;

use crate::events::{Action, ActionEmitter, ActionKind};
use crate::fault::FaultSink;
use crate::model::{
    BucketSpec, ClusterSpec, Entity, GroupSpec, NodeSpec, RepositorySpec,
};

/// Typed parent address used by the receive/unlink protocol
///
/// The declared kind must match the actual entity behind the id; a
/// mismatch is an internal addressing defect and fails the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub kind: EntityKind,
    pub id: String,
}

impl ParentRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Consumer ends of the outbound queues of one tree
pub struct TreeChannels {
    pub actions: Receiver<Action>,
    pub faults: Receiver<Fault>,
}

/// Deep-cloned arena state held between begin and commit/rollback
#[derive(Debug, Clone)]
pub(crate) struct Shadow {
    pub(crate) root_id: String,
    pub(crate) entities: HashMap<String, Entity>,
}

/// The configuration tree
pub struct Tree {
    pub(crate) root_id: String,
    pub(crate) entities: HashMap<String, Entity>,
    pub(crate) actions: ActionEmitter,
    pub(crate) faults: FaultSink,
    pub(crate) shadow: Option<Shadow>,
}

impl Tree {
    /// Create a tree with a fresh root and wire its outbound queues
    pub fn new(name: &str) -> (Tree, TreeChannels) {
        let (actions, action_rx) = ActionEmitter::channel();
        let (faults, fault_rx) = FaultSink::channel();

        let root = Entity::root(Uuid::now_v7().to_string(), name.to_string());
        let root_id = root.id.clone();
        let mut entities = HashMap::new();
        entities.insert(root_id.clone(), root);

        let tree = Tree {
            root_id: root_id.clone(),
            entities,
            actions,
            faults,
            shadow: None,
        };
        let export = tree.entities[&root_id].export();
        tree.emit(ActionKind::Attached, EntityKind::Root, &root_id, export);

        (
            tree,
            TreeChannels {
                actions: action_rx,
                faults: fault_rx,
            },
        )
    }

    /// Id of the tree root
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Get an entity by id
    ///
    /// # Errors
    /// Returns `EntityNotFound` if the id is not in the arena.
    pub fn get(&self, id: &str) -> Result<&Entity> {
        self.entities.get(id).ok_or_else(|| TreeError::EntityNotFound {
            entity_id: id.to_string(),
        })
    }

    /// Get a mutable reference to an entity by id
    ///
    /// # Errors
    /// Returns `EntityNotFound` if the id is not in the arena.
    pub fn get_mut(&mut self, id: &str) -> Result<&mut Entity> {
        self.entities
            .get_mut(id)
            .ok_or_else(|| TreeError::EntityNotFound {
                entity_id: id.to_string(),
            })
    }

    /// Check if an entity id exists in the arena
    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Number of entities in the arena, root included
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn insert_floating(&mut self, entity: Entity) -> Result<String> {
        if self.entities.contains_key(&entity.id) {
            return Err(TreeError::AlreadyExists {
                entity_id: entity.id.clone(),
            });
        }
        let id = entity.id.clone();
        tracing::debug!(entity_id = %id, kind = entity.kind.as_str(), "entity constructed");
        self.entities.insert(id.clone(), entity);
        Ok(id)
    }

    /// Construct a floating Repository from a validated spec
    ///
    /// # Errors
    /// `InvalidSpec` on validation failure, `AlreadyExists` on id reuse.
    pub fn create_repository(&mut self, spec: RepositorySpec) -> Result<String> {
        spec.validate()?;
        self.insert_floating(Entity::repository(spec))
    }

    /// Construct a floating Bucket from a validated spec
    pub fn create_bucket(&mut self, spec: BucketSpec) -> Result<String> {
        spec.validate()?;
        self.insert_floating(Entity::bucket(spec))
    }

    /// Construct a floating Group from a validated spec
    pub fn create_group(&mut self, spec: GroupSpec) -> Result<String> {
        spec.validate()?;
        self.insert_floating(Entity::group(spec))
    }

    /// Construct a floating Cluster from a validated spec
    pub fn create_cluster(&mut self, spec: ClusterSpec) -> Result<String> {
        spec.validate()?;
        self.insert_floating(Entity::cluster(spec))
    }

    /// Construct a floating Node from a validated spec
    pub fn create_node(&mut self, spec: NodeSpec) -> Result<String> {
        spec.validate()?;
        self.insert_floating(Entity::node(spec))
    }

    /// Walk the parent chain to the enclosing Bucket
    ///
    /// # Errors
    /// `NoEnclosingBucket` if the chain reaches the root without passing a
    /// bucket, `EntityNotFound` on a broken chain.
    pub fn enclosing_bucket(&self, id: &str) -> Result<String> {
        let mut current = self.get(id)?.parent.clone();
        while let Some(pid) = current {
            let parent = self.get(&pid)?;
            if parent.kind == EntityKind::Bucket {
                return Ok(pid);
            }
            current = parent.parent.clone();
        }
        Err(TreeError::NoEnclosingBucket {
            entity_id: id.to_string(),
        })
    }

    /// Sorted child ids of an entity
    pub(crate) fn child_ids(&self, id: &str) -> Result<Vec<String>> {
        Ok(self.get(id)?.children.iter().cloned().collect())
    }

    pub(crate) fn emit(
        &self,
        action: ActionKind,
        object_kind: EntityKind,
        object_id: &str,
        payload: serde_json::Value,
    ) {
        self.actions.emit(action, object_kind, object_id, payload);
    }

    pub(crate) fn fault(&self, fault: Fault) {
        self.faults.record(fault);
    }

    /// State an entity assumes under a given parent kind
    pub(crate) fn state_under(child: EntityKind, parent: EntityKind) -> EntityState {
        match (child, parent) {
            (EntityKind::Repository, _) | (EntityKind::Bucket, _) => EntityState::Attached,
            (_, EntityKind::Bucket) => EntityState::Standalone,
            (_, EntityKind::Group) => EntityState::Grouped,
            (_, EntityKind::Cluster) => EntityState::Clustered,
            _ => EntityState::Attached,
        }
    }
}
