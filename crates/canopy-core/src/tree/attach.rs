//! Structural lifecycle: Attach, ReAttach, Detach, Destroy
//!
//! The tree is mutated only through these verbs. Structural misuse
//! (double attach, invalid parent kind, routing mismatch) can only be a
//! caller bug, so it fails the call with the tree unchanged; all
//! validation happens before the first mutation.

use canopy_core_types::{EntityKind, EntityState};
use canopy_errors::{Result, TreeError};

use super::{ParentRef, Tree};
use crate::events::ActionKind;
use crate::propagate::check::{delete_inherited_check_subtree, sync_checks};
use crate::propagate::property::{delete_inherited_subtree, sync_properties};

/// Attach a floating entity under a parent
///
/// Validates the declared parent address and the parent→child kind pair,
/// links the entity, emits `create` and `member_new`, then synchronously
/// pushes every inheritable property and check of the parent down so the
/// fresh subtree starts fully populated.
///
/// # Errors
/// * `AlreadyAttached` - entity already has a parent
/// * `RoutingMismatch` - declared parent kind does not match the entity
/// * `InvalidParentKind` - kind pair is not allowed
/// * `CycleDetected` - parent lies inside the entity's own subtree
pub fn attach(tree: &mut Tree, child_id: &str, parent: &ParentRef) -> Result<()> {
    let (child_kind, current_parent) = {
        let child = tree.get(child_id)?;
        (child.kind, child.parent.clone())
    };
    if let Some(parent_id) = current_parent {
        return Err(TreeError::AlreadyAttached {
            entity_id: child_id.to_string(),
            parent_id,
        });
    }
    validate_parent(tree, child_kind, parent)?;
    ensure_outside_subtree(tree, child_id, &parent.id)?;

    link(tree, child_id, child_kind, parent)?;
    let export = tree.get(child_id)?.export();
    tree.emit(ActionKind::Create, child_kind, child_id, export);
    emit_membership(tree, ActionKind::MemberNew, parent, child_id, child_kind);
    tracing::info!(entity_id = child_id, parent_id = %parent.id, "attached");

    sync_properties(tree, &parent.id, child_id)?;
    sync_checks(tree, &parent.id, child_id)
}

/// Move a Group, Cluster or Node under a new parent
///
/// Inherited (non-source) properties and checks held along the old
/// ancestry are deleted first, since they must be recomputed from the new
/// ancestry; the move then emits `update` and resyncs from the new
/// parent.
///
/// # Errors
/// * `ReattachUndefined` - kind is not relocatable
/// * `NotAttached` - entity has no current parent
/// * `RoutingMismatch` / `InvalidParentKind` - bad new parent address
/// * `CycleDetected` - new parent lies inside the entity's own subtree
pub fn reattach(tree: &mut Tree, child_id: &str, new_parent: &ParentRef) -> Result<()> {
    let (child_kind, current_parent) = {
        let child = tree.get(child_id)?;
        (child.kind, child.parent.clone())
    };
    if !child_kind.relocatable() {
        return Err(TreeError::ReattachUndefined {
            kind: child_kind,
            entity_id: child_id.to_string(),
        });
    }
    let old_parent = current_parent.ok_or_else(|| TreeError::NotAttached {
        entity_id: child_id.to_string(),
    })?;
    validate_parent(tree, child_kind, new_parent)?;
    ensure_outside_subtree(tree, child_id, &new_parent.id)?;

    strip_inherited(tree, child_id)?;
    unlink(tree, &old_parent, child_id)?;
    link(tree, child_id, child_kind, new_parent)?;

    let export = tree.get(child_id)?.export();
    tree.emit(ActionKind::Update, child_kind, child_id, export);
    emit_membership(tree, ActionKind::MemberNew, new_parent, child_id, child_kind);
    tracing::info!(entity_id = child_id, parent_id = %new_parent.id, "reattached");

    sync_properties(tree, &new_parent.id, child_id)?;
    sync_checks(tree, &new_parent.id, child_id)
}

/// Detach an entity from its grouping
///
/// Group/Cluster/Node move directly under their enclosing Bucket. A
/// Repository cannot be relocated, only removed: its Detach is Destroy.
/// Bucket and Root have no Detach.
///
/// # Errors
/// * `DetachUndefined` - kind has no detach operation
/// * `NotAttached` / `NoEnclosingBucket` - broken placement
pub fn detach(tree: &mut Tree, entity_id: &str) -> Result<()> {
    let kind = tree.get(entity_id)?.kind;
    match kind {
        EntityKind::Repository => destroy(tree, entity_id),
        EntityKind::Group | EntityKind::Cluster | EntityKind::Node => {
            let parent = tree.get(entity_id)?.parent.clone().ok_or_else(|| {
                TreeError::NotAttached {
                    entity_id: entity_id.to_string(),
                }
            })?;
            let bucket_id = tree.enclosing_bucket(entity_id)?;
            if parent == bucket_id {
                // already directly under the bucket, nothing to move
                return Ok(());
            }
            reattach(tree, entity_id, &ParentRef::new(EntityKind::Bucket, bucket_id))
        }
        EntityKind::Bucket | EntityKind::Root => Err(TreeError::DetachUndefined {
            kind,
            entity_id: entity_id.to_string(),
        }),
    }
}

/// Destroy an entity and its whole subtree
///
/// Cascades depth-first over children, emitting per-object deletion
/// events for instances, checks and properties, releases the event
/// wiring, and unlinks from the parent once the subtree is gone.
/// Terminal: destroyed ids leave the arena.
///
/// # Errors
/// * `CannotDestroyRoot` - the root is permanent
/// * `RoutingMismatch` - parent/child membership was inconsistent
pub fn destroy(tree: &mut Tree, entity_id: &str) -> Result<()> {
    let entity = tree.get(entity_id)?;
    if entity.kind == EntityKind::Root {
        return Err(TreeError::CannotDestroyRoot {
            entity_id: entity_id.to_string(),
        });
    }
    let parent = entity.parent.clone();

    destroy_recursive(tree, entity_id)?;

    if let Some(parent_id) = parent {
        let parent_kind = {
            let p = tree.get_mut(&parent_id)?;
            if !p.children.remove(entity_id) {
                return Err(TreeError::RoutingMismatch {
                    entity_id: entity_id.to_string(),
                    reason: format!("not a child of {}", parent_id),
                });
            }
            p.touch();
            p.kind
        };
        tree.emit(
            ActionKind::MemberRemoved,
            parent_kind,
            &parent_id,
            serde_json::json!({ "parent_id": parent_id, "child_id": entity_id }),
        );
    }
    tracing::info!(entity_id, "destroyed");
    Ok(())
}

fn destroy_recursive(tree: &mut Tree, entity_id: &str) -> Result<()> {
    let kind = tree.get(entity_id)?.kind;

    // own teardown events precede the children's
    emit_config_teardown(tree, entity_id, kind)?;
    let export = tree.get(entity_id)?.export();
    tree.emit(ActionKind::Delete, kind, entity_id, export);
    tree.emit(
        ActionKind::RemoveActionchannel,
        kind,
        entity_id,
        serde_json::Value::Null,
    );

    for child_id in tree.child_ids(entity_id)? {
        destroy_recursive(tree, &child_id)?;
    }
    tree.entities.remove(entity_id);
    Ok(())
}

fn emit_config_teardown(tree: &mut Tree, entity_id: &str, kind: EntityKind) -> Result<()> {
    let entity = tree.get(entity_id)?;

    let mut check_ids: Vec<String> = entity.check_instances.keys().cloned().collect();
    check_ids.sort();
    for check_id in &check_ids {
        if let Some(instances) = entity.check_instances.get(check_id) {
            for instance in instances {
                tree.emit(
                    ActionKind::CheckInstanceDelete,
                    kind,
                    entity_id,
                    serde_json::json!({ "object_id": entity_id, "instance": instance }),
                );
            }
        }
    }

    let mut checks: Vec<&crate::model::Check> = entity.checks.values().collect();
    checks.sort_by(|a, b| a.id.cmp(&b.id));
    for check in checks {
        tree.emit(
            ActionKind::CheckRemoved,
            kind,
            entity_id,
            serde_json::json!({ "object_id": entity_id, "check": check }),
        );
    }

    for property in entity.properties.iter_sorted() {
        tree.emit(
            ActionKind::PropertyDelete,
            kind,
            entity_id,
            serde_json::json!({ "object_id": entity_id, "property": property }),
        );
    }
    Ok(())
}

/// Drop every inherited property/check the entity holds, cascading the
/// removal through its own subtree (the mover is the chain carrier for
/// everything below it).
fn strip_inherited(tree: &mut Tree, entity_id: &str) -> Result<()> {
    let inherited_props: Vec<(canopy_core_types::PropertyKind, String)> = {
        let entity = tree.get(entity_id)?;
        entity
            .properties
            .iter_sorted()
            .into_iter()
            .filter(|p| p.inherited)
            .map(|p| (p.payload.kind(), p.source_id.clone()))
            .collect()
    };
    for (kind, source_id) in inherited_props {
        delete_inherited_subtree(tree, entity_id, kind, &source_id)?;
    }

    let inherited_checks: Vec<String> = {
        let entity = tree.get(entity_id)?;
        let mut ids: Vec<String> = entity
            .checks
            .values()
            .filter(|c| c.inherited)
            .map(|c| c.source_id.clone())
            .collect();
        ids.sort();
        ids
    };
    for source_id in inherited_checks {
        delete_inherited_check_subtree(tree, entity_id, &source_id)?;
    }
    Ok(())
}

/// Reject a parent that is the entity itself or one of its descendants
///
/// Group can legally parent Group, so linking into the own subtree would
/// otherwise pass kind validation and leave the arena with a parent/child
/// cycle no recursive walk terminates on. Checked before any mutation.
fn ensure_outside_subtree(tree: &Tree, child_id: &str, parent_id: &str) -> Result<()> {
    let mut current = Some(parent_id.to_string());
    while let Some(id) = current {
        if id == child_id {
            return Err(TreeError::CycleDetected {
                entity_id: child_id.to_string(),
                parent_id: parent_id.to_string(),
            });
        }
        current = tree.get(&id)?.parent.clone();
    }
    Ok(())
}

fn validate_parent(tree: &Tree, child_kind: EntityKind, parent: &ParentRef) -> Result<()> {
    let parent_entity = tree.get(&parent.id)?;
    if parent_entity.kind != parent.kind {
        return Err(TreeError::RoutingMismatch {
            entity_id: parent.id.clone(),
            reason: format!(
                "addressed as {} but entity is {}",
                parent.kind, parent_entity.kind
            ),
        });
    }
    if !parent.kind.can_parent(child_kind) {
        return Err(TreeError::InvalidParentKind {
            parent_kind: parent.kind,
            child_kind,
        });
    }
    Ok(())
}

fn link(tree: &mut Tree, child_id: &str, child_kind: EntityKind, parent: &ParentRef) -> Result<()> {
    let parent_environment = {
        let p = tree.get_mut(&parent.id)?;
        p.children.insert(child_id.to_string());
        p.touch();
        p.environment.clone()
    };
    let child = tree.get_mut(child_id)?;
    child.parent = Some(parent.id.clone());
    child.state = Tree::state_under(child_kind, parent.kind);
    if child.environment.is_empty() {
        child.environment = parent_environment;
    }
    child.touch();
    Ok(())
}

fn unlink(tree: &mut Tree, parent_id: &str, child_id: &str) -> Result<()> {
    let parent_kind = {
        let p = tree.get_mut(parent_id)?;
        if !p.children.remove(child_id) {
            return Err(TreeError::RoutingMismatch {
                entity_id: child_id.to_string(),
                reason: format!("not a child of {}", parent_id),
            });
        }
        p.touch();
        p.kind
    };
    let child = tree.get_mut(child_id)?;
    child.parent = None;
    child.state = EntityState::Floating;
    child.touch();
    tree.emit(
        ActionKind::MemberRemoved,
        parent_kind,
        parent_id,
        serde_json::json!({ "parent_id": parent_id, "child_id": child_id }),
    );
    Ok(())
}

fn emit_membership(
    tree: &Tree,
    action: ActionKind,
    parent: &ParentRef,
    child_id: &str,
    child_kind: EntityKind,
) {
    tree.emit(
        action,
        parent.kind,
        &parent.id,
        serde_json::json!({
            "parent_id": parent.id,
            "child_id": child_id,
            "child_type": child_kind.as_str(),
        }),
    );
}
