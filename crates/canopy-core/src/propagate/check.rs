//! Check inheritance engine
//!
//! Structurally the same fan-out as property propagation over the
//! separate checks map, with two deliberate differences: checks are never
//! deduplicated by value (no shadowing), and there is no update operation
//! — configuration changes are a delete followed by a set, with
//! constraint evaluation redone by the instance compiler.

use canopy_core_types::EntityKind;
use canopy_errors::{Fault, FaultKind, Result};
use uuid::Uuid;

use crate::events::ActionKind;
use crate::model::{Check, CheckInput};
use crate::tree::Tree;

fn check_export(entity_id: &str, check: &Check) -> serde_json::Value {
    serde_json::json!({ "object_id": entity_id, "check": check })
}

/// Set a new check on an entity
///
/// Returns the source instance id. With `inheritance` enabled the check
/// fans out to the current subtree. Instances are not compiled here;
/// callers run the instance compiler when configuration settles.
///
/// # Errors
/// `EntityNotFound` if the entity id is not in the arena.
pub fn set_check(tree: &mut Tree, entity_id: &str, input: CheckInput) -> Result<String> {
    let owner_kind = tree.get(entity_id)?.kind;

    let source = input.into_source(entity_id, owner_kind);
    let source_id = source.id.clone();
    let propagates = source.inheritance;
    let copy = source.child_copy();

    let export = check_export(entity_id, &source);
    {
        let entity = tree.get_mut(entity_id)?;
        entity.checks.insert(source_id.clone(), source);
        entity.touch();
    }
    tree.emit(ActionKind::CheckNew, owner_kind, entity_id, export);
    tracing::debug!(entity_id, check_id = %source_id, "check set");

    if propagates {
        for child_id in tree.child_ids(entity_id)? {
            inherit_check(tree, &child_id, copy.clone())?;
        }
    }
    Ok(source_id)
}

/// Adopt an incoming inherited check copy and keep propagating
pub(crate) fn inherit_check(tree: &mut Tree, entity_id: &str, incoming: Check) -> Result<()> {
    let entity_kind = {
        let entity = tree.get(entity_id)?;
        // already carries this chain
        if entity
            .checks
            .values()
            .any(|c| c.source_id == incoming.source_id)
        {
            return Ok(());
        }
        entity.kind
    };

    let mut copy = incoming.clone();
    copy.id = Uuid::now_v7().to_string();
    let export = check_export(entity_id, &copy);
    {
        let entity = tree.get_mut(entity_id)?;
        entity.checks.insert(copy.id.clone(), copy);
        entity.touch();
    }
    tree.emit(ActionKind::CheckNew, entity_kind, entity_id, export);

    if entity_kind != EntityKind::Node {
        for child_id in tree.child_ids(entity_id)? {
            inherit_check(tree, &child_id, incoming.clone())?;
        }
    }
    Ok(())
}

/// Delete a check at its source
///
/// Cascades deletion along every inherited copy below; compiled instances
/// of the removed checks are reported deleted as well.
///
/// # Errors
/// `EntityNotFound` if the entity id is not in the arena.
pub fn delete_check(tree: &mut Tree, entity_id: &str, check_id: &str) -> Result<()> {
    let existing = tree.get(entity_id)?.checks.get(check_id).cloned();
    let Some(existing) = existing else {
        tree.fault(
            Fault::new(FaultKind::CheckNotFound)
                .with_entity_id(entity_id)
                .with_object_id(check_id),
        );
        return Ok(());
    };
    if existing.inherited {
        tree.fault(
            Fault::new(FaultKind::NotSourceInstance)
                .with_entity_id(entity_id)
                .with_object_id(check_id)
                .with_message("delete must target the source instance"),
        );
        return Ok(());
    }

    remove_check_local(tree, entity_id, &existing.id)?;
    for child_id in tree.child_ids(entity_id)? {
        delete_inherited_check_subtree(tree, &child_id, &existing.source_id)?;
    }
    Ok(())
}

/// Remove the inherited copy of a check chain from an entity and
/// everything below it
pub(crate) fn delete_inherited_check_subtree(
    tree: &mut Tree,
    entity_id: &str,
    source_id: &str,
) -> Result<()> {
    let located = tree
        .get(entity_id)?
        .checks
        .values()
        .find(|c| c.inherited && c.source_id == source_id)
        .map(|c| c.id.clone());
    let Some(copy_id) = located else {
        return Ok(());
    };

    remove_check_local(tree, entity_id, &copy_id)?;
    for child_id in tree.child_ids(entity_id)? {
        delete_inherited_check_subtree(tree, &child_id, source_id)?;
    }
    Ok(())
}

/// Drop one check from one entity, reporting its compiled instances as
/// deleted first
fn remove_check_local(tree: &mut Tree, entity_id: &str, check_id: &str) -> Result<()> {
    let (entity_kind, removed, instances) = {
        let entity = tree.get_mut(entity_id)?;
        let instances = entity.check_instances.remove(check_id).unwrap_or_default();
        entity.loaded_instances.remove(check_id);
        let removed = entity.checks.remove(check_id);
        entity.touch();
        (entity.kind, removed, instances)
    };
    for instance in &instances {
        tree.emit(
            ActionKind::CheckInstanceDelete,
            entity_kind,
            entity_id,
            serde_json::json!({ "object_id": entity_id, "instance": instance }),
        );
    }
    if let Some(removed) = removed {
        tree.emit(
            ActionKind::CheckRemoved,
            entity_kind,
            entity_id,
            check_export(entity_id, &removed),
        );
        tracing::debug!(entity_id, check_id, "check removed");
    }
    Ok(())
}

/// Push every inheritable check of the parent to a freshly attached
/// child, invoked once, synchronously, at attach time
pub(crate) fn sync_checks(tree: &mut Tree, parent_id: &str, child_id: &str) -> Result<()> {
    let mut copies: Vec<Check> = tree
        .get(parent_id)?
        .checks
        .values()
        .filter(|c| c.inheritance)
        .map(|c| c.child_copy())
        .collect();
    copies.sort_by(|a, b| a.source_id.cmp(&b.source_id));
    for copy in copies {
        inherit_check(tree, child_id, copy)?;
    }
    Ok(())
}
