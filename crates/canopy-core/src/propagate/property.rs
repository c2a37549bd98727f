//! Property inheritance engine
//!
//! Setting an inheritable property on an entity clones it to every
//! current child as an inherited copy, which keeps propagating down until
//! a descendant turns out to be the source of a duplicate ("shadowing"):
//! propagation halts there silently. Updates are applied at the source
//! and routed downward along existing copies by source-instance id;
//! deletes cascade along the same chain.
//!
//! Duplicate rule: Custom/Service/Oncall duplicate on exact key (or
//! service name); System special-cases `tag`, where key and value both
//! must match. A duplicate on Set is a recoverable fault, never an error.

use canopy_core_types::{EntityKind, PropertyKind};
use canopy_errors::{Fault, FaultKind, Result};
use uuid::Uuid;

use crate::events::ActionKind;
use crate::model::{Property, PropertyInput};
use crate::tree::Tree;

fn property_export(entity_id: &str, property: &Property) -> serde_json::Value {
    serde_json::json!({ "object_id": entity_id, "property": property })
}

/// Set a new property on an entity
///
/// Returns the source instance id, or `None` if the set was abandoned as
/// a duplicate (recorded on the fault queue). With `inheritance` enabled
/// the property fans out to the current subtree.
///
/// # Errors
/// `EntityNotFound` if the entity id is not in the arena.
pub fn set_property(
    tree: &mut Tree,
    entity_id: &str,
    input: PropertyInput,
) -> Result<Option<String>> {
    let kind = input.payload.kind();
    let owner_kind = tree.get(entity_id)?.kind;

    let duplicate = tree
        .get(entity_id)?
        .properties
        .map(kind)
        .values()
        .any(|p| p.payload.duplicates(&input.payload));
    if duplicate {
        tree.fault(
            Fault::new(FaultKind::DuplicateProperty)
                .with_entity_id(entity_id)
                .with_property_kind(kind)
                .with_message(format!(
                    "duplicate {} property '{}'",
                    kind,
                    input.payload.dedup_key()
                )),
        );
        return Ok(None);
    }

    let source = input.into_source(entity_id, owner_kind);
    let source_id = source.id.clone();
    let propagates = source.inheritance;
    let copy = source.child_copy();

    let export = property_export(entity_id, &source);
    {
        let entity = tree.get_mut(entity_id)?;
        entity.properties.map_mut(kind).insert(source_id.clone(), source);
        entity.touch();
    }
    tree.emit(ActionKind::PropertyNew, owner_kind, entity_id, export);
    tracing::debug!(entity_id, property_id = %source_id, kind = kind.as_str(), "property set");

    if propagates {
        for child_id in tree.child_ids(entity_id)? {
            inherit_property(tree, &child_id, copy.clone())?;
        }
    }
    Ok(Some(source_id))
}

/// Adopt an incoming inherited copy and keep propagating
///
/// The receiving entity either tracks the copy under a fresh id (or one
/// recovered from the hint list) and pushes on to its own children, or
/// detects that it is itself the source of a duplicate and silently halts
/// the chain there. Nodes adopt but never propagate further.
pub(crate) fn inherit_property(
    tree: &mut Tree,
    entity_id: &str,
    incoming: Property,
) -> Result<()> {
    let kind = incoming.payload.kind();
    let entity_kind = {
        let entity = tree.get(entity_id)?;

        // shadowed: this entity sources an equal property
        let shadowed = entity
            .properties
            .map(kind)
            .values()
            .any(|p| !p.inherited && p.payload.duplicates(&incoming.payload));
        if shadowed {
            tracing::debug!(entity_id, kind = kind.as_str(), "propagation shadowed");
            return Ok(());
        }
        // already carries this chain
        if entity
            .properties
            .map(kind)
            .values()
            .any(|p| p.source_id == incoming.source_id)
        {
            return Ok(());
        }
        entity.kind
    };

    let mut copy = incoming.clone();
    copy.id = incoming
        .hinted_instance_id(entity_id)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string());
    let export = property_export(entity_id, &copy);
    {
        let entity = tree.get_mut(entity_id)?;
        entity
            .properties
            .map_mut(kind)
            .insert(copy.id.clone(), copy);
        entity.touch();
    }
    tree.emit(ActionKind::PropertyNew, entity_kind, entity_id, export);

    if entity_kind != EntityKind::Node {
        for child_id in tree.child_ids(entity_id)? {
            inherit_property(tree, &child_id, incoming.clone())?;
        }
    }
    Ok(())
}

/// Update a property at its source
///
/// Only the source instance may be updated; requests against an inherited
/// copy or a missing id are recoverable faults. The re-derived update is
/// routed to children where a matching inherited copy is located by
/// source id; where none is found the chain was shadowed and routing
/// stops silently. Flipping inheritance off cascades a delete of all
/// copies; flipping it on triggers a fresh downward push.
///
/// # Errors
/// `EntityNotFound` if the entity id is not in the arena.
pub fn update_property(
    tree: &mut Tree,
    entity_id: &str,
    property_id: &str,
    input: PropertyInput,
) -> Result<()> {
    let kind = input.payload.kind();
    let existing = tree
        .get(entity_id)?
        .properties
        .map(kind)
        .get(property_id)
        .cloned();
    let Some(existing) = existing else {
        tree.fault(
            Fault::new(FaultKind::PropertyNotFound)
                .with_entity_id(entity_id)
                .with_object_id(property_id)
                .with_property_kind(kind),
        );
        return Ok(());
    };
    if existing.inherited {
        tree.fault(
            Fault::new(FaultKind::NotSourceInstance)
                .with_entity_id(entity_id)
                .with_object_id(property_id)
                .with_message("update must target the source instance"),
        );
        return Ok(());
    }

    let was_inheriting = existing.inheritance;
    let mut updated = existing;
    updated.payload = input.payload;
    updated.view = input.view;
    updated.children_only = input.children_only;
    updated.inheritance = input.inheritance;
    if !input.instances.is_empty() {
        updated.instances = input.instances;
    }
    let now_inheriting = updated.inheritance;
    let source_id = updated.source_id.clone();
    let copy = updated.child_copy();

    let entity_kind = {
        let entity = tree.get_mut(entity_id)?;
        entity
            .properties
            .map_mut(kind)
            .insert(property_id.to_string(), updated.clone());
        entity.touch();
        entity.kind
    };
    tree.emit(
        ActionKind::PropertyUpdate,
        entity_kind,
        entity_id,
        property_export(entity_id, &updated),
    );

    match (was_inheriting, now_inheriting) {
        (true, true) => {
            for child_id in tree.child_ids(entity_id)? {
                switch_property(tree, &child_id, &copy)?;
            }
        }
        (false, true) => {
            for child_id in tree.child_ids(entity_id)? {
                inherit_property(tree, &child_id, copy.clone())?;
            }
        }
        (true, false) => {
            for child_id in tree.child_ids(entity_id)? {
                delete_inherited_subtree(tree, &child_id, kind, &source_id)?;
            }
        }
        (false, false) => {}
    }
    Ok(())
}

/// Route an update along existing inherited copies
fn switch_property(tree: &mut Tree, entity_id: &str, incoming: &Property) -> Result<()> {
    let kind = incoming.payload.kind();
    let located = tree
        .get(entity_id)?
        .properties
        .map(kind)
        .values()
        .find(|p| p.inherited && p.source_id == incoming.source_id)
        .map(|p| p.id.clone());
    // no copy here: the chain was shadowed, stop without error
    let Some(copy_id) = located else {
        return Ok(());
    };

    let (entity_kind, export) = {
        let entity = tree.get_mut(entity_id)?;
        let entity_kind = entity.kind;
        let map = entity.properties.map_mut(kind);
        let Some(copy) = map.get_mut(&copy_id) else {
            return Ok(());
        };
        copy.payload = incoming.payload.clone();
        copy.view = incoming.view.clone();
        copy.children_only = incoming.children_only;
        copy.inheritance = incoming.inheritance;
        let export = property_export(entity_id, copy);
        entity.touch();
        (entity_kind, export)
    };
    tree.emit(ActionKind::PropertyUpdate, entity_kind, entity_id, export);

    if entity_kind != EntityKind::Node {
        for child_id in tree.child_ids(entity_id)? {
            switch_property(tree, &child_id, incoming)?;
        }
    }
    Ok(())
}

/// Delete a property at its source
///
/// Cascades deletion along every inherited copy below. If the deleted
/// property was itself shadowing an ancestor's inheritable property, that
/// property is explicitly resynced from the parent, since normal downward
/// propagation was halted while the shadow existed.
///
/// # Errors
/// `EntityNotFound` if the entity id is not in the arena.
pub fn delete_property(
    tree: &mut Tree,
    entity_id: &str,
    kind: PropertyKind,
    property_id: &str,
) -> Result<()> {
    let existing = tree
        .get(entity_id)?
        .properties
        .map(kind)
        .get(property_id)
        .cloned();
    let Some(existing) = existing else {
        tree.fault(
            Fault::new(FaultKind::PropertyNotFound)
                .with_entity_id(entity_id)
                .with_object_id(property_id)
                .with_property_kind(kind),
        );
        return Ok(());
    };
    if existing.inherited {
        tree.fault(
            Fault::new(FaultKind::NotSourceInstance)
                .with_entity_id(entity_id)
                .with_object_id(property_id)
                .with_message("delete must target the source instance"),
        );
        return Ok(());
    }

    let entity_kind = {
        let entity = tree.get_mut(entity_id)?;
        entity.properties.map_mut(kind).remove(property_id);
        entity.touch();
        entity.kind
    };
    tree.emit(
        ActionKind::PropertyDelete,
        entity_kind,
        entity_id,
        property_export(entity_id, &existing),
    );
    tracing::debug!(entity_id, property_id, kind = kind.as_str(), "property deleted");

    for child_id in tree.child_ids(entity_id)? {
        delete_inherited_subtree(tree, &child_id, kind, &existing.source_id)?;
    }

    resync_from_parent(tree, entity_id, &existing)
}

/// Remove the inherited copy of a chain from an entity and everything
/// below it. Recursion stops where no copy exists: the chain never
/// propagated past a shadow.
pub(crate) fn delete_inherited_subtree(
    tree: &mut Tree,
    entity_id: &str,
    kind: PropertyKind,
    source_id: &str,
) -> Result<()> {
    let located = tree
        .get(entity_id)?
        .properties
        .map(kind)
        .values()
        .find(|p| p.inherited && p.source_id == source_id)
        .map(|p| p.id.clone());
    let Some(copy_id) = located else {
        return Ok(());
    };

    let (entity_kind, removed) = {
        let entity = tree.get_mut(entity_id)?;
        let removed = entity.properties.map_mut(kind).remove(&copy_id);
        entity.touch();
        (entity.kind, removed)
    };
    if let Some(removed) = removed {
        tree.emit(
            ActionKind::PropertyDelete,
            entity_kind,
            entity_id,
            property_export(entity_id, &removed),
        );
    }
    for child_id in tree.child_ids(entity_id)? {
        delete_inherited_subtree(tree, &child_id, kind, source_id)?;
    }
    Ok(())
}

/// Ask the parent to resync a property the deleted shadow was suppressing
fn resync_from_parent(tree: &mut Tree, entity_id: &str, deleted: &Property) -> Result<()> {
    let Some(parent_id) = tree.get(entity_id)?.parent.clone() else {
        return Ok(());
    };
    let kind = deleted.payload.kind();
    let uncovered = tree
        .get(&parent_id)?
        .properties
        .map(kind)
        .values()
        .find(|p| p.inheritance && p.payload.duplicates(&deleted.payload))
        .map(|p| p.child_copy());
    if let Some(copy) = uncovered {
        tracing::debug!(entity_id, parent_id = %parent_id, "resyncing uncovered property");
        inherit_property(tree, entity_id, copy)?;
    }
    Ok(())
}

/// Push every inheritable property of the parent to a freshly attached
/// child, invoked once, synchronously, at attach time
pub(crate) fn sync_properties(tree: &mut Tree, parent_id: &str, child_id: &str) -> Result<()> {
    let copies: Vec<Property> = tree
        .get(parent_id)?
        .properties
        .iter_sorted()
        .into_iter()
        .filter(|p| p.inheritance)
        .map(|p| p.child_copy())
        .collect();
    for copy in copies {
        inherit_property(tree, child_id, copy)?;
    }
    Ok(())
}
