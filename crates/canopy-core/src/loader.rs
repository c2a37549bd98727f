//! Startup replay from persisted state
//!
//! The core performs no I/O; the embedding layer reads storage and
//! replays it here. Properties and checks are replayed through the same
//! propagation paths as live mutations, with two id-recovery twists:
//! the stored source id is reinstated verbatim, and inherited copies
//! recover their prior ids through the hint lists on the inputs. Stored
//! check instances go into a transient per-entity buffer; the instance
//! compiler in startup mode must then reproduce them exactly, and any
//! mismatch in either direction aborts startup.

use canopy_errors::{Result, TreeError};
use tracing::info;

use crate::compile::{self, ComputeMode};
use crate::events::ActionKind;
use crate::model::{CheckInput, CheckInstance, PropertyInput};
use crate::propagate::{check, property};
use crate::tree::Tree;

/// One stored property chain to replay
#[derive(Debug, Clone)]
pub struct PropertyRecord {
    /// Stored id of the source instance
    pub property_id: String,
    /// Payload and flags, hint list populated from storage
    pub input: PropertyInput,
}

/// One stored check chain to replay
#[derive(Debug, Clone)]
pub struct CheckRecord {
    /// Stored id of the source instance
    pub check_id: String,
    pub input: CheckInput,
}

/// Replay a stored property onto its owning entity
///
/// Identical to a live set except the source keeps its stored id.
/// Returns `None` if the replay was abandoned as a duplicate, which on
/// startup indicates inconsistent storage and lands on the fault queue.
///
/// # Errors
/// `EntityNotFound` if the owning entity is not in the arena.
pub fn load_property(
    tree: &mut Tree,
    entity_id: &str,
    record: PropertyRecord,
) -> Result<Option<String>> {
    let owner_kind = tree.get(entity_id)?.kind;
    let kind = record.input.payload.kind();

    let duplicate = tree
        .get(entity_id)?
        .properties
        .map(kind)
        .values()
        .any(|p| p.payload.duplicates(&record.input.payload));
    if duplicate {
        tree.fault(
            canopy_errors::Fault::new(canopy_errors::FaultKind::DuplicateProperty)
                .with_entity_id(entity_id)
                .with_property_kind(kind)
                .with_message("stored property duplicates a loaded one"),
        );
        return Ok(None);
    }

    let mut source = record.input.into_source(entity_id, owner_kind);
    source.id = record.property_id.clone();
    source.source_id = record.property_id.clone();
    let propagates = source.inheritance;
    let copy = source.child_copy();

    let export = serde_json::json!({ "object_id": entity_id, "property": &source });
    {
        let entity = tree.get_mut(entity_id)?;
        entity
            .properties
            .map_mut(kind)
            .insert(source.id.clone(), source);
        entity.touch();
    }
    tree.emit(ActionKind::PropertyNew, owner_kind, entity_id, export);

    if propagates {
        for child_id in tree.child_ids(entity_id)? {
            property::inherit_property(tree, &child_id, copy.clone())?;
        }
    }
    Ok(Some(record.property_id))
}

/// Replay a stored check onto its owning entity
///
/// # Errors
/// `EntityNotFound` if the owning entity is not in the arena.
pub fn load_check(tree: &mut Tree, entity_id: &str, record: CheckRecord) -> Result<String> {
    let owner_kind = tree.get(entity_id)?.kind;

    let mut source = record.input.into_source(entity_id, owner_kind);
    source.id = record.check_id.clone();
    source.source_id = record.check_id.clone();
    let propagates = source.inheritance;
    let copy = source.child_copy();

    let export = serde_json::json!({ "object_id": entity_id, "check": &source });
    {
        let entity = tree.get_mut(entity_id)?;
        entity.checks.insert(source.id.clone(), source);
        entity.touch();
    }
    tree.emit(ActionKind::CheckNew, owner_kind, entity_id, export);

    if propagates {
        for child_id in tree.child_ids(entity_id)? {
            check::inherit_check(tree, &child_id, copy.clone())?;
        }
    }
    Ok(record.check_id)
}

/// Buffer stored check instances for startup reconciliation
///
/// The instances are not live yet; they only become live when the
/// startup compute matches each of them by identity hash.
///
/// # Errors
/// `EntityNotFound` if the owning entity is not in the arena.
pub fn load_instances(
    tree: &mut Tree,
    entity_id: &str,
    check_id: &str,
    instances: Vec<CheckInstance>,
) -> Result<()> {
    let entity = tree.get_mut(entity_id)?;
    entity
        .loaded_instances
        .entry(check_id.to_string())
        .or_default()
        .extend(instances);
    Ok(())
}

/// Run the startup compute over the whole tree and verify the loaded
/// buffers fully drained
///
/// # Errors
/// `LoadedInstanceMismatch` on any drift between storage and the
/// recomputed tree, with the tree left unusable for serving.
pub fn startup_compute(tree: &mut Tree) -> Result<()> {
    let root_id = tree.root_id().to_string();
    compile::compute_subtree(tree, &root_id, ComputeMode::Startup)?;
    verify_loaded_drained(tree)?;
    info!(entities = tree.len(), "startup reconciliation complete");
    Ok(())
}

/// Any loaded instance left in a buffer after the startup compute is
/// storage drift: an instance was persisted for a combination the tree
/// no longer produces.
pub fn verify_loaded_drained(tree: &Tree) -> Result<()> {
    let mut ids: Vec<&String> = tree.entities.keys().collect();
    ids.sort_unstable();
    for id in ids {
        let entity = &tree.entities[id];
        if let Some((check_id, _)) = entity
            .loaded_instances
            .iter()
            .find(|(_, instances)| !instances.is_empty())
        {
            return Err(TreeError::LoadedInstanceMismatch {
                entity_id: entity.id.clone(),
                check_id: check_id.clone(),
                reason: "loaded instances remained unmatched".to_string(),
            });
        }
    }
    Ok(())
}
