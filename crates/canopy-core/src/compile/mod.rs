//! Check instance compiler
//!
//! Evaluates every applicable check of an entity against its native
//! attributes and currently held properties, expands service-bound checks
//! over the Cartesian product of multi-valued service configuration
//! attributes, and reconciles the result against prior instances so
//! identity survives recomputation: a matching identity hash reuses the
//! prior instance id and advances its version; anything unmatched is a
//! fresh instance (or, during startup reconciliation, fatal drift).

pub mod hash;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use canopy_core_types::{ConstraintKind, EntityKind};
use canopy_errors::{Result, TreeError};
use uuid::Uuid;

use crate::events::ActionKind;
use crate::model::{Check, CheckInstance, Entity, PropertyPayload};
use crate::tree::Tree;

/// Recomputation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeMode {
    /// Normal recompute against the previous computation's instances
    Update,
    /// Startup reconciliation against instances loaded from storage;
    /// any mismatch in either direction is fatal drift
    Startup,
}

/// Recompute check instances for an entity and its whole subtree
///
/// Instance materialization is restricted to Group, Cluster and Node;
/// Repository and Bucket hold checks purely as propagation sources.
///
/// # Errors
/// `LoadedInstanceMismatch` in startup mode on storage/tree drift.
pub fn compute_subtree(tree: &mut Tree, entity_id: &str, mode: ComputeMode) -> Result<()> {
    let kind = tree.get(entity_id)?.kind;
    if kind.holds_instances() {
        compute_entity(tree, entity_id, mode)?;
    }
    for child_id in tree.child_ids(entity_id)? {
        compute_subtree(tree, &child_id, mode)?;
    }
    Ok(())
}

/// Recompute check instances for one entity
pub fn compute_entity(tree: &mut Tree, entity_id: &str, mode: ComputeMode) -> Result<()> {
    let snapshot = tree.get(entity_id)?.clone();
    if !snapshot.kind.holds_instances() {
        return Ok(());
    }

    // prior pool: previous computation, or the startup load buffer
    let mut prior: HashMap<String, Vec<CheckInstance>> = {
        let entity = tree.get_mut(entity_id)?;
        match mode {
            ComputeMode::Update => std::mem::take(&mut entity.check_instances),
            ComputeMode::Startup => std::mem::take(&mut entity.loaded_instances),
        }
    };

    let mut checks: Vec<&Check> = snapshot.checks.values().collect();
    checks.sort_by(|a, b| a.id.cmp(&b.id));

    let mut next: HashMap<String, Vec<CheckInstance>> = HashMap::new();
    for check in checks {
        let pending = if check.compiles_on_holder() {
            evaluate_check(&snapshot, check)?
        } else {
            Vec::new()
        };
        let pool = prior.remove(&check.id).unwrap_or_default();
        let reconciled = reconcile(tree, entity_id, snapshot.kind, check, pending, pool, mode)?;
        if !reconciled.is_empty() {
            next.insert(check.id.clone(), reconciled);
        }
    }

    // instances whose check is gone (or no longer compiles here)
    for (check_id, stale) in prior {
        if mode == ComputeMode::Startup {
            return Err(TreeError::LoadedInstanceMismatch {
                entity_id: entity_id.to_string(),
                check_id,
                reason: "loaded instances remained unmatched".to_string(),
            });
        }
        for instance in stale {
            emit_instance(tree, entity_id, snapshot.kind, ActionKind::CheckInstanceDelete, &instance);
        }
    }

    let entity = tree.get_mut(entity_id)?;
    entity.check_instances = next;
    entity.touch();
    Ok(())
}

/// One computed-but-unreconciled instance
struct Pending {
    constraint_hash: String,
    constraint_val_hash: String,
    instance_svc_cfg_hash: String,
    matched_native: BTreeMap<String, String>,
    matched_system: BTreeMap<String, String>,
    matched_custom: BTreeMap<String, String>,
    matched_oncall: BTreeMap<String, String>,
    matched_attributes: BTreeMap<String, String>,
    instance_service: String,
    instance_service_config: BTreeMap<String, String>,
}

/// One service property surviving service/attribute evaluation
struct ServiceBinding {
    name: String,
    /// attribute name → distinct values (pinned names collapsed to one)
    values: BTreeMap<String, BTreeSet<String>>,
}

/// Evaluate a check's constraints against one entity
///
/// Policy: any broken native/system/custom/oncall constraint drops the
/// check entirely for this entity. Broken service/attribute combinations
/// drop just that service.
fn evaluate_check(entity: &Entity, check: &Check) -> Result<Vec<Pending>> {
    let mut matched_ids: Vec<String> = Vec::new();
    let mut matched_vals: Vec<(String, String)> = Vec::new();
    let mut matched_native = BTreeMap::new();
    let mut matched_system = BTreeMap::new();
    let mut matched_custom = BTreeMap::new();
    let mut matched_oncall = BTreeMap::new();

    let mut service_constraints = Vec::new();
    let mut attribute_constraints = Vec::new();

    for constraint in &check.constraints {
        match constraint.kind {
            ConstraintKind::Native => {
                let actual = match constraint.key.as_str() {
                    "environment" => entity.environment.clone(),
                    "object_type" => entity.kind.as_str().to_string(),
                    "object_state" => entity.state.as_str().to_string(),
                    _ => return Ok(Vec::new()),
                };
                if actual != constraint.value {
                    return Ok(Vec::new());
                }
                matched_native.insert(constraint.key.clone(), actual);
                matched_ids.push(constraint.ident());
                matched_vals.push((constraint.ident(), constraint.value.clone()));
            }
            ConstraintKind::System | ConstraintKind::Custom | ConstraintKind::Oncall => {
                let kind = match constraint.kind {
                    ConstraintKind::System => canopy_core_types::PropertyKind::System,
                    ConstraintKind::Custom => canopy_core_types::PropertyKind::Custom,
                    _ => canopy_core_types::PropertyKind::Oncall,
                };
                let hit = entity
                    .properties
                    .map(kind)
                    .values()
                    .filter(|p| p.applies_to_holder() && p.view.matches(&check.view))
                    .find_map(|p| match &p.payload {
                        PropertyPayload::System { key, value }
                        | PropertyPayload::Custom { key, value } => {
                            (*key == constraint.key && *value == constraint.value)
                                .then(|| value.clone())
                        }
                        PropertyPayload::Oncall { name, number } => (*name == constraint.key
                            && (constraint.value.is_empty() || *number == constraint.value))
                            .then(|| number.clone()),
                        PropertyPayload::Service { .. } => None,
                    });
                let Some(value) = hit else {
                    return Ok(Vec::new());
                };
                match constraint.kind {
                    ConstraintKind::System => matched_system.insert(constraint.key.clone(), value.clone()),
                    ConstraintKind::Custom => matched_custom.insert(constraint.key.clone(), value.clone()),
                    _ => matched_oncall.insert(constraint.key.clone(), value.clone()),
                };
                matched_ids.push(constraint.ident());
                matched_vals.push((constraint.ident(), value));
            }
            ConstraintKind::Service => service_constraints.push(constraint),
            ConstraintKind::Attribute => attribute_constraints.push(constraint),
        }
    }

    let service_scoped = !service_constraints.is_empty() || !attribute_constraints.is_empty();
    let mut bindings: Vec<ServiceBinding> = Vec::new();
    let mut matched_attributes: BTreeMap<String, String> = BTreeMap::new();

    if service_scoped {
        let candidates: Vec<_> = entity
            .properties
            .service
            .values()
            .filter(|p| p.applies_to_holder() && p.view.matches(&check.view))
            .filter(|p| {
                if service_constraints.is_empty() {
                    // no service constraint: pull in every service that
                    // independently satisfies all attribute constraints
                    true
                } else {
                    service_constraints.iter().any(|c| match &p.payload {
                        PropertyPayload::Service { name, .. } => *name == c.value,
                        _ => false,
                    })
                }
            })
            .collect();

        for property in candidates {
            let PropertyPayload::Service { name, attributes } = &property.payload else {
                continue;
            };
            // every attribute constraint must hold on this service
            let satisfies = attribute_constraints.iter().all(|c| {
                attributes
                    .iter()
                    .any(|a| a.name == c.key && a.value == c.value)
            });
            if !satisfies {
                // broken service/attribute combination: drop this service
                continue;
            }

            let mut values: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for attribute in attributes {
                values
                    .entry(attribute.name.clone())
                    .or_default()
                    .insert(attribute.value.clone());
            }
            // pinned attributes collapse to the constrained value
            for c in &attribute_constraints {
                values.insert(c.key.clone(), BTreeSet::from([c.value.clone()]));
            }
            bindings.push(ServiceBinding {
                name: name.clone(),
                values,
            });
        }

        if !bindings.is_empty() {
            for c in &service_constraints {
                matched_ids.push(c.ident());
                matched_vals.push((c.ident(), c.value.clone()));
            }
            for c in &attribute_constraints {
                matched_ids.push(c.ident());
                matched_vals.push((c.ident(), c.value.clone()));
                matched_attributes.insert(c.key.clone(), c.value.clone());
            }
        }
        bindings.sort_by(|a, b| a.name.cmp(&b.name));
    }

    let constraint_hash = hash::constraint_hash(&check.id, &matched_ids)?;
    let constraint_val_hash = hash::constraint_val_hash(&check.id, &matched_vals)?;

    if !service_scoped {
        // exactly one instance
        return Ok(vec![Pending {
            constraint_hash,
            constraint_val_hash,
            instance_svc_cfg_hash: String::new(),
            matched_native,
            matched_system,
            matched_custom,
            matched_oncall,
            matched_attributes,
            instance_service: String::new(),
            instance_service_config: BTreeMap::new(),
        }]);
    }

    // one instance per service per configuration permutation
    let mut pending = Vec::new();
    for binding in &bindings {
        for assignment in cartesian(&binding.values) {
            let instance_svc_cfg_hash =
                hash::svc_cfg_hash(&check.id, &binding.name, &assignment)?;
            pending.push(Pending {
                constraint_hash: constraint_hash.clone(),
                constraint_val_hash: constraint_val_hash.clone(),
                instance_svc_cfg_hash,
                matched_native: matched_native.clone(),
                matched_system: matched_system.clone(),
                matched_custom: matched_custom.clone(),
                matched_oncall: matched_oncall.clone(),
                matched_attributes: matched_attributes.clone(),
                instance_service: binding.name.clone(),
                instance_service_config: assignment,
            });
        }
    }
    Ok(pending)
}

/// Full Cartesian product over the multi-valued attribute sets
fn cartesian(values: &BTreeMap<String, BTreeSet<String>>) -> Vec<BTreeMap<String, String>> {
    let mut combinations: Vec<BTreeMap<String, String>> = vec![BTreeMap::new()];
    for (name, set) in values {
        let mut expanded = Vec::with_capacity(combinations.len() * set.len());
        for combination in &combinations {
            for value in set {
                let mut next = combination.clone();
                next.insert(name.clone(), value.clone());
                expanded.push(next);
            }
        }
        combinations = expanded;
    }
    combinations
}

/// Match computed instances against the prior pool
///
/// A hash match reuses the prior instance id and increments its version;
/// no match allocates a fresh id at version 0 (fatal in startup mode).
/// Prior instances with no match in the new set are reported deleted
/// (also fatal in startup mode).
fn reconcile(
    tree: &Tree,
    entity_id: &str,
    entity_kind: EntityKind,
    check: &Check,
    pending: Vec<Pending>,
    mut pool: Vec<CheckInstance>,
    mode: ComputeMode,
) -> Result<Vec<CheckInstance>> {
    let mut out = Vec::with_capacity(pending.len());
    for p in pending {
        let identity = if p.instance_svc_cfg_hash.is_empty() {
            p.constraint_hash.clone()
        } else {
            p.instance_svc_cfg_hash.clone()
        };
        let matched = pool
            .iter()
            .position(|prior| prior.identity_hash() == identity);

        let (instance_id, version, action) = match matched {
            Some(pos) => {
                let prior = pool.remove(pos);
                (
                    prior.instance_id,
                    prior.version + 1,
                    ActionKind::CheckInstanceUpdate,
                )
            }
            None => {
                if mode == ComputeMode::Startup {
                    return Err(TreeError::LoadedInstanceMismatch {
                        entity_id: entity_id.to_string(),
                        check_id: check.id.clone(),
                        reason: "computed instance has no loaded counterpart".to_string(),
                    });
                }
                (
                    Uuid::now_v7().to_string(),
                    0,
                    ActionKind::CheckInstanceCreate,
                )
            }
        };

        let instance = CheckInstance {
            instance_id,
            check_id: check.id.clone(),
            config_id: check.config_id.clone(),
            version,
            constraint_hash: p.constraint_hash,
            constraint_val_hash: p.constraint_val_hash,
            instance_svc_cfg_hash: p.instance_svc_cfg_hash,
            matched_native: p.matched_native,
            matched_system: p.matched_system,
            matched_custom: p.matched_custom,
            matched_oncall: p.matched_oncall,
            matched_attributes: p.matched_attributes,
            instance_service: p.instance_service,
            instance_service_config: p.instance_service_config,
        };
        emit_instance(tree, entity_id, entity_kind, action, &instance);
        out.push(instance);
    }

    if !pool.is_empty() && mode == ComputeMode::Startup {
        return Err(TreeError::LoadedInstanceMismatch {
            entity_id: entity_id.to_string(),
            check_id: check.id.clone(),
            reason: "loaded instances remained unmatched".to_string(),
        });
    }
    for stale in pool {
        emit_instance(tree, entity_id, entity_kind, ActionKind::CheckInstanceDelete, &stale);
    }
    Ok(out)
}

fn emit_instance(
    tree: &Tree,
    entity_id: &str,
    entity_kind: EntityKind,
    action: ActionKind,
    instance: &CheckInstance,
) {
    tree.emit(
        action,
        entity_kind,
        entity_id,
        serde_json::json!({ "object_id": entity_id, "instance": instance }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cartesian_expansion() {
        let mut values = BTreeMap::new();
        values.insert(
            "mode".to_string(),
            BTreeSet::from(["ro".to_string(), "rw".to_string()]),
        );
        values.insert(
            "path".to_string(),
            BTreeSet::from(["/var/log".to_string(), "/var/tmp".to_string()]),
        );
        let combos = cartesian(&values);
        assert_eq!(combos.len(), 4);
    }

    #[test]
    fn test_cartesian_pinned_single_value() {
        let mut values = BTreeMap::new();
        values.insert("mode".to_string(), BTreeSet::from(["ro".to_string(), "rw".to_string()]));
        values.insert("path".to_string(), BTreeSet::from(["/var/log".to_string()]));
        let combos = cartesian(&values);
        assert_eq!(combos.len(), 2);
        assert!(combos.iter().all(|c| c["path"] == "/var/log"));
    }

    #[test]
    fn test_cartesian_empty_is_single_empty_assignment() {
        let combos = cartesian(&BTreeMap::new());
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }
}
