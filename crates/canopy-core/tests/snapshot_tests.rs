//! Snapshot and Rollback Tests
//!
//! This test suite verifies arena snapshot semantics across structural
//! and configuration mutations.
//!
//! ## Scenarios Covered
//!
//! 1. Rollback restores structure, properties and instances
//! 2. Commit retains all mutations
//! 3. Single open snapshot at a time
//! 4. Outbound channels survive a rollback

mod common;

use canopy_core::{
    attach, compute_entity, destroy, set_check, set_property, ActionKind, ComputeMode, EntityKind,
    GroupSpec, ParentRef, TreeError,
};
use common::*;

#[test]
fn test_rollback_restores_structure_and_configuration() {
    let mut fixture = base_tree();
    set_property(&mut fixture.tree, &fixture.repo_id, custom_prop("team", "infra"))
        .unwrap()
        .unwrap();
    let check_id = set_check(&mut fixture.tree, &fixture.node_id, check_input(Vec::new())).unwrap();
    compute_entity(&mut fixture.tree, &fixture.node_id, ComputeMode::Update).unwrap();
    let before_len = fixture.tree.len();

    fixture.tree.begin().unwrap();

    // heavy mutation inside the snapshot
    destroy(&mut fixture.tree, &fixture.group_id).unwrap();
    let extra = fixture
        .tree
        .create_group(GroupSpec {
            id: uid(),
            name: "scratch".to_string(),
            bucket_id: fixture.bucket_id.clone(),
            team_id: uid(),
        })
        .unwrap();
    attach(
        &mut fixture.tree,
        &extra,
        &ParentRef::new(EntityKind::Bucket, fixture.bucket_id.clone()),
    )
    .unwrap();

    fixture.tree.rollback().unwrap();

    // structure, properties and compiled instances are back
    assert_eq!(fixture.tree.len(), before_len);
    assert!(fixture.tree.contains(&fixture.group_id));
    assert!(fixture.tree.contains(&fixture.node_id));
    assert!(!fixture.tree.contains(&extra));
    let node = fixture.tree.get(&fixture.node_id).unwrap();
    assert_eq!(node.parent.as_deref(), Some(fixture.group_id.as_str()));
    assert_eq!(node.properties.custom.len(), 1);
    assert_eq!(node.check_instances[&check_id].len(), 1);
}

#[test]
fn test_commit_retains_mutations() {
    let mut fixture = base_tree();
    fixture.tree.begin().unwrap();
    destroy(&mut fixture.tree, &fixture.group_id).unwrap();
    fixture.tree.commit().unwrap();

    assert!(!fixture.tree.contains(&fixture.group_id));
    assert!(!fixture.tree.contains(&fixture.node_id));
    assert!(!fixture.tree.in_snapshot());
}

#[test]
fn test_single_open_snapshot() {
    let mut fixture = base_tree();
    fixture.tree.begin().unwrap();
    assert!(matches!(fixture.tree.begin(), Err(TreeError::SnapshotAlreadyOpen)));
    fixture.tree.commit().unwrap();
    assert!(matches!(fixture.tree.commit(), Err(TreeError::NoSnapshotOpen)));
    assert!(matches!(fixture.tree.rollback(), Err(TreeError::NoSnapshotOpen)));
}

#[test]
fn test_channels_survive_rollback() {
    let mut fixture = base_tree();
    drain_actions(&fixture.channels);

    fixture.tree.begin().unwrap();
    destroy(&mut fixture.tree, &fixture.group_id).unwrap();
    fixture.tree.rollback().unwrap();

    // events emitted inside the rolled-back span stay on the queue
    assert!(!drain_actions(&fixture.channels).is_empty());

    // and post-rollback mutations still reach the same consumer
    set_property(&mut fixture.tree, &fixture.node_id, custom_prop("team", "infra"))
        .unwrap()
        .unwrap();
    let actions = drain_actions(&fixture.channels);
    assert!(actions.iter().any(|a| a.action == ActionKind::PropertyNew));
}
