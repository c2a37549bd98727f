use canopy_core::{
    attach, Action, BucketSpec, CheckInput, Constraint, ConstraintKind, EntityKind, GroupSpec,
    NodeSpec, ParentRef, PropertyInput, PropertyPayload, RepositorySpec, ServiceAttribute,
    Threshold, Tree, TreeChannels, View,
};
use uuid::Uuid;

/// Generate a fresh entity id
#[allow(dead_code)]
pub fn uid() -> String {
    Uuid::now_v7().to_string()
}

/// A tree with one attached path root → repository → bucket → group → node
#[allow(dead_code)]
pub struct Fixture {
    pub tree: Tree,
    pub channels: TreeChannels,
    pub repo_id: String,
    pub bucket_id: String,
    pub group_id: String,
    pub node_id: String,
}

/// Build the standard fixture used across the suites
///
/// The bucket carries environment "production", which groups and nodes
/// inherit at attach time.
#[allow(dead_code)]
pub fn base_tree() -> Fixture {
    let (mut tree, channels) = Tree::new("canopy-test");
    let root_id = tree.root_id().to_string();
    let team_id = uid();

    let repo_id = tree
        .create_repository(RepositorySpec {
            id: uid(),
            name: "production".to_string(),
            team_id: team_id.clone(),
        })
        .unwrap();
    attach(&mut tree, &repo_id, &ParentRef::new(EntityKind::Root, root_id)).unwrap();

    let bucket_id = tree
        .create_bucket(BucketSpec {
            id: uid(),
            name: "prod-eu".to_string(),
            environment: "production".to_string(),
            team_id: team_id.clone(),
            repository_id: repo_id.clone(),
        })
        .unwrap();
    attach(
        &mut tree,
        &bucket_id,
        &ParentRef::new(EntityKind::Repository, repo_id.clone()),
    )
    .unwrap();

    let group_id = tree
        .create_group(GroupSpec {
            id: uid(),
            name: "web".to_string(),
            team_id: team_id.clone(),
            bucket_id: bucket_id.clone(),
        })
        .unwrap();
    attach(
        &mut tree,
        &group_id,
        &ParentRef::new(EntityKind::Bucket, bucket_id.clone()),
    )
    .unwrap();

    let node_id = tree
        .create_node(NodeSpec {
            id: uid(),
            name: "web-01".to_string(),
            team_id,
            asset_id: 4711,
            server_id: uid(),
            online: true,
        })
        .unwrap();
    attach(
        &mut tree,
        &node_id,
        &ParentRef::new(EntityKind::Group, group_id.clone()),
    )
    .unwrap();

    Fixture {
        tree,
        channels,
        repo_id,
        bucket_id,
        group_id,
        node_id,
    }
}

/// Drain all pending action events
#[allow(dead_code)]
pub fn drain_actions(channels: &TreeChannels) -> Vec<Action> {
    let mut out = Vec::new();
    while let Ok(action) = channels.actions.try_recv() {
        out.push(action);
    }
    out
}

/// Inheritable custom property input
#[allow(dead_code)]
pub fn custom_prop(key: &str, value: &str) -> PropertyInput {
    PropertyInput {
        payload: PropertyPayload::Custom {
            key: key.to_string(),
            value: value.to_string(),
        },
        view: View::any(),
        inheritance: true,
        children_only: false,
        instances: Vec::new(),
    }
}

/// Inheritable system property input
#[allow(dead_code)]
pub fn system_prop(key: &str, value: &str) -> PropertyInput {
    PropertyInput {
        payload: PropertyPayload::System {
            key: key.to_string(),
            value: value.to_string(),
        },
        view: View::any(),
        inheritance: true,
        children_only: false,
        instances: Vec::new(),
    }
}

/// Inheritable service property input with (name, value) attributes
#[allow(dead_code)]
pub fn service_prop(name: &str, attributes: &[(&str, &str)]) -> PropertyInput {
    PropertyInput {
        payload: PropertyPayload::Service {
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(n, v)| ServiceAttribute {
                    name: n.to_string(),
                    value: v.to_string(),
                })
                .collect(),
        },
        view: View::any(),
        inheritance: true,
        children_only: false,
        instances: Vec::new(),
    }
}

/// Inheritable check input with the given constraints
#[allow(dead_code)]
pub fn check_input(constraints: Vec<Constraint>) -> CheckInput {
    CheckInput {
        capability_id: "cap-generic".to_string(),
        config_id: uid(),
        view: View::any(),
        inheritance: true,
        children_only: false,
        interval: 60,
        thresholds: vec![Threshold {
            predicate: ">=".to_string(),
            level: 3,
            value: 500,
        }],
        constraints,
    }
}

/// Shorthand constraint constructor
#[allow(dead_code)]
pub fn constraint(kind: ConstraintKind, key: &str, value: &str) -> Constraint {
    Constraint {
        kind,
        key: key.to_string(),
        value: value.to_string(),
    }
}
