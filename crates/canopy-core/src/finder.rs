//! Entity lookup by id and by name
//!
//! Lookups never panic and never return sentinel objects: a miss is an
//! explicit [`FindOutcome`]. The faulting variants additionally record
//! the miss on the tree's fault queue for the alerting layer.

use canopy_core_types::EntityKind;
use canopy_errors::{Fault, FaultKind};

use crate::tree::Tree;

/// Outcome of a finder query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindOutcome {
    /// Exactly one entity matched
    One(String),
    NotFound,
    /// More than one entity matched a name query; sorted matching ids
    Ambiguous(Vec<String>),
}

impl FindOutcome {
    /// The single matched id, if the outcome is unambiguous
    pub fn into_option(self) -> Option<String> {
        match self {
            FindOutcome::One(id) => Some(id),
            _ => None,
        }
    }
}

/// Look an entity up by id
pub fn by_id(tree: &Tree, id: &str) -> FindOutcome {
    if tree.contains(id) {
        FindOutcome::One(id.to_string())
    } else {
        FindOutcome::NotFound
    }
}

/// Look entities up by name, optionally restricted to a kind
///
/// Names are not unique across the tree, so a name query can be
/// ambiguous; matching ids come back sorted.
pub fn by_name(tree: &Tree, kind: Option<EntityKind>, name: &str) -> FindOutcome {
    let mut matches: Vec<String> = tree
        .entities
        .values()
        .filter(|e| e.name == name && kind.map_or(true, |k| e.kind == k))
        .map(|e| e.id.clone())
        .collect();
    matches.sort_unstable();
    match matches.len() {
        0 => FindOutcome::NotFound,
        1 => FindOutcome::One(matches.remove(0)),
        _ => FindOutcome::Ambiguous(matches),
    }
}

/// Name lookup that records misses and ambiguity on the fault queue
pub fn resolve(tree: &Tree, kind: Option<EntityKind>, name: &str) -> FindOutcome {
    let outcome = by_name(tree, kind, name);
    match &outcome {
        FindOutcome::NotFound => {
            tree.fault(
                Fault::new(FaultKind::FindNotFound)
                    .with_message(format!("no entity named '{name}'")),
            );
        }
        FindOutcome::Ambiguous(ids) => {
            tree.fault(Fault::new(FaultKind::FindAmbiguous).with_message(format!(
                "{} entities named '{name}'",
                ids.len()
            )));
        }
        FindOutcome::One(_) => {}
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepositorySpec;
    use canopy_errors::FaultKind;

    const ID_A: &str = "018f3c2e-1111-7def-8000-000000000001";
    const ID_B: &str = "018f3c2e-1111-7def-8000-000000000002";
    const TEAM: &str = "018f3c2e-2222-7def-8000-000000000003";

    fn repo(id: &str, name: &str) -> RepositorySpec {
        RepositorySpec {
            id: id.to_string(),
            name: name.to_string(),
            team_id: TEAM.to_string(),
        }
    }

    #[test]
    fn test_by_id() {
        let (mut tree, _channels) = Tree::new("canopy");
        tree.create_repository(repo(ID_A, "production")).unwrap();
        assert_eq!(by_id(&tree, ID_A), FindOutcome::One(ID_A.to_string()));
        assert_eq!(by_id(&tree, "missing"), FindOutcome::NotFound);
    }

    #[test]
    fn test_by_name_single_and_kind_filter() {
        let (mut tree, _channels) = Tree::new("canopy");
        tree.create_repository(repo(ID_A, "production")).unwrap();
        assert_eq!(
            by_name(&tree, Some(EntityKind::Repository), "production"),
            FindOutcome::One(ID_A.to_string())
        );
        assert_eq!(
            by_name(&tree, Some(EntityKind::Bucket), "production"),
            FindOutcome::NotFound
        );
    }

    #[test]
    fn test_by_name_ambiguous_is_sorted() {
        let (mut tree, _channels) = Tree::new("canopy");
        tree.create_repository(repo(ID_B, "production")).unwrap();
        tree.create_repository(repo(ID_A, "production")).unwrap();
        let outcome = by_name(&tree, None, "production");
        assert_eq!(
            outcome,
            FindOutcome::Ambiguous(vec![ID_A.to_string(), ID_B.to_string()])
        );
    }

    #[test]
    fn test_resolve_records_faults() {
        let (tree, channels) = Tree::new("canopy");
        assert_eq!(resolve(&tree, None, "ghost"), FindOutcome::NotFound);
        let fault = channels.faults.try_recv().unwrap();
        assert_eq!(fault.kind, FaultKind::FindNotFound);
    }
}
