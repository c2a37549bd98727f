//! Snapshot and rollback of the tree arena
//!
//! A snapshot deep-clones the entire arena into a shadow held by the
//! tree. Rollback swaps the shadow back in wholesale; commit discards
//! it. At most one snapshot is open at a time, and the outbound channels
//! are never part of the shadow, so consumers stay wired across a
//! rollback. Events emitted between begin and rollback are not recalled.

use canopy_errors::{Result, TreeError};

use crate::tree::{Shadow, Tree};

impl Tree {
    /// Open a snapshot of the current arena state
    ///
    /// # Errors
    /// `SnapshotAlreadyOpen` if a snapshot is already held.
    pub fn begin(&mut self) -> Result<()> {
        if self.shadow.is_some() {
            return Err(TreeError::SnapshotAlreadyOpen);
        }
        tracing::debug!(entities = self.entities.len(), "snapshot opened");
        self.shadow = Some(Shadow {
            root_id: self.root_id.clone(),
            entities: self.entities.clone(),
        });
        Ok(())
    }

    /// Discard the open snapshot, keeping all mutations since begin
    ///
    /// # Errors
    /// `NoSnapshotOpen` if no snapshot is held.
    pub fn commit(&mut self) -> Result<()> {
        if self.shadow.take().is_none() {
            return Err(TreeError::NoSnapshotOpen);
        }
        tracing::debug!("snapshot committed");
        Ok(())
    }

    /// Restore the arena to its state at begin, discarding the snapshot
    ///
    /// # Errors
    /// `NoSnapshotOpen` if no snapshot is held.
    pub fn rollback(&mut self) -> Result<()> {
        let Some(shadow) = self.shadow.take() else {
            return Err(TreeError::NoSnapshotOpen);
        };
        tracing::debug!(entities = shadow.entities.len(), "snapshot rolled back");
        self.root_id = shadow.root_id;
        self.entities = shadow.entities;
        Ok(())
    }

    /// Check whether a snapshot is currently open
    pub fn in_snapshot(&self) -> bool {
        self.shadow.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RepositorySpec;

    const ID: &str = "018f3c2e-1111-7def-8000-000000000001";
    const TEAM: &str = "018f3c2e-2222-7def-8000-000000000002";

    fn repo_spec() -> RepositorySpec {
        RepositorySpec {
            id: ID.to_string(),
            name: "production".to_string(),
            team_id: TEAM.to_string(),
        }
    }

    #[test]
    fn test_rollback_restores_arena() {
        let (mut tree, _channels) = Tree::new("canopy");
        tree.begin().unwrap();
        tree.create_repository(repo_spec()).unwrap();
        assert_eq!(tree.len(), 2);
        tree.rollback().unwrap();
        assert_eq!(tree.len(), 1);
        assert!(!tree.contains(ID));
        assert!(!tree.in_snapshot());
    }

    #[test]
    fn test_commit_keeps_mutations() {
        let (mut tree, _channels) = Tree::new("canopy");
        tree.begin().unwrap();
        tree.create_repository(repo_spec()).unwrap();
        tree.commit().unwrap();
        assert!(tree.contains(ID));
    }

    #[test]
    fn test_nested_begin_rejected() {
        let (mut tree, _channels) = Tree::new("canopy");
        tree.begin().unwrap();
        assert!(matches!(tree.begin(), Err(TreeError::SnapshotAlreadyOpen)));
    }

    #[test]
    fn test_commit_without_begin_rejected() {
        let (mut tree, _channels) = Tree::new("canopy");
        assert!(matches!(tree.commit(), Err(TreeError::NoSnapshotOpen)));
        assert!(matches!(tree.rollback(), Err(TreeError::NoSnapshotOpen)));
    }

    #[test]
    fn test_channels_survive_rollback() {
        let (mut tree, channels) = Tree::new("canopy");
        let _ = channels.actions.try_recv(); // root attached event
        tree.begin().unwrap();
        tree.create_repository(repo_spec()).unwrap();
        tree.rollback().unwrap();

        // emission still reaches the same consumer after rollback
        tree.create_repository(repo_spec()).unwrap();
        let root_id = tree.root_id().to_string();
        crate::tree::attach::attach(
            &mut tree,
            ID,
            &crate::tree::ParentRef::new(canopy_core_types::EntityKind::Root, root_id),
        )
        .unwrap();
        assert!(channels.actions.try_recv().is_ok());
    }
}
