//! Constructor input records
//!
//! External callers construct entities from these flat, fully-populated
//! records. Validation is synchronous and happens before any entity
//! exists: malformed identifiers or out-of-range names abort construction
//! immediately. Callers must pre-validate anything derived from untrusted
//! input before this boundary.

use canopy_core_types::schema::{valid_id, valid_name};
use canopy_core_types::EntityKind;
use canopy_errors::{Result, TreeError};
use serde::{Deserialize, Serialize};

fn invalid(kind: EntityKind, reason: impl Into<String>) -> TreeError {
    TreeError::InvalidSpec {
        kind,
        reason: reason.into(),
    }
}

fn check_id(kind: EntityKind, field: &str, id: &str) -> Result<()> {
    if !valid_id(id) {
        return Err(invalid(kind, format!("{} is not a well-formed id: '{}'", field, id)));
    }
    Ok(())
}

fn check_name(kind: EntityKind, name: &str) -> Result<()> {
    if !valid_name(name) {
        return Err(invalid(kind, format!("name is empty or out of range: '{}'", name)));
    }
    Ok(())
}

/// Spec record for a Repository entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySpec {
    pub id: String,
    pub name: String,
    pub team_id: String,
}

impl RepositorySpec {
    pub fn validate(&self) -> Result<()> {
        check_id(EntityKind::Repository, "id", &self.id)?;
        check_name(EntityKind::Repository, &self.name)?;
        check_id(EntityKind::Repository, "team_id", &self.team_id)
    }
}

/// Spec record for a Bucket entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub id: String,
    pub name: String,
    pub environment: String,
    pub team_id: String,
    pub repository_id: String,
}

impl BucketSpec {
    pub fn validate(&self) -> Result<()> {
        check_id(EntityKind::Bucket, "id", &self.id)?;
        check_name(EntityKind::Bucket, &self.name)?;
        check_id(EntityKind::Bucket, "team_id", &self.team_id)?;
        check_id(EntityKind::Bucket, "repository_id", &self.repository_id)?;
        if self.environment.trim().is_empty() {
            return Err(invalid(EntityKind::Bucket, "environment must not be empty"));
        }
        Ok(())
    }
}

/// Spec record for a Group entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub id: String,
    pub name: String,
    pub bucket_id: String,
    pub team_id: String,
}

impl GroupSpec {
    pub fn validate(&self) -> Result<()> {
        check_id(EntityKind::Group, "id", &self.id)?;
        check_name(EntityKind::Group, &self.name)?;
        check_id(EntityKind::Group, "bucket_id", &self.bucket_id)?;
        check_id(EntityKind::Group, "team_id", &self.team_id)
    }
}

/// Spec record for a Cluster entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub id: String,
    pub name: String,
    pub bucket_id: String,
    pub team_id: String,
}

impl ClusterSpec {
    pub fn validate(&self) -> Result<()> {
        check_id(EntityKind::Cluster, "id", &self.id)?;
        check_name(EntityKind::Cluster, &self.name)?;
        check_id(EntityKind::Cluster, "bucket_id", &self.bucket_id)?;
        check_id(EntityKind::Cluster, "team_id", &self.team_id)
    }
}

/// Spec record for a Node entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub name: String,
    pub asset_id: u64,
    pub team_id: String,
    pub server_id: String,
    pub online: bool,
}

impl NodeSpec {
    pub fn validate(&self) -> Result<()> {
        check_id(EntityKind::Node, "id", &self.id)?;
        check_name(EntityKind::Node, &self.name)?;
        check_id(EntityKind::Node, "team_id", &self.team_id)?;
        if self.asset_id == 0 {
            return Err(invalid(EntityKind::Node, "asset_id must be non-zero"));
        }
        check_id(EntityKind::Node, "server_id", &self.server_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "018f3c2e-1111-7def-8000-000000000001";

    #[test]
    fn test_repository_spec_valid() {
        let spec = RepositorySpec {
            id: ID.to_string(),
            name: "production".to_string(),
            team_id: ID.to_string(),
        };
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_repository_spec_rejects_malformed_id() {
        let spec = RepositorySpec {
            id: "nope".to_string(),
            name: "production".to_string(),
            team_id: ID.to_string(),
        };
        assert!(matches!(
            spec.validate(),
            Err(TreeError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn test_bucket_spec_rejects_empty_environment() {
        let spec = BucketSpec {
            id: ID.to_string(),
            name: "prod-eu".to_string(),
            environment: " ".to_string(),
            team_id: ID.to_string(),
            repository_id: ID.to_string(),
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_node_spec_rejects_zero_asset() {
        let spec = NodeSpec {
            id: ID.to_string(),
            name: "web01".to_string(),
            asset_id: 0,
            team_id: ID.to_string(),
            server_id: ID.to_string(),
            online: true,
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_name_length_bound() {
        let spec = GroupSpec {
            id: ID.to_string(),
            name: "g".repeat(300),
            bucket_id: ID.to_string(),
            team_id: ID.to_string(),
        };
        assert!(spec.validate().is_err());
    }
}
