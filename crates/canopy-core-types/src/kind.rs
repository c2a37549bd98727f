//! Closed kind and state tags for the configuration tree
//!
//! Dispatch throughout the engine happens on these explicit tags rather
//! than runtime type inspection. The set of kinds is closed: Root,
//! Repository, Bucket, Group, Cluster, Node.

use serde::{Deserialize, Serialize};

/// Kind tag for a tree entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Root,
    Repository,
    Bucket,
    Group,
    Cluster,
    Node,
}

impl EntityKind {
    /// Stable wire string for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Root => "root",
            EntityKind::Repository => "repository",
            EntityKind::Bucket => "bucket",
            EntityKind::Group => "group",
            EntityKind::Cluster => "cluster",
            EntityKind::Node => "node",
        }
    }

    /// Check whether `self` is a valid parent kind for `child`
    ///
    /// Valid pairs: Root←nothing above; Repository under Root; Bucket under
    /// Repository; Group under Bucket or Group; Cluster under Bucket or
    /// Group; Node under Bucket, Group or Cluster.
    pub fn can_parent(&self, child: EntityKind) -> bool {
        match child {
            EntityKind::Root => false,
            EntityKind::Repository => *self == EntityKind::Root,
            EntityKind::Bucket => *self == EntityKind::Repository,
            EntityKind::Group | EntityKind::Cluster => {
                matches!(self, EntityKind::Bucket | EntityKind::Group)
            }
            EntityKind::Node => {
                matches!(
                    self,
                    EntityKind::Bucket | EntityKind::Group | EntityKind::Cluster
                )
            }
        }
    }

    /// Kinds that materialize check instances (Group, Cluster, Node)
    pub fn holds_instances(&self) -> bool {
        matches!(
            self,
            EntityKind::Group | EntityKind::Cluster | EntityKind::Node
        )
    }

    /// Kinds that may be relocated after attachment (Group, Cluster, Node)
    pub fn relocatable(&self) -> bool {
        self.holds_instances()
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structural state of a tree entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityState {
    /// Constructed but not yet linked into the tree
    Floating,
    /// Directly under a Bucket
    Standalone,
    /// Under a Group
    Grouped,
    /// Under a Cluster
    Clustered,
    /// Repository/Bucket linked into the tree
    Attached,
}

impl EntityState {
    /// Stable wire string for this state
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityState::Floating => "floating",
            EntityState::Standalone => "standalone",
            EntityState::Grouped => "grouped",
            EntityState::Clustered => "clustered",
            EntityState::Attached => "attached",
        }
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind tag for a typed property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Custom,
    System,
    Service,
    Oncall,
}

impl PropertyKind {
    /// Stable wire string for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Custom => "custom",
            PropertyKind::System => "system",
            PropertyKind::Service => "service",
            PropertyKind::Oncall => "oncall",
        }
    }

    /// All property kinds in canonical iteration order
    pub fn all() -> [PropertyKind; 4] {
        [
            PropertyKind::Custom,
            PropertyKind::System,
            PropertyKind::Service,
            PropertyKind::Oncall,
        ]
    }
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind tag for a check constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    /// Built-in attributes: environment, object type, object state
    Native,
    System,
    Custom,
    Oncall,
    /// Binds the check to a service property by name
    Service,
    /// Constrains a service's configuration attribute values
    Attribute,
}

impl ConstraintKind {
    /// Stable wire string for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::Native => "native",
            ConstraintKind::System => "system",
            ConstraintKind::Custom => "custom",
            ConstraintKind::Oncall => "oncall",
            ConstraintKind::Service => "service",
            ConstraintKind::Attribute => "attribute",
        }
    }
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_parent_pairs() {
        assert!(EntityKind::Root.can_parent(EntityKind::Repository));
        assert!(EntityKind::Repository.can_parent(EntityKind::Bucket));
        assert!(EntityKind::Bucket.can_parent(EntityKind::Group));
        assert!(EntityKind::Group.can_parent(EntityKind::Group));
        assert!(EntityKind::Bucket.can_parent(EntityKind::Cluster));
        assert!(EntityKind::Group.can_parent(EntityKind::Cluster));
        assert!(EntityKind::Bucket.can_parent(EntityKind::Node));
        assert!(EntityKind::Group.can_parent(EntityKind::Node));
        assert!(EntityKind::Cluster.can_parent(EntityKind::Node));
    }

    #[test]
    fn test_invalid_parent_pairs() {
        assert!(!EntityKind::Root.can_parent(EntityKind::Bucket));
        assert!(!EntityKind::Repository.can_parent(EntityKind::Node));
        assert!(!EntityKind::Cluster.can_parent(EntityKind::Group));
        assert!(!EntityKind::Cluster.can_parent(EntityKind::Cluster));
        assert!(!EntityKind::Node.can_parent(EntityKind::Node));
        assert!(!EntityKind::Bucket.can_parent(EntityKind::Repository));
    }

    #[test]
    fn test_instance_holders() {
        assert!(EntityKind::Group.holds_instances());
        assert!(EntityKind::Cluster.holds_instances());
        assert!(EntityKind::Node.holds_instances());
        assert!(!EntityKind::Repository.holds_instances());
        assert!(!EntityKind::Bucket.holds_instances());
    }

    #[test]
    fn test_kind_serde_roundtrip() {
        let json = serde_json::to_string(&EntityKind::Cluster).unwrap();
        assert_eq!(json, "\"cluster\"");
        let back: EntityKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EntityKind::Cluster);
    }
}
