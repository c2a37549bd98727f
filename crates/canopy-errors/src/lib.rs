//! Error taxonomy for the canopy tree engine
//!
//! Two distinct failure classes, surfaced through two distinct channels:
//!
//! - [`TreeError`] — structural/programmer defects (double attach, invalid
//!   parent kind, routing mismatches, startup drift). These can only
//!   originate from a caller bug or storage corruption, never from external
//!   data, so they abort the call chain as a `Result::Err` with the tree
//!   left unchanged.
//! - [`Fault`] — recoverable data-consistency faults (duplicate property on
//!   set, update/delete of an instance that cannot be located). These are
//!   reported through the outbound error queue; the requested mutation is
//!   abandoned and tree state is left unchanged.

use canopy_core_types::{EntityKind, PropertyKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using TreeError
pub type Result<T> = std::result::Result<T, TreeError>;

/// Structural and programmer-defect errors
///
/// Every variant here indicates a bug in the caller or corruption of the
/// tree, never bad external input. External input is rejected by spec
/// validation (`InvalidSpec`) before it reaches any mutating operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    // ===== Construction =====
    /// Constructor spec record failed validation
    #[error("Invalid spec for {kind}: {reason}")]
    InvalidSpec { kind: EntityKind, reason: String },

    /// Entity id already present in the tree arena
    #[error("Entity already exists: {entity_id}")]
    AlreadyExists { entity_id: String },

    // ===== Structural =====
    /// Entity not found in the tree arena
    #[error("Entity not found: {entity_id}")]
    EntityNotFound { entity_id: String },

    /// Attach called on an entity that already has a parent
    #[error("Entity {entity_id} is already attached to {parent_id}")]
    AlreadyAttached {
        entity_id: String,
        parent_id: String,
    },

    /// Parent kind cannot hold this child kind
    #[error("Invalid parent kind: {parent_kind} cannot hold {child_kind}")]
    InvalidParentKind {
        parent_kind: EntityKind,
        child_kind: EntityKind,
    },

    /// Structural operation requires an attached entity
    #[error("Entity {entity_id} is not attached")]
    NotAttached { entity_id: String },

    /// Receive/unlink addressing did not resolve to the expected entity
    ///
    /// Can only result from a caller bug, never bad external data.
    #[error("Routing mismatch for {entity_id}: {reason}")]
    RoutingMismatch { entity_id: String, reason: String },

    /// Detach is not defined for this kind (Bucket, Root)
    #[error("Detach is not defined for {kind} entity {entity_id}")]
    DetachUndefined { kind: EntityKind, entity_id: String },

    /// ReAttach is only valid for Group, Cluster and Node
    #[error("ReAttach is not defined for {kind} entity {entity_id}")]
    ReattachUndefined { kind: EntityKind, entity_id: String },

    /// The requested parent lies inside the moving entity's own subtree;
    /// linking would create a parent/child cycle
    #[error("Cannot place {entity_id} under {parent_id}: target is within its own subtree")]
    CycleDetected {
        entity_id: String,
        parent_id: String,
    },

    /// The tree root cannot be destroyed
    #[error("Cannot destroy the tree root {entity_id}")]
    CannotDestroyRoot { entity_id: String },

    /// No enclosing bucket exists on the parent chain
    #[error("Entity {entity_id} has no enclosing bucket")]
    NoEnclosingBucket { entity_id: String },

    // ===== Snapshot =====
    /// Begin called while a shadow copy is already open
    #[error("Snapshot already open")]
    SnapshotAlreadyOpen,

    /// Commit/Rollback called without an open shadow copy
    #[error("No snapshot open")]
    NoSnapshotOpen,

    // ===== Startup reconciliation =====
    /// A computed instance found no loaded counterpart, or loaded instances
    /// remained unmatched: storage and tree have drifted apart
    #[error("Loaded instance mismatch for check {check_id} on {entity_id}: {reason}")]
    LoadedInstanceMismatch {
        entity_id: String,
        check_id: String,
        reason: String,
    },

    // ===== Generic =====
    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<serde_json::Error> for TreeError {
    fn from(err: serde_json::Error) -> Self {
        TreeError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Classification of a recoverable data-consistency fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Set would duplicate a property the entity already holds
    DuplicateProperty,
    /// Update/delete referenced a property instance that cannot be located
    PropertyNotFound,
    /// Update/delete referenced a check that cannot be located
    CheckNotFound,
    /// Update/delete requested on an inherited copy instead of the source
    NotSourceInstance,
    /// Find matched nothing
    FindNotFound,
    /// Find matched more than once: corruption signal, surfaced never resolved
    FindAmbiguous,
    /// A property or check kind tag was not recognized
    UnknownKind,
}

impl FaultKind {
    /// Stable fault code
    pub fn code(&self) -> &'static str {
        match self {
            FaultKind::DuplicateProperty => "FAULT_DUPLICATE_PROPERTY",
            FaultKind::PropertyNotFound => "FAULT_PROPERTY_NOT_FOUND",
            FaultKind::CheckNotFound => "FAULT_CHECK_NOT_FOUND",
            FaultKind::NotSourceInstance => "FAULT_NOT_SOURCE_INSTANCE",
            FaultKind::FindNotFound => "FAULT_FIND_NOT_FOUND",
            FaultKind::FindAmbiguous => "FAULT_FIND_AMBIGUOUS",
            FaultKind::UnknownKind => "FAULT_UNKNOWN_KIND",
        }
    }
}

/// A recoverable fault record, consumed by an external alerting layer
///
/// Faults name the condition and carry enough context to locate it; the
/// mutation that raised one was abandoned with the tree unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    /// Entity on which the fault was observed
    pub entity_id: Option<String>,
    /// Property/check/instance id the request referenced, if any
    pub object_id: Option<String>,
    /// Property kind involved, if any
    pub property_kind: Option<PropertyKind>,
}

impl Fault {
    /// Create a new fault with the specified kind
    pub fn new(kind: FaultKind) -> Self {
        Self {
            kind,
            message: String::new(),
            entity_id: None,
            object_id: None,
            property_kind: None,
        }
    }

    /// Add a human-readable message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add entity id context
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add referenced object id context
    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    /// Add property kind context
    pub fn with_property_kind(mut self, kind: PropertyKind) -> Self {
        self.property_kind = Some(kind);
        self
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.kind.code())?;
        if !self.message.is_empty() {
            write!(f, " {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        if let Some(object_id) = &self.object_id {
            write!(f, " (object_id: {})", object_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_kind_codes() {
        let cases = [
            (FaultKind::DuplicateProperty, "FAULT_DUPLICATE_PROPERTY"),
            (FaultKind::PropertyNotFound, "FAULT_PROPERTY_NOT_FOUND"),
            (FaultKind::FindAmbiguous, "FAULT_FIND_AMBIGUOUS"),
        ];
        for (kind, expected) in cases {
            assert_eq!(kind.code(), expected, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_fault_builder_and_display() {
        let fault = Fault::new(FaultKind::DuplicateProperty)
            .with_entity_id("bucket-1")
            .with_object_id("prop-1")
            .with_message("duplicate key 'os'");
        assert_eq!(fault.entity_id.as_deref(), Some("bucket-1"));
        let rendered = fault.to_string();
        assert!(rendered.contains("FAULT_DUPLICATE_PROPERTY"));
        assert!(rendered.contains("bucket-1"));
    }

    #[test]
    fn test_tree_error_display() {
        let err = TreeError::AlreadyAttached {
            entity_id: "b".to_string(),
            parent_id: "r".to_string(),
        };
        assert_eq!(err.to_string(), "Entity b is already attached to r");
    }

    #[test]
    fn test_fault_serde_roundtrip() {
        let fault = Fault::new(FaultKind::FindNotFound).with_message("no match");
        let json = serde_json::to_string(&fault).unwrap();
        let back: Fault = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fault);
    }
}
