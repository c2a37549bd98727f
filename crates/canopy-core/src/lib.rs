//! Canopy Core - In-memory configuration and monitoring hierarchy engine
//!
//! This crate provides the tree kernel for canopy, including:
//! - The entity arena (Repository, Bucket, Group, Cluster, Node) with the
//!   attach/detach/reattach/destroy lifecycle
//! - Property inheritance with duplicate detection and shadowing
//! - Check inheritance and the check instance compiler with stable
//!   identity hashes and service configuration expansion
//! - Outbound action and fault queues (the core performs no I/O)
//! - Arena snapshot and rollback, and startup replay from persisted state

pub mod compile;
pub mod events;
pub mod fault;
pub mod finder;
pub mod loader;
pub mod logging;
pub mod model;
pub mod propagate;
pub mod snapshot;
pub mod tree;

// Re-export commonly used types
pub use canopy_core_types::{ConstraintKind, EntityKind, EntityState, PropertyKind, View};
pub use canopy_errors::{Fault, FaultKind, Result, TreeError};
pub use compile::{compute_entity, compute_subtree, ComputeMode};
pub use events::{Action, ActionKind};
pub use finder::FindOutcome;
pub use model::{
    BucketSpec, Check, CheckInput, CheckInstance, ClusterSpec, Constraint, Entity, GroupSpec,
    NodeSpec, Property, PropertyInput, PropertyPayload, RepositorySpec, ServiceAttribute,
    Threshold,
};
pub use propagate::check::{delete_check, set_check};
pub use propagate::property::{delete_property, set_property, update_property};
pub use tree::attach::{attach, destroy, detach, reattach};
pub use tree::{ParentRef, Tree, TreeChannels};
