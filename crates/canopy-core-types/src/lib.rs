//! Core types shared across canopy facilities
//!
//! This crate provides foundational types used by both error handling
//! and the tree engine:
//!
//! - **Kind tags**: EntityKind, EntityState, PropertyKind, ConstraintKind
//! - **View**: visibility scope for properties and checks
//! - **Schema constants**: validation bounds and id helpers

pub mod kind;
pub mod schema;
pub mod view;

pub use kind::{ConstraintKind, EntityKind, EntityState, PropertyKind};
pub use view::View;
