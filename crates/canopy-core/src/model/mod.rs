pub mod check;
pub mod entity;
pub mod instance;
pub mod property;
pub mod spec;

pub use check::{Check, CheckInput, Constraint, Threshold};
pub use entity::{Entity, PropertyStore};
pub use instance::CheckInstance;
pub use property::{InstanceHint, Property, PropertyInput, PropertyPayload, ServiceAttribute};
pub use spec::{BucketSpec, ClusterSpec, GroupSpec, NodeSpec, RepositorySpec};
