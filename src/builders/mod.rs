//! Builders
//!
//! Fluent builders for rotation configuration.

pub mod policy;

pub use policy::{rotation_policy, RotationPolicyBuilder};
