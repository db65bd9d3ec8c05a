//! Rotation Types
//!
//! Core type definitions for refresh token rotation.

pub mod config;
pub mod policy;
pub mod token;

pub use config::*;
pub use policy::{PolicyPreset, RotationPolicy, DEFAULT_EXPIRES_IN, MAX_EXPIRES_IN};
pub use token::*;
