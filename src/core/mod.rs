//! Rotation Core Components
//!
//! Injected collaborators: time source and random token source.

pub mod clock;
pub mod generator;

pub use clock::*;
pub use generator::*;
