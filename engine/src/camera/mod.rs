//! Camera Module
//!
//! Perspective camera state and math. Window-system agnostic.

pub mod perspective;

pub use perspective::{Camera, ProjectionParams, Transform};
