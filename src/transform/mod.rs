//! Per-frame pixel transforms applied before encoding.

/// Alpha flattening onto the opaque black background.
pub mod composite;
/// Rotation, cover scaling and center crop.
pub mod geometry;
