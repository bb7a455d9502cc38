//! Pixel encoding and frame output.
//!
//! Frames leave the transform stage as opaque RGB8, are packed by [`pixel`] into the controller
//! format and handed to a [`sink::FrameSink`] in global index order. Every written frame yields one
//! [`manifest::ManifestEntry`].

/// Frame index file.
pub mod manifest;
/// RGB332 / RGB565 packing.
pub mod pixel;
/// Per-file and single-blob outputs.
pub mod sink;
/// First-frame preview.
pub mod thumbnail;
