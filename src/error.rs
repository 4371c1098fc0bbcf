//! Error types for meshprep.
//!
//! This module defines all error types used throughout the library. None of
//! them are fatal: the batch dispatcher turns every error into a diagnostic
//! for the mesh that produced it and moves on to the next one.

use thiserror::Error;

use crate::mesh::DrawMode;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur while preparing a mesh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// A primitive group is not an independent triangle list and must be
    /// triangulated first.
    #[error("primitive {primitive} uses draw mode {mode:?}, expected an independent triangle list")]
    UnsupportedTopology {
        /// Index of the offending primitive group.
        primitive: usize,
        /// The draw mode it declares.
        mode: DrawMode,
    },

    /// A required buffer is absent.
    #[error("missing {buffer} buffer")]
    MissingBuffer {
        /// Name of the missing buffer.
        buffer: &'static str,
    },

    /// A per-vertex buffer does not match the position buffer length.
    #[error("{buffer} buffer has {actual} entries, expected {expected}")]
    BufferLengthMismatch {
        /// Name of the mismatched buffer.
        buffer: String,
        /// Expected number of entries.
        expected: usize,
        /// Actual number of entries.
        actual: usize,
    },

    /// A primitive references a vertex outside the vertex buffers.
    #[error("primitive {primitive} references vertex {index} but only {vertex_count} vertices exist")]
    InvalidVertexIndex {
        /// Index of the primitive group.
        primitive: usize,
        /// The out-of-range vertex index.
        index: usize,
        /// Number of vertices in the geometry.
        vertex_count: usize,
    },

    /// More elements than the index width can address.
    #[error("{count} {element} do not fit in {width} indices")]
    IndexOverflow {
        /// What is being counted.
        element: &'static str,
        /// Number of elements required.
        count: usize,
        /// Name of the index type.
        width: &'static str,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Whether this error stems from a topology the smoother cannot handle,
    /// as opposed to absent or inconsistent buffers.
    pub fn is_topology(&self) -> bool {
        matches!(self, MeshError::UnsupportedTopology { .. })
    }
}
