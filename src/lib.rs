//! # Meshprep
//!
//! Crease-aware normal smoothing for indexed triangle meshes headed to the GPU.
//!
//! Meshprep takes the buffer set a loader produces (positions, optional
//! normals, extra per-vertex attributes and primitive groups) and makes its
//! shading normals usable: recomputed where they are missing, repaired where
//! they face the wrong way, and split across hard edges so a cube stays a
//! cube.
//!
//! ## Features
//!
//! - **Adjacency graph**: exact vertex unification by position or by full
//!   attribute set, with crease-partitioned one-ring queries
//! - **Normal smoothing**: recompute, smooth-all, smooth-flipped and diagnose
//!   modes, duplicating vertices only where a crease requires it
//! - **Flexible indexing**: graphs over 16-bit, 32-bit, and 64-bit indices
//! - **Batch dispatch**: every shared mesh smoothed once, morph targets kept
//!   aligned with their base, failures reported per mesh
//!
//! ## Quick Start
//!
//! ```
//! use meshprep::prelude::*;
//! use nalgebra::Point3;
//!
//! // A unit cube: 8 shared corners, 12 triangles.
//! let positions = (0..8)
//!     .map(|i| Point3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32))
//!     .collect();
//! let mut cube = Geometry::new("cube", positions).with_primitive(Primitive::triangles(&[
//!     [0, 2, 3], [0, 3, 1], [4, 5, 7], [4, 7, 6],
//!     [0, 1, 5], [0, 5, 4], [2, 6, 7], [2, 7, 3],
//!     [0, 4, 6], [0, 6, 2], [1, 3, 7], [1, 7, 5],
//! ]));
//!
//! // Hard edges: each corner splits into one vertex per face.
//! let report = recompute_normals(&mut cube, 45f32.to_radians()).unwrap();
//! assert_eq!(report.duplicated, 16);
//! assert_eq!(cube.vertex_count(), 24);
//! assert_eq!(cube.triangle_count(), 12);
//!
//! // The normals are now consistent.
//! let check = SmoothOptions::default().with_mode(SmoothMode::Diagnose);
//! let report = smooth_normals(&mut cube, &check).unwrap();
//! assert_eq!(report.flipped, 0);
//! ```
//!
//! ## Batches
//!
//! ```
//! use meshprep::prelude::*;
//! use nalgebra::Point3;
//!
//! let triangle = Geometry::new(
//!     "triangle",
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//! )
//! .with_primitive(Primitive::triangles(&[[0, 1, 2]]));
//!
//! let mesh = shared(MeshResource::Plain(triangle));
//! let report = smooth_batch([&mesh, &mesh], &SmoothOptions::default()).unwrap();
//! assert_eq!(report.meshes, 1);
//! assert!(!report.has_warnings());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use meshprep::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::normals::{
        recompute_normals, smooth_normals, NormalSmoother, SmoothMode, SmoothOptions, SmoothReport,
    };
    pub use crate::algo::Progress;
    pub use crate::diagnostics::{BatchReport, Diagnostic, DiagnosticKind, Severity};
    pub use crate::dispatch::{
        shared, smooth_batch, MeshResource, MorphGeometry, MorphTarget, SharedMesh,
    };
    pub use crate::error::{MeshError, Result};
    pub use crate::graph::{build_graph, MeshGraph, Unification};
    pub use crate::mesh::{
        AttributeData, AttributeSemantic, Binding, DrawMode, Geometry, MeshIndex, Primitive,
        TriangleId, VertexAttribute, VertexId,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::{Point3, Vector2};

    /// A square split along its diagonal with a UV seam on that diagonal.
    fn create_seamed_square() -> Geometry {
        Geometry::new(
            "seamed",
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
        )
        .with_attribute(VertexAttribute::per_vertex(
            AttributeSemantic::TexCoord(0),
            AttributeData::Vec2(vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(1.0, 0.0),
                Vector2::new(1.0, 1.0),
                Vector2::new(0.5, 0.0),
                Vector2::new(0.5, 1.0),
                Vector2::new(0.0, 1.0),
            ]),
        ))
        .with_primitive(Primitive::triangles(&[[0, 1, 2], [3, 4, 5]]))
    }

    #[test]
    fn test_seam_is_smoothed_across_without_duplication() {
        let mut geometry = create_seamed_square();
        let report = recompute_normals(&mut geometry, 0.1).unwrap();

        assert_eq!(report.duplicated, 0);
        assert_eq!(geometry.vertex_count(), 6);
        for n in geometry.normals.unwrap() {
            assert!((n - nalgebra::Vector3::z()).norm() < 1e-6);
        }
    }

    #[test]
    fn test_unification_by_attributes_splits_seam() {
        let geometry = create_seamed_square();

        let by_position: MeshGraph = build_graph(&geometry, Unification::Position).unwrap();
        let by_attributes: MeshGraph = build_graph(&geometry, Unification::AllAttributes).unwrap();

        assert_eq!(by_position.num_identities(), 4);
        assert_eq!(by_attributes.num_identities(), 6);
    }
}
