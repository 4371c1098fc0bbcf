//! Mesh buffers and index types.
//!
//! This module holds the plain data the rest of the crate operates on:
//!
//! - [`Geometry`] - positions, normals, extra attributes and primitive groups
//! - [`Primitive`] / [`DrawMode`] - how indices are assembled into primitives
//! - [`VertexAttribute`] / [`AttributeData`] - typed, bound attribute arrays
//! - [`VertexId`] / [`TriangleId`] - type-safe indices over a [`MeshIndex`]
//!
//! # Construction
//!
//! ```
//! use meshprep::mesh::{Geometry, Primitive};
//! use nalgebra::Point3;
//!
//! let geometry = Geometry::new(
//!     "quad",
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(1.0, 1.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//! )
//! .with_primitive(Primitive::triangles(&[[0, 1, 2], [0, 2, 3]]));
//!
//! assert_eq!(geometry.vertex_count(), 4);
//! assert_eq!(geometry.triangle_count(), 2);
//! ```

mod geometry;
mod index;

pub use geometry::{
    AttributeData, AttributeSemantic, Binding, DrawMode, Geometry, Primitive, VertexAttribute,
};
pub use index::{MeshIndex, TriangleId, VertexId};
