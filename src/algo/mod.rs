//! Mesh preparation passes.
//!
//! - **Normals**: crease-aware normal recomputation, flipped-normal diagnosis
//!   and repair, forced smoothing
//!
//! Each pass takes a [`Geometry`](crate::mesh::Geometry) by mutable
//! reference, works on it to completion and returns a report.

pub mod normals;
pub mod progress;

pub use progress::Progress;
