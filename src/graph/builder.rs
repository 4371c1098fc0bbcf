//! Graph construction.
//!
//! Builds a [`MeshGraph`] from a [`Geometry`]: vertices are unified by exact
//! key equality, then every triangle of every triangle-list primitive group is
//! ingested with its normal and area and registered against the identities of
//! its corners.

use std::collections::HashMap;
use std::hash::Hash;

use super::{MeshGraph, Triangle};
use crate::error::{MeshError, Result};
use crate::mesh::{DrawMode, Geometry, MeshIndex, Primitive, TriangleId, VertexId};

/// Which vertices are considered the same point of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Unification {
    /// Vertices with bit-identical positions share an identity.
    #[default]
    Position,
    /// Vertices share an identity only when their position and every
    /// per-vertex attribute other than the normal are bit-identical.
    AllAttributes,
}

/// Build a graph from a geometry's own primitive groups.
///
/// # Errors
///
/// - [`MeshError::UnsupportedTopology`] if a non-empty primitive group needs
///   triangulation
/// - [`MeshError::InvalidVertexIndex`] if an index is outside the vertex buffer
///
/// A geometry without vertices yields an empty graph.
///
/// # Example
///
/// ```
/// use meshprep::graph::{build_graph, MeshGraph, Unification};
/// use meshprep::mesh::{Geometry, Primitive};
/// use nalgebra::Point3;
///
/// // Two triangles with a seam: vertices 1/3 and 2/4 share positions.
/// let geometry = Geometry::new(
///     "seam",
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(0.0, 1.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(0.0, 1.0, 0.0),
///         Point3::new(1.0, 1.0, 0.0),
///     ],
/// )
/// .with_primitive(Primitive::triangles(&[[0, 1, 2], [3, 5, 4]]));
///
/// let graph: MeshGraph = build_graph(&geometry, Unification::Position).unwrap();
/// assert_eq!(graph.num_triangles(), 2);
/// assert_eq!(graph.num_identities(), 4);
/// ```
pub fn build_graph<I: MeshIndex>(geometry: &Geometry, unification: Unification) -> Result<MeshGraph<I>> {
    build_graph_with_connectivity(geometry, &geometry.primitives, unification)
}

/// Build a graph from a geometry's vertex buffers and an external set of
/// primitive groups.
///
/// Morph targets carry vertex data only and borrow their connectivity from
/// the base geometry; this is how their graph is built.
pub fn build_graph_with_connectivity<I: MeshIndex>(
    geometry: &Geometry,
    primitives: &[Primitive],
    unification: Unification,
) -> Result<MeshGraph<I>> {
    let vertex_count = geometry.vertex_count();
    if vertex_count == 0 {
        return Ok(MeshGraph::new());
    }

    validate_primitives(primitives, vertex_count)?;

    let unified: Vec<VertexId<I>> = match unification {
        Unification::Position => unify_by_key(vertex_count, |i| {
            let p = &geometry.positions[i];
            [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
        }),
        Unification::AllAttributes => unify_by_key(vertex_count, |i| {
            let p = &geometry.positions[i];
            let mut key = vec![p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
            for attribute in geometry.per_vertex_attributes() {
                attribute.data.extend_key(i, &mut key);
            }
            key
        }),
    };

    let identities: Vec<VertexId<I>> = unified
        .iter()
        .enumerate()
        .filter(|&(i, u)| u.index() == i)
        .map(|(_, &u)| u)
        .collect();

    let num_triangles = primitives.iter().map(Primitive::triangle_count).sum();
    let mut graph = MeshGraph {
        unified,
        incident: vec![Vec::new(); vertex_count],
        identities,
        triangles: Vec::with_capacity(num_triangles),
    };

    for primitive in primitives.iter().filter(|p| p.mode == DrawMode::Triangles) {
        for corners in primitive.indices.chunks_exact(3) {
            let vertices = [
                VertexId::new(corners[0] as usize),
                VertexId::new(corners[1] as usize),
                VertexId::new(corners[2] as usize),
            ];
            let positions = [
                &geometry.positions[vertices[0].index()],
                &geometry.positions[vertices[1].index()],
                &geometry.positions[vertices[2].index()],
            ];
            add_triangle(&mut graph, Triangle::new(vertices, positions));
        }
    }

    Ok(graph)
}

/// Reject topologies the smoother cannot handle and out-of-range indices.
fn validate_primitives(primitives: &[Primitive], vertex_count: usize) -> Result<()> {
    for (pi, primitive) in primitives.iter().enumerate() {
        if primitive.indices.is_empty() {
            continue;
        }
        if primitive.mode.requires_triangulation() {
            return Err(MeshError::UnsupportedTopology {
                primitive: pi,
                mode: primitive.mode,
            });
        }
        if let Some(&index) = primitive.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshError::InvalidVertexIndex {
                primitive: pi,
                index: index as usize,
                vertex_count,
            });
        }
    }
    Ok(())
}

/// Map every raw vertex to the first raw vertex with an equal key.
fn unify_by_key<I, K, F>(vertex_count: usize, key_of: F) -> Vec<VertexId<I>>
where
    I: MeshIndex,
    K: Hash + Eq,
    F: Fn(usize) -> K,
{
    let mut first_with_key: HashMap<K, usize> = HashMap::with_capacity(vertex_count);
    (0..vertex_count)
        .map(|i| VertexId::new(*first_with_key.entry(key_of(i)).or_insert(i)))
        .collect()
}

/// Append a triangle to the arena and register it against its identities.
fn add_triangle<I: MeshIndex>(graph: &mut MeshGraph<I>, triangle: Triangle<I>) {
    let id = TriangleId::new(graph.triangles.len());

    let mut registered: [Option<VertexId<I>>; 3] = [None; 3];
    for (slot, &corner) in triangle.vertices.iter().enumerate() {
        let identity = graph.unify(corner);
        // A corner repeated by identity is registered once.
        if registered[..slot].contains(&Some(identity)) {
            continue;
        }
        registered[slot] = Some(identity);
        graph.incident[identity.index()].push(id);
    }

    graph.triangles.push(triangle);
}
