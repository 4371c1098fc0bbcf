//! Vertex/triangle adjacency graph.
//!
//! The graph is an arena of [`Triangle`]s plus an index-based map from each
//! *unified identity* to the triangles touching it. A unified identity is the
//! first raw vertex carrying a given key (its exact position, or its full
//! attribute set); all raw vertices with the same key map to it.
//!
//! # Structure
//!
//! - `unified[v]` is the identity of raw vertex `v`. Entries never change once
//!   assigned; duplicated vertices are appended with their source's identity.
//! - `incident[u]` lists the triangles that reference any raw vertex whose
//!   identity is `u`. It is empty for raw vertices that are not identities.
//! - Triangles cache a unit normal and their area, computed once from the
//!   positions at construction time.
//!
//! # One-rings
//!
//! [`MeshGraph::one_ring`] partitions the triangles around an identity into
//! clusters. Two triangles are *ring-adjacent* at `u` when they share an edge
//! ending at `u`, compared by identity so that seams in the raw indices do not
//! break adjacency. Adjacent triangles join the same cluster when the angle
//! between their normals is strictly below the crease angle.

mod builder;

use std::collections::VecDeque;

use nalgebra::{Point3, Vector3};

use crate::error::{MeshError, Result};
use crate::mesh::{MeshIndex, TriangleId, VertexId};

pub use builder::{build_graph, build_graph_with_connectivity, Unification};

/// A triangle in the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle<I: MeshIndex = u32> {
    /// Raw vertex indices, in winding order.
    pub vertices: [VertexId<I>; 3],

    /// Unit normal, or zero for a degenerate triangle.
    pub normal: Vector3<f32>,

    /// Area of the triangle. Used as the accumulation weight.
    pub area: f32,
}

impl<I: MeshIndex> Triangle<I> {
    /// Create a triangle and compute its normal and area from its corners.
    pub fn new(vertices: [VertexId<I>; 3], corners: [&Point3<f32>; 3]) -> Self {
        let cross = (corners[1] - corners[0]).cross(&(corners[2] - corners[0]));
        let length = cross.norm();
        let normal = if length > 0.0 {
            cross / length
        } else {
            Vector3::zeros()
        };

        Self {
            vertices,
            normal,
            area: 0.5 * length,
        }
    }

    /// Whether the triangle has no area.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.area <= 0.0
    }

    /// Normal scaled by area.
    #[inline]
    pub fn weighted_normal(&self) -> Vector3<f32> {
        self.normal * self.area
    }

    /// Angle in radians between this triangle's normal and another's.
    pub fn angle(&self, other: &Triangle<I>) -> f32 {
        self.normal.dot(&other.normal).clamp(-1.0, 1.0).acos()
    }

    /// Whether a raw vertex is one of the corners.
    #[inline]
    pub fn contains(&self, v: VertexId<I>) -> bool {
        self.vertices.contains(&v)
    }

    /// Replace every corner equal to `old` with `new`. Returns whether any
    /// corner changed.
    pub fn replace_vertex(&mut self, old: VertexId<I>, new: VertexId<I>) -> bool {
        let mut replaced = false;
        for corner in &mut self.vertices {
            if *corner == old {
                *corner = new;
                replaced = true;
            }
        }
        replaced
    }
}

/// Adjacency graph over unified vertex identities.
#[derive(Debug, Clone, Default)]
pub struct MeshGraph<I: MeshIndex = u32> {
    /// Raw vertex -> unified identity.
    pub(crate) unified: Vec<VertexId<I>>,

    /// Unified identity -> incident triangles.
    pub(crate) incident: Vec<Vec<TriangleId<I>>>,

    /// All unified identities, in ascending order.
    pub(crate) identities: Vec<VertexId<I>>,

    /// Triangle arena.
    pub(crate) triangles: Vec<Triangle<I>>,
}

impl<I: MeshIndex> MeshGraph<I> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            unified: Vec::new(),
            incident: Vec::new(),
            identities: Vec::new(),
            triangles: Vec::new(),
        }
    }

    // ==================== Accessors ====================

    /// Number of raw vertices known to the graph, including duplicates
    /// registered after construction.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.unified.len()
    }

    /// Number of unified identities.
    #[inline]
    pub fn num_identities(&self) -> usize {
        self.identities.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Whether the graph has no triangles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Unified identity of a raw vertex.
    #[inline]
    pub fn unify(&self, v: VertexId<I>) -> VertexId<I> {
        self.unified[v.index()]
    }

    /// Get a triangle by ID.
    #[inline]
    pub fn triangle(&self, id: TriangleId<I>) -> &Triangle<I> {
        &self.triangles[id.index()]
    }

    /// Get a mutable triangle by ID, to retarget its corners.
    #[inline]
    pub fn triangle_mut(&mut self, id: TriangleId<I>) -> &mut Triangle<I> {
        &mut self.triangles[id.index()]
    }

    /// Triangles incident to a unified identity.
    #[inline]
    pub fn vertex_triangles(&self, identity: VertexId<I>) -> &[TriangleId<I>] {
        &self.incident[identity.index()]
    }

    // ==================== Iteration ====================

    /// Iterate over all unified identities.
    pub fn identities(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.identities.iter().copied()
    }

    /// Iterate over all triangle IDs.
    pub fn triangle_ids(&self) -> impl Iterator<Item = TriangleId<I>> + '_ {
        (0..self.triangles.len()).map(TriangleId::new)
    }

    /// Iterate over all triangles with their IDs.
    pub fn triangles(&self) -> impl Iterator<Item = (TriangleId<I>, &Triangle<I>)> + '_ {
        self.triangles
            .iter()
            .enumerate()
            .map(|(i, t)| (TriangleId::new(i), t))
    }

    /// Flatten the triangle table into a triangle-list index buffer, in
    /// triangle order.
    ///
    /// # Errors
    ///
    /// [`MeshError::IndexOverflow`] if a vertex lies beyond the 32-bit range
    /// of [`Primitive::indices`](crate::mesh::Primitive::indices).
    pub fn triangle_indices(&self) -> Result<Vec<u32>> {
        self.triangles
            .iter()
            .flat_map(|t| t.vertices.iter())
            .map(|v| {
                u32::try_from(v.index()).map_err(|_| MeshError::IndexOverflow {
                    element: "vertices",
                    count: v.index() + 1,
                    width: u32::NAME,
                })
            })
            .collect()
    }

    // ==================== Queries ====================

    /// Whether two triangles share an edge ending at `identity`.
    pub fn ring_adjacent(&self, identity: VertexId<I>, a: TriangleId<I>, b: TriangleId<I>) -> bool {
        let ta = self.triangle(a);
        let tb = self.triangle(b);

        ta.vertices
            .iter()
            .map(|&v| self.unify(v))
            .filter(|&u| u != identity)
            .any(|u| tb.vertices.iter().any(|&w| self.unify(w) == u))
    }

    /// Partition the triangles around `identity` into smooth clusters.
    ///
    /// Each cluster is grown breadth-first from its lowest unvisited incident
    /// triangle, adding ring-adjacent triangles whose normal differs from the
    /// neighbor that reached them by less than `crease_angle` radians. Every
    /// incident triangle lands in exactly one cluster.
    pub fn one_ring(&self, identity: VertexId<I>, crease_angle: f32) -> Vec<Vec<TriangleId<I>>> {
        let incident = self.vertex_triangles(identity);
        let mut visited = vec![false; incident.len()];
        let mut clusters = Vec::new();
        let mut queue = VecDeque::new();

        for seed in 0..incident.len() {
            if visited[seed] {
                continue;
            }
            visited[seed] = true;
            queue.push_back(seed);

            let mut cluster = Vec::new();
            while let Some(current) = queue.pop_front() {
                let tri = incident[current];
                cluster.push(tri);

                for (other, seen) in visited.iter_mut().enumerate() {
                    if *seen {
                        continue;
                    }
                    let candidate = incident[other];
                    if self.ring_adjacent(identity, tri, candidate)
                        && self.triangle(tri).angle(self.triangle(candidate)) < crease_angle
                    {
                        *seen = true;
                        queue.push_back(other);
                    }
                }
            }

            clusters.push(cluster);
        }

        clusters
    }

    /// Area-weighted sum of the normals of a set of triangles. Not normalized.
    pub fn accumulate_normals(&self, triangles: &[TriangleId<I>]) -> Vector3<f32> {
        triangles
            .iter()
            .map(|&t| self.triangle(t).weighted_normal())
            .fold(Vector3::zeros(), |acc, n| acc + n)
    }

    // ==================== Mutation ====================

    /// Register a freshly appended raw vertex as sharing the identity of
    /// `source`.
    ///
    /// Raw vertices must be registered in order: `duplicate` is expected to
    /// be the next raw index.
    pub fn register_duplicate(&mut self, duplicate: VertexId<I>, source: VertexId<I>) {
        debug_assert_eq!(
            duplicate.index(),
            self.unified.len(),
            "duplicates must be registered in append order"
        );
        let identity = self.unify(source);
        self.unified.push(identity);
        self.incident.push(Vec::new());
    }

    /// Point every corner equal to `old` at `new` in the given triangles.
    pub fn retarget(&mut self, triangles: &[TriangleId<I>], old: VertexId<I>, new: VertexId<I>) {
        for &t in triangles {
            self.triangle_mut(t).replace_vertex(old, new);
        }
    }

    // ==================== Validation ====================

    /// Check that identities and adjacency are consistent.
    pub fn is_valid(&self) -> bool {
        if self.incident.len() != self.unified.len() {
            return false;
        }

        // Identities are canonical.
        for &u in &self.unified {
            if u.index() >= self.unified.len() || self.unify(u) != u {
                return false;
            }
        }

        for t in &self.triangles {
            if t.vertices.iter().any(|v| v.index() >= self.unified.len()) {
                return false;
            }
        }

        // Every incident triangle touches its identity.
        for (u, incident) in self.incident.iter().enumerate() {
            let identity = VertexId::new(u);
            for &tri in incident {
                if tri.index() >= self.triangles.len() {
                    return false;
                }
                if !self
                    .triangle(tri)
                    .vertices
                    .iter()
                    .any(|&v| self.unify(v) == identity)
                {
                    return false;
                }
            }
        }

        true
    }
}
