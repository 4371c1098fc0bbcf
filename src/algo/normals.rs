//! Crease-aware vertex normals.
//!
//! This module recomputes, checks and repairs per-vertex shading normals on
//! indexed triangle geometry, keeping shared vertices merged wherever a single
//! normal is valid and splitting them where a crease demands two.
//!
//! # Modes
//!
//! - [`SmoothMode::Recompute`]: derive fresh normals from the one-ring
//!   clusters of every unified vertex, duplicating raw vertices that would
//!   need two different normals
//! - [`SmoothMode::SmoothAll`]: replace every stored normal with the
//!   area-weighted average of its clusters
//! - [`SmoothMode::SmoothFlipped`]: replace only normals facing away from
//!   that average
//! - [`SmoothMode::Diagnose`]: count such normals without touching anything
//!
//! # Example
//!
//! ```
//! use meshprep::algo::normals::{smooth_normals, SmoothMode, SmoothOptions};
//! use meshprep::mesh::{Geometry, Primitive};
//! use nalgebra::Point3;
//!
//! // Two faces of a box sharing the edge (0, 1).
//! let mut geometry = Geometry::new(
//!     "corner",
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!         Point3::new(0.0, 0.0, 1.0),
//!     ],
//! )
//! .with_primitive(Primitive::triangles(&[[0, 1, 2], [1, 0, 3]]));
//!
//! let options = SmoothOptions::default()
//!     .with_mode(SmoothMode::Recompute)
//!     .with_crease_angle_degrees(45.0);
//! let report = smooth_normals(&mut geometry, &options).unwrap();
//!
//! // The shared edge is split so each face keeps its own normal.
//! assert_eq!(report.duplicated, 2);
//! assert_eq!(geometry.vertex_count(), 6);
//! assert_eq!(geometry.triangle_count(), 2);
//! ```

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use nalgebra::Vector3;

use crate::error::{MeshError, Result};
use crate::graph::{build_graph_with_connectivity, MeshGraph, Unification};
use crate::mesh::{DrawMode, Geometry, MeshIndex, Primitive, TriangleId, VertexId};

use super::Progress;

/// What a smoothing pass does with the normals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SmoothMode {
    /// Derive fresh normals, duplicating vertices across creases.
    Recompute,
    /// Replace every normal with its one-ring average.
    SmoothAll,
    /// Replace only normals that disagree with their one-ring average.
    SmoothFlipped,
    /// Report disagreeing normals without changing anything.
    #[default]
    Diagnose,
}

impl SmoothMode {
    /// Whether this mode writes normals.
    pub fn mutates(self) -> bool {
        self != SmoothMode::Diagnose
    }

    /// Short lowercase name, as used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            SmoothMode::Recompute => "recompute",
            SmoothMode::SmoothAll => "smooth_all",
            SmoothMode::SmoothFlipped => "smooth_flipped",
            SmoothMode::Diagnose => "diagnose",
        }
    }
}

impl fmt::Display for SmoothMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options for normal smoothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothOptions {
    /// What to do with the normals.
    pub mode: SmoothMode,

    /// Angle in radians between adjacent triangle normals at or above which
    /// the shared edge is a crease.
    pub crease_angle: f32,

    /// How raw vertices are merged into unified identities.
    pub unification: Unification,

    /// A stored normal whose dot product with the recomputed one is below
    /// this value is considered flipped.
    pub flip_tolerance: f32,

    /// Whether batches may process independent meshes in parallel
    /// (default: true). A single pass is always sequential.
    pub parallel: bool,
}

impl Default for SmoothOptions {
    fn default() -> Self {
        Self {
            mode: SmoothMode::Diagnose,
            crease_angle: std::f32::consts::FRAC_PI_4,
            unification: Unification::Position,
            flip_tolerance: 1e-6,
            parallel: true,
        }
    }
}

impl SmoothOptions {
    /// Set the smoothing mode.
    pub fn with_mode(mut self, mode: SmoothMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the crease angle in radians.
    pub fn with_crease_angle(mut self, radians: f32) -> Self {
        self.crease_angle = radians;
        self
    }

    /// Set the crease angle in degrees.
    pub fn with_crease_angle_degrees(mut self, degrees: f32) -> Self {
        self.crease_angle = degrees.to_radians();
        self
    }

    /// Set how vertices are unified.
    pub fn with_unification(mut self, unification: Unification) -> Self {
        self.unification = unification;
        self
    }

    /// Set the flip tolerance.
    pub fn with_flip_tolerance(mut self, tolerance: f32) -> Self {
        self.flip_tolerance = tolerance;
        self
    }

    /// Set whether batches may run in parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded batches.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Check that the numeric parameters are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.crease_angle.is_finite() || self.crease_angle < 0.0 {
            return Err(MeshError::invalid_param(
                "crease_angle",
                self.crease_angle,
                "must be a finite, non-negative angle in radians",
            ));
        }
        if !self.flip_tolerance.is_finite() {
            return Err(MeshError::invalid_param(
                "flip_tolerance",
                self.flip_tolerance,
                "must be finite",
            ));
        }
        Ok(())
    }
}

/// Outcome of one smoothing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmoothReport {
    /// Mode that produced this report.
    pub mode: SmoothMode,
    /// Number of triangles (unchanged by the pass).
    pub triangles: usize,
    /// Vertex count before the pass.
    pub vertices_before: usize,
    /// Vertex count after the pass.
    pub vertices_after: usize,
    /// Vertices appended to resolve conflicting normals.
    pub duplicated: usize,
    /// Stored normals found facing away from their one-ring average.
    pub flipped: usize,
    /// Normals written by the pass.
    pub replaced: usize,
    /// Clusters or vertices skipped because their accumulated normal had
    /// zero length.
    pub degenerate: usize,
}

impl SmoothReport {
    /// Whether any flipped normal was found.
    pub fn found_flips(&self) -> bool {
        self.flipped > 0
    }
}

/// A single-use smoothing pass over one geometry.
///
/// Construction validates the geometry and builds its adjacency graph; no
/// buffer is touched until [`run`](Self::run). If construction fails the
/// geometry is left exactly as it was.
#[derive(Debug)]
pub struct NormalSmoother<'a, I: MeshIndex = u32> {
    geometry: &'a mut Geometry,
    graph: MeshGraph<I>,
    options: SmoothOptions,
    owns_connectivity: bool,
    report: SmoothReport,
}

impl<'a, I: MeshIndex> NormalSmoother<'a, I> {
    /// Prepare a pass over a geometry and its own primitive groups.
    ///
    /// # Errors
    ///
    /// - [`MeshError::InvalidParameter`] for unusable options
    /// - [`MeshError::MissingBuffer`] if there are no positions, or no normals
    ///   in `Diagnose` / `SmoothFlipped` mode
    /// - [`MeshError::BufferLengthMismatch`] if a per-vertex buffer is not
    ///   aligned with the positions
    /// - [`MeshError::IndexOverflow`] if the vertices or triangles do not fit
    ///   the index width `I`
    /// - [`MeshError::UnsupportedTopology`] / [`MeshError::InvalidVertexIndex`]
    ///   from graph construction
    pub fn new(geometry: &'a mut Geometry, options: &SmoothOptions) -> Result<Self> {
        let graph = prepare(geometry, None, options)?;
        Ok(Self::from_parts(geometry, graph, options, true))
    }

    /// Prepare a pass over a geometry whose connectivity lives elsewhere, as
    /// for a morph target sharing its base's primitive groups.
    ///
    /// Such a pass cannot re-index the primitives, so `Recompute` is refused.
    pub fn with_connectivity(
        geometry: &'a mut Geometry,
        primitives: &[Primitive],
        options: &SmoothOptions,
    ) -> Result<Self> {
        if options.mode == SmoothMode::Recompute {
            return Err(MeshError::invalid_param(
                "mode",
                options.mode,
                "borrowed connectivity cannot be re-indexed",
            ));
        }
        let graph = prepare(geometry, Some(primitives), options)?;
        Ok(Self::from_parts(geometry, graph, options, false))
    }

    fn from_parts(
        geometry: &'a mut Geometry,
        graph: MeshGraph<I>,
        options: &SmoothOptions,
        owns_connectivity: bool,
    ) -> Self {
        let report = SmoothReport {
            mode: options.mode,
            triangles: graph.num_triangles(),
            vertices_before: geometry.vertex_count(),
            ..SmoothReport::default()
        };
        Self {
            geometry,
            graph,
            options: options.clone(),
            owns_connectivity,
            report,
        }
    }

    /// The adjacency graph built for this pass.
    pub fn graph(&self) -> &MeshGraph<I> {
        &self.graph
    }

    /// Run the pass to completion.
    ///
    /// # Errors
    ///
    /// [`MeshError::IndexOverflow`] if recomputation would duplicate more
    /// vertices than the index width (or the 32-bit primitive indices) can
    /// address. The geometry is left untouched in that case.
    pub fn run(self) -> Result<SmoothReport> {
        self.run_with_progress(&Progress::none())
    }

    /// Run the pass to completion, reporting progress per unified vertex.
    pub fn run_with_progress(mut self, progress: &Progress) -> Result<SmoothReport> {
        // Recomputation is planned in full before anything is written, so an
        // overflowing mesh is refused intact.
        let plan = if self.options.mode == SmoothMode::Recompute {
            let (plan, duplicates) = self.plan_recompute(progress);
            check_vertex_capacity::<I>(self.geometry.vertex_count() + duplicates)?;
            Some(plan)
        } else {
            None
        };

        // Normals are held outside the geometry for the pass, so duplication
        // grows them here rather than through the geometry.
        let vertex_count = self.geometry.vertex_count();
        let stored = self.geometry.normals.take();
        let allocated = stored.is_none();
        let mut normals = match (self.options.mode, stored) {
            (SmoothMode::Recompute, _) | (_, None) => vec![Vector3::zeros(); vertex_count],
            (_, Some(normals)) => normals,
        };

        match plan {
            Some(plan) => self.apply_recompute(plan, &mut normals),
            None => self.smooth(&mut normals, allocated, progress),
        }

        self.geometry.normals = Some(normals);
        if self.report.duplicated > 0 {
            self.rebuild_primitives()?;
        }

        self.report.vertices_after = self.geometry.vertex_count();
        log::debug!(
            "{} '{}': {} triangles, {} -> {} vertices, {} flipped, {} replaced",
            self.report.mode,
            self.geometry.name,
            self.report.triangles,
            self.report.vertices_before,
            self.report.vertices_after,
            self.report.flipped,
            self.report.replaced,
        );
        Ok(self.report)
    }

    /// Partition every unified vertex into clusters and settle which raw
    /// vertices each cluster writes. Returns the plan and the number of
    /// duplicates applying it will create.
    fn plan_recompute(&mut self, progress: &Progress) -> (Vec<Vec<ClusterPlan<I>>>, usize) {
        let identities: Vec<VertexId<I>> = self.graph.identities().collect();
        let total = identities.len();
        let mut plan = Vec::with_capacity(total);
        let mut duplicates = 0;

        for (step, identity) in identities.into_iter().enumerate() {
            let mut assigned: HashSet<VertexId<I>> = HashSet::new();
            let mut clusters = Vec::new();

            for triangles in self.graph.one_ring(identity, self.options.crease_angle) {
                let Some(normal) = self.graph.accumulate_normals(&triangles).try_normalize(0.0) else {
                    self.report.degenerate += 1;
                    continue;
                };

                let targets: BTreeSet<VertexId<I>> = triangles
                    .iter()
                    .flat_map(|&t| self.graph.triangle(t).vertices)
                    .filter(|&v| self.graph.unify(v) == identity)
                    .collect();
                for &vertex in &targets {
                    if !assigned.insert(vertex) {
                        duplicates += 1;
                    }
                }

                clusters.push(ClusterPlan {
                    triangles,
                    normal,
                    targets: targets.into_iter().collect(),
                });
            }

            plan.push(clusters);
            progress.tick(step, total, "Recomputing normals");
        }

        (plan, duplicates)
    }

    /// Write cluster normals, splitting raw vertices shared between clusters
    /// of the same unified vertex.
    fn apply_recompute(&mut self, plan: Vec<Vec<ClusterPlan<I>>>, normals: &mut Vec<Vector3<f32>>) {
        for clusters in plan {
            let mut assigned: HashSet<VertexId<I>> = HashSet::new();

            for cluster in clusters {
                for vertex in cluster.targets {
                    if assigned.insert(vertex) {
                        normals[vertex.index()] = cluster.normal;
                    } else {
                        let duplicate = self.duplicate_vertex(vertex, normals);
                        self.graph.retarget(&cluster.triangles, vertex, duplicate);
                        normals[duplicate.index()] = cluster.normal;
                    }
                    self.report.replaced += 1;
                }
            }
        }
    }

    /// Compare every stored normal against its one-ring average and replace
    /// it as the mode demands. Freshly allocated normals are never counted
    /// as flipped.
    fn smooth(&mut self, normals: &mut [Vector3<f32>], allocated: bool, progress: &Progress) {
        let mode = self.options.mode;

        // Raw vertices grouped by identity so each one-ring is built once.
        let mut members: Vec<Vec<VertexId<I>>> = vec![Vec::new(); self.graph.num_vertices()];
        for index in 0..normals.len() {
            let v = VertexId::new(index);
            members[self.graph.unify(v).index()].push(v);
        }

        let identities: Vec<VertexId<I>> = self.graph.identities().collect();
        let total = identities.len();

        for (step, identity) in identities.into_iter().enumerate() {
            let clusters = self.graph.one_ring(identity, self.options.crease_angle);

            for &vertex in &members[identity.index()] {
                let Some(smoothed) = self.vertex_normal(vertex, &clusters).try_normalize(0.0) else {
                    self.report.degenerate += 1;
                    continue;
                };

                let stored = normals[vertex.index()];
                let flipped = !allocated && smoothed.dot(&stored) < self.options.flip_tolerance;
                if flipped {
                    self.report.flipped += 1;
                }
                let replace = match mode {
                    SmoothMode::SmoothAll => true,
                    SmoothMode::SmoothFlipped => flipped,
                    SmoothMode::Recompute | SmoothMode::Diagnose => false,
                };
                if replace {
                    normals[vertex.index()] = smoothed;
                    self.report.replaced += 1;
                }
            }

            progress.tick(step, total, "Smoothing normals");
        }
    }

    /// Area-weighted sum over the clusters that contain a triangle using this
    /// raw vertex, or over the whole one-ring if none does.
    fn vertex_normal(&self, vertex: VertexId<I>, clusters: &[Vec<TriangleId<I>>]) -> Vector3<f32> {
        let touching: Vec<&Vec<TriangleId<I>>> = clusters
            .iter()
            .filter(|cluster| cluster.iter().any(|&t| self.graph.triangle(t).contains(vertex)))
            .collect();

        let selected: Vec<&Vec<TriangleId<I>>> = if touching.is_empty() {
            clusters.iter().collect()
        } else {
            touching
        };

        selected
            .into_iter()
            .map(|cluster| self.graph.accumulate_normals(cluster))
            .fold(Vector3::zeros(), |acc, n| acc + n)
    }

    /// Append a copy of `vertex` to every per-vertex buffer and to the graph.
    fn duplicate_vertex(&mut self, vertex: VertexId<I>, normals: &mut Vec<Vector3<f32>>) -> VertexId<I> {
        let new_index = self.geometry.duplicate_vertex(vertex.index());
        normals.push(normals[vertex.index()]);
        debug_assert_eq!(new_index + 1, normals.len());

        let duplicate = VertexId::new(new_index);
        self.graph.register_duplicate(duplicate, vertex);
        self.report.duplicated += 1;
        duplicate
    }

    /// Write the triangle table back as a single triangle list, in place of
    /// the first triangle-list group. Other groups are kept as they are.
    fn rebuild_primitives(&mut self) -> Result<()> {
        debug_assert!(self.owns_connectivity);

        let mut merged = Some(Primitive::new(DrawMode::Triangles, self.graph.triangle_indices()?));
        let primitives = std::mem::take(&mut self.geometry.primitives);
        for primitive in primitives {
            if primitive.mode == DrawMode::Triangles {
                if let Some(triangles) = merged.take() {
                    self.geometry.primitives.push(triangles);
                }
            } else {
                self.geometry.primitives.push(primitive);
            }
        }
        Ok(())
    }
}

/// One smooth cluster around a unified vertex, ready to be written.
#[derive(Debug)]
struct ClusterPlan<I: MeshIndex> {
    triangles: Vec<TriangleId<I>>,
    normal: Vector3<f32>,
    /// Raw vertices of the unified vertex used by the cluster, ascending.
    targets: Vec<VertexId<I>>,
}

/// Check that `count` vertices are addressable both by the graph's index
/// width and by the 32-bit primitive indices.
fn check_vertex_capacity<I: MeshIndex>(count: usize) -> Result<()> {
    for (fits, width) in [(I::fits(count), I::NAME), (u32::fits(count), u32::NAME)] {
        if !fits {
            return Err(MeshError::IndexOverflow {
                element: "vertices",
                count,
                width,
            });
        }
    }
    Ok(())
}

/// Validate a geometry for the given options and build its graph.
fn prepare<I: MeshIndex>(
    geometry: &Geometry,
    connectivity: Option<&[Primitive]>,
    options: &SmoothOptions,
) -> Result<MeshGraph<I>> {
    options.validate()?;

    let vertex_count = geometry.vertex_count();
    if vertex_count == 0 {
        return Err(MeshError::MissingBuffer { buffer: "position" });
    }

    match (&geometry.normals, options.mode) {
        (_, SmoothMode::Recompute) | (None, SmoothMode::SmoothAll) => {}
        (None, _) => return Err(MeshError::MissingBuffer { buffer: "normal" }),
        (Some(normals), _) if normals.len() != vertex_count => {
            return Err(MeshError::BufferLengthMismatch {
                buffer: "normal".to_string(),
                expected: vertex_count,
                actual: normals.len(),
            });
        }
        (Some(_), _) => {}
    }

    geometry.validate_per_vertex_buffers()?;

    let primitives = connectivity.unwrap_or(&geometry.primitives);
    if !I::fits(vertex_count) {
        return Err(MeshError::IndexOverflow {
            element: "vertices",
            count: vertex_count,
            width: I::NAME,
        });
    }
    let triangle_count: usize = primitives.iter().map(Primitive::triangle_count).sum();
    if !I::fits(triangle_count) {
        return Err(MeshError::IndexOverflow {
            element: "triangles",
            count: triangle_count,
            width: I::NAME,
        });
    }

    build_graph_with_connectivity(geometry, primitives, options.unification)
}

/// Run a smoothing pass over a geometry.
///
/// This is a shortcut for [`NormalSmoother::new`] followed by
/// [`NormalSmoother::run`].
pub fn smooth_normals(geometry: &mut Geometry, options: &SmoothOptions) -> Result<SmoothReport> {
    smooth_normals_with_progress(geometry, options, &Progress::none())
}

/// Run a smoothing pass over a geometry with progress reporting.
pub fn smooth_normals_with_progress(
    geometry: &mut Geometry,
    options: &SmoothOptions,
    progress: &Progress,
) -> Result<SmoothReport> {
    let smoother: NormalSmoother<'_, u32> = NormalSmoother::new(geometry, options)?;
    smoother.run_with_progress(progress)
}

/// Recompute normals from scratch with the given crease angle in radians.
pub fn recompute_normals(geometry: &mut Geometry, crease_angle: f32) -> Result<SmoothReport> {
    let options = SmoothOptions::default()
        .with_mode(SmoothMode::Recompute)
        .with_crease_angle(crease_angle);
    smooth_normals(geometry, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{AttributeData, AttributeSemantic, VertexAttribute};
    use nalgebra::{Point3, Vector2};

    const EPS: f32 = 1e-5;

    /// Unit cube with 8 shared corners and outward winding.
    fn create_cube() -> Geometry {
        let positions = (0..8)
            .map(|i| Point3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32))
            .collect();
        Geometry::new("cube", positions).with_primitive(Primitive::triangles(&[
            [0, 2, 3],
            [0, 3, 1],
            [4, 5, 7],
            [4, 7, 6],
            [0, 1, 5],
            [0, 5, 4],
            [2, 6, 7],
            [2, 7, 3],
            [0, 4, 6],
            [0, 6, 2],
            [1, 3, 7],
            [1, 7, 5],
        ]))
    }

    /// Regular tetrahedron centered at the origin with outward winding.
    fn create_tetrahedron() -> Geometry {
        Geometry::new(
            "tetrahedron",
            vec![
                Point3::new(1.0, 1.0, 1.0),
                Point3::new(1.0, -1.0, -1.0),
                Point3::new(-1.0, 1.0, -1.0),
                Point3::new(-1.0, -1.0, 1.0),
            ],
        )
        .with_primitive(Primitive::triangles(&[[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]]))
    }

    /// Tetrahedron with exact outward normals already stored.
    fn create_shaded_tetrahedron() -> Geometry {
        let mut geometry = create_tetrahedron();
        let normals = geometry.positions.iter().map(|p| p.coords.normalize()).collect();
        geometry.normals = Some(normals);
        geometry
    }

    fn face_normal(geometry: &Geometry, tri: &[u32]) -> Vector3<f32> {
        let p = |i: u32| geometry.positions[i as usize];
        (p(tri[1]) - p(tri[0])).cross(&(p(tri[2]) - p(tri[0]))).normalize()
    }

    fn assert_indices_in_bounds(geometry: &Geometry) {
        for primitive in &geometry.primitives {
            for &i in &primitive.indices {
                assert!((i as usize) < geometry.vertex_count(), "index {} out of bounds", i);
            }
        }
    }

    #[test]
    fn test_cube_recompute_splits_every_corner() {
        let mut geometry = create_cube().with_attribute(VertexAttribute::per_vertex(
            AttributeSemantic::TexCoord(0),
            AttributeData::Vec2((0..8).map(|i| Vector2::new(i as f32, 0.0)).collect()),
        ));
        let original = geometry.clone();

        let report = recompute_normals(&mut geometry, 45f32.to_radians()).unwrap();

        assert_eq!(report.duplicated, 16);
        assert_eq!(geometry.vertex_count(), 24);
        assert_eq!(geometry.triangle_count(), 12);
        assert_eq!(report.triangles, 12);
        assert_eq!(report.vertices_after, 24);
        assert!(geometry.validate_per_vertex_buffers().is_ok());
        assert_indices_in_bounds(&geometry);

        // Every face-vertex carries exactly its face's normal.
        let normals = geometry.normals.as_ref().unwrap();
        for tri in geometry.primitives[0].indices.chunks_exact(3) {
            let n = face_normal(&geometry, tri);
            for &v in tri {
                assert!(
                    (normals[v as usize] - n).norm() < EPS,
                    "vertex {} has {:?}, face has {:?}",
                    v,
                    normals[v as usize],
                    n
                );
            }
        }

        // Each corner now has three raw vertices, all copies of the source.
        for corner in 0..8 {
            let copies = geometry
                .positions
                .iter()
                .filter(|p| **p == original.positions[corner])
                .count();
            assert_eq!(copies, 3);
        }
        match (&geometry.attributes[0].data, &original.attributes[0].data) {
            (AttributeData::Vec2(after), AttributeData::Vec2(before)) => {
                for (v, p) in geometry.positions.iter().enumerate().skip(8) {
                    let source = original.positions.iter().position(|q| q == p).unwrap();
                    assert_eq!(after[v], before[source]);
                }
            }
            _ => panic!("texcoords changed type"),
        }
    }

    #[test]
    fn test_cube_recompute_with_wide_crease_keeps_corners_merged() {
        let mut geometry = create_cube();
        let report = recompute_normals(&mut geometry, 100f32.to_radians()).unwrap();

        assert_eq!(report.duplicated, 0);
        assert_eq!(geometry.vertex_count(), 8);
        let normals = geometry.normals.as_ref().unwrap();
        for (p, n) in geometry.positions.iter().zip(normals) {
            let outward = (p.coords - Vector3::repeat(0.5)).normalize();
            assert!(n.dot(&outward) > 0.5);
            assert!((n.norm() - 1.0).abs() < EPS);
        }
    }

    #[test]
    fn test_tetrahedron_recompute_averages_faces() {
        let mut geometry = create_tetrahedron();
        let report = recompute_normals(&mut geometry, 120f32.to_radians()).unwrap();

        assert_eq!(report.duplicated, 0);
        assert_eq!(geometry.vertex_count(), 4);

        let normals = geometry.normals.as_ref().unwrap();
        let faces: Vec<[u32; 3]> = geometry.primitives[0]
            .indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();
        for (v, n) in normals.iter().enumerate() {
            let expected = faces
                .iter()
                .filter(|f| f.contains(&(v as u32)))
                .map(|f| face_normal(&geometry, f))
                .fold(Vector3::zeros(), |acc, n| acc + n)
                .normalize();
            assert!((n - expected).norm() < EPS);
            assert!((n - geometry.positions[v].coords.normalize()).norm() < EPS);
        }
    }

    #[test]
    fn test_tetrahedron_sharp_crease_duplicates() {
        let mut geometry = create_tetrahedron();
        let report = recompute_normals(&mut geometry, 90f32.to_radians()).unwrap();

        // Each of the 4 corners splits into its 3 faces.
        assert_eq!(report.duplicated, 8);
        assert_eq!(geometry.vertex_count(), 12);
        assert_eq!(geometry.triangle_count(), 4);
    }

    #[test]
    fn test_recompute_ignores_existing_normals() {
        let mut geometry = create_tetrahedron().with_normals(vec![-Vector3::x(); 4]);
        recompute_normals(&mut geometry, 120f32.to_radians()).unwrap();
        let normals = geometry.normals.as_ref().unwrap();
        for (p, n) in geometry.positions.iter().zip(normals) {
            assert!((n - p.coords.normalize()).norm() < EPS);
        }
    }

    #[test]
    fn test_diagnose_is_idempotent_on_consistent_mesh() {
        let mut geometry = create_shaded_tetrahedron();
        let original = geometry.clone();
        let options = SmoothOptions::default().with_mode(SmoothMode::Diagnose);

        for _ in 0..2 {
            let report = smooth_normals(&mut geometry, &options).unwrap();
            assert_eq!(report.flipped, 0);
            assert_eq!(report.replaced, 0);
            assert_eq!(report.mode, SmoothMode::Diagnose);
            assert_eq!(geometry, original);
        }
    }

    #[test]
    fn test_diagnose_reports_without_fixing() {
        let mut geometry = create_shaded_tetrahedron();
        geometry.normals.as_mut().unwrap()[2] *= -1.0;
        let original = geometry.clone();

        let options = SmoothOptions::default().with_mode(SmoothMode::Diagnose);
        let report = smooth_normals(&mut geometry, &options).unwrap();

        assert_eq!(report.flipped, 1);
        assert!(report.found_flips());
        assert_eq!(geometry, original);
    }

    #[test]
    fn test_smooth_flipped_fixes_only_flipped() {
        let mut geometry = create_shaded_tetrahedron();
        {
            let normals = geometry.normals.as_mut().unwrap();
            normals[2] *= -1.0;
            // Tilted but still facing out: must survive.
            normals[0] = Vector3::new(1.0, 0.0, 0.0);
        }

        let options = SmoothOptions::default()
            .with_mode(SmoothMode::SmoothFlipped)
            .with_crease_angle_degrees(120.0);
        let report = smooth_normals(&mut geometry, &options).unwrap();

        assert_eq!(report.flipped, 1);
        assert_eq!(report.replaced, 1);
        let normals = geometry.normals.as_ref().unwrap();
        assert!((normals[2] - geometry.positions[2].coords.normalize()).norm() < EPS);
        assert_eq!(normals[0], Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_smooth_all_replaces_every_normal() {
        let mut geometry = create_tetrahedron().with_normals(vec![Vector3::new(0.0, 0.0, 1.0); 4]);

        let options = SmoothOptions::default()
            .with_mode(SmoothMode::SmoothAll)
            .with_crease_angle_degrees(120.0);
        let report = smooth_normals(&mut geometry, &options).unwrap();

        assert_eq!(report.replaced, 4);
        assert_eq!(report.duplicated, 0);
        let normals = geometry.normals.as_ref().unwrap();
        for (p, n) in geometry.positions.iter().zip(normals) {
            assert!((n - p.coords.normalize()).norm() < EPS);
        }
    }

    #[test]
    fn test_smooth_all_allocates_missing_normals() {
        let mut geometry = create_tetrahedron();
        let options = SmoothOptions::default().with_mode(SmoothMode::SmoothAll);
        let report = smooth_normals(&mut geometry, &options).unwrap();

        assert_eq!(report.replaced, 4);
        assert_eq!(geometry.normals.as_ref().map(Vec::len), Some(4));
    }

    #[test]
    fn test_smooth_respects_creases_per_raw_vertex() {
        // Cube already split per face: smoothing must keep face normals.
        let mut geometry = create_cube();
        recompute_normals(&mut geometry, 45f32.to_radians()).unwrap();
        let split = geometry.clone();

        let options = SmoothOptions::default()
            .with_mode(SmoothMode::SmoothAll)
            .with_crease_angle_degrees(45.0);
        let report = smooth_normals(&mut geometry, &options).unwrap();

        assert_eq!(report.flipped, 0);
        assert_eq!(report.duplicated, 0);
        let before = split.normals.as_ref().unwrap();
        let after = geometry.normals.as_ref().unwrap();
        for (a, b) in before.iter().zip(after) {
            assert!((a - b).norm() < EPS);
        }
    }

    #[test]
    fn test_missing_normals_abort_diagnose() {
        let mut geometry = create_tetrahedron();
        let original = geometry.clone();
        let result = smooth_normals(&mut geometry, &SmoothOptions::default());
        assert_eq!(result.unwrap_err(), MeshError::MissingBuffer { buffer: "normal" });
        assert_eq!(geometry, original);
    }

    #[test]
    fn test_mismatched_normals_abort() {
        let mut geometry = create_tetrahedron().with_normals(vec![Vector3::z(); 3]);
        let original = geometry.clone();
        let options = SmoothOptions::default().with_mode(SmoothMode::SmoothFlipped);
        let err = smooth_normals(&mut geometry, &options).unwrap_err();
        assert!(matches!(err, MeshError::BufferLengthMismatch { expected: 4, actual: 3, .. }));
        assert_eq!(geometry, original);
    }

    #[test]
    fn test_strip_is_left_untouched() {
        let mut geometry = create_cube()
            .with_primitive(Primitive::new(DrawMode::TriangleStrip, vec![0, 1, 2, 3]));
        let original = geometry.clone();

        let err = recompute_normals(&mut geometry, 0.5).unwrap_err();
        assert!(err.is_topology());
        assert_eq!(geometry, original);
    }

    #[test]
    fn test_empty_positions_abort() {
        let mut geometry = Geometry::new("empty", Vec::new());
        let err = recompute_normals(&mut geometry, 0.5).unwrap_err();
        assert_eq!(err, MeshError::MissingBuffer { buffer: "position" });
    }

    #[test]
    fn test_invalid_crease_angle() {
        let mut geometry = create_cube();
        let err = recompute_normals(&mut geometry, -1.0).unwrap_err();
        assert!(matches!(err, MeshError::InvalidParameter { name: "crease_angle", .. }));
    }

    #[test]
    fn test_degenerate_triangles_leave_normals_untouched() {
        let mut geometry = Geometry::new(
            "sliver",
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
        )
        .with_normals(vec![Vector3::y(); 3])
        .with_primitive(Primitive::triangles(&[[0, 1, 2]]));

        let options = SmoothOptions::default().with_mode(SmoothMode::SmoothAll);
        let report = smooth_normals(&mut geometry, &options).unwrap();

        assert_eq!(report.degenerate, 3);
        assert_eq!(report.replaced, 0);
        assert_eq!(geometry.normals.as_ref().unwrap(), &vec![Vector3::y(); 3]);
    }

    #[test]
    fn test_rebuild_keeps_line_groups_and_order() {
        let mut geometry = create_cube()
            .with_primitive(Primitive::new(DrawMode::Lines, vec![0, 7]))
            .with_primitive(Primitive::triangles(&[[0, 2, 3]]));

        recompute_normals(&mut geometry, 45f32.to_radians()).unwrap();

        assert_eq!(geometry.primitives.len(), 2);
        assert_eq!(geometry.primitives[0].mode, DrawMode::Triangles);
        assert_eq!(geometry.primitives[0].indices.len(), 13 * 3);
        assert_eq!(geometry.primitives[1], Primitive::new(DrawMode::Lines, vec![0, 7]));
        assert_indices_in_bounds(&geometry);
    }

    #[test]
    fn test_no_duplication_keeps_primitive_groups() {
        let mut geometry = create_tetrahedron()
            .with_primitive(Primitive::triangles(&[[0, 1, 2]]));
        let primitives = geometry.primitives.clone();

        recompute_normals(&mut geometry, 120f32.to_radians()).unwrap();
        assert_eq!(geometry.primitives, primitives);
    }

    #[test]
    fn test_borrowed_connectivity_refuses_recompute() {
        let base = create_tetrahedron();
        let mut target = Geometry::new("target", base.positions.clone());
        let options = SmoothOptions::default().with_mode(SmoothMode::Recompute);

        let result = NormalSmoother::<u32>::with_connectivity(&mut target, &base.primitives, &options);
        assert!(matches!(result, Err(MeshError::InvalidParameter { name: "mode", .. })));
    }

    /// A folded pair of triangles padded with unreferenced vertices up to
    /// `vertex_count`.
    fn create_padded_fold(vertex_count: usize) -> Geometry {
        let mut positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        positions.resize(vertex_count, Point3::new(5.0, 5.0, 5.0));
        Geometry::new("padded", positions)
            .with_primitive(Primitive::triangles(&[[0, 1, 2], [1, 0, 3]]))
    }

    #[test]
    fn test_narrow_index_width_rejects_large_mesh() {
        let mut geometry = create_padded_fold(70_001);
        geometry.positions[70_000] = Point3::new(5.0, 6.0, 5.0);
        geometry.primitives[0].indices.extend_from_slice(&[0, 69_999, 70_000]);
        let original = geometry.clone();

        let options = SmoothOptions::default().with_mode(SmoothMode::Recompute);
        let err = NormalSmoother::<u16>::new(&mut geometry, &options).unwrap_err();

        assert_eq!(
            err,
            MeshError::IndexOverflow {
                element: "vertices",
                count: 70_001,
                width: "u16",
            }
        );
        assert_eq!(geometry, original);

        // The same mesh is fine with 32-bit indices.
        let report = smooth_normals(&mut geometry, &options).unwrap();
        assert_eq!(report.degenerate, 0);
    }

    #[test]
    fn test_duplication_past_index_width_is_refused() {
        // Exactly as many vertices as u16 addresses; the fold needs two more.
        let mut geometry = create_padded_fold(65_536);
        let original = geometry.clone();

        let options = SmoothOptions::default()
            .with_mode(SmoothMode::Recompute)
            .with_crease_angle_degrees(45.0);
        let smoother = NormalSmoother::<u16>::new(&mut geometry, &options).unwrap();
        let err = smoother.run().unwrap_err();

        assert_eq!(
            err,
            MeshError::IndexOverflow {
                element: "vertices",
                count: 65_538,
                width: "u16",
            }
        );
        assert_eq!(geometry, original);
    }

    #[test]
    fn test_run_with_progress_reports_completion() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let last = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&last);
        let progress = Progress::new(move |current, total, _| {
            assert!(current <= total);
            sink.store(current, Ordering::Relaxed);
        });

        let mut geometry = create_cube();
        let options = SmoothOptions::default().with_mode(SmoothMode::Recompute);
        let smoother: NormalSmoother<'_, u16> = NormalSmoother::new(&mut geometry, &options).unwrap();
        assert_eq!(smoother.graph().num_identities(), 8);
        smoother.run_with_progress(&progress).unwrap();

        assert_eq!(last.load(Ordering::Relaxed), 8);
    }
}
