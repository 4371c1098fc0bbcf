//! Batch processing of shared mesh resources.
//!
//! Scenes reference the same mesh from many places. [`smooth_batch`] walks
//! every reference, keeps the first occurrence of each resource (by `Arc`
//! identity) and smooths each unique resource exactly once, in parallel when
//! the options allow it. Failures are reported per geometry and never stop
//! the batch.
//!
//! # Example
//!
//! ```
//! use meshprep::algo::normals::SmoothOptions;
//! use meshprep::dispatch::{shared, smooth_batch, MeshResource};
//! use meshprep::mesh::{Geometry, Primitive};
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
//! // Referenced twice, smoothed once.
//! let report = smooth_batch([&mesh, &mesh], &SmoothOptions::default()).unwrap();
//! assert_eq!(report.meshes, 1);
//! assert_eq!(report.processed, 1);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::algo::normals::{smooth_normals, NormalSmoother, SmoothMode, SmoothOptions};
use crate::diagnostics::BatchReport;
use crate::error::{MeshError, Result};
use crate::mesh::Geometry;

/// An alternate set of vertex buffers for a morph geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphTarget {
    /// Target name.
    pub name: String,
    /// Vertex buffers. Primitive groups, if any, are ignored in favor of the
    /// base's.
    pub geometry: Geometry,
}

impl MorphTarget {
    /// Create a morph target.
    pub fn new(name: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            name: name.into(),
            geometry,
        }
    }
}

/// A base geometry plus morph targets sharing its connectivity.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphGeometry {
    /// Base geometry, owning the primitive groups.
    pub base: Geometry,
    /// Targets, each aligned vertex-for-vertex with the base.
    pub targets: Vec<MorphTarget>,
}

impl MorphGeometry {
    /// Create a morph geometry without targets.
    pub fn new(base: Geometry) -> Self {
        Self {
            base,
            targets: Vec::new(),
        }
    }

    /// Add a target.
    pub fn with_target(mut self, target: MorphTarget) -> Self {
        self.targets.push(target);
        self
    }
}

/// A mesh resource as referenced by a scene.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshResource {
    /// A single geometry.
    Plain(Geometry),
    /// A geometry with morph targets.
    Morph(MorphGeometry),
}

impl MeshResource {
    /// Name of the resource, taken from its (base) geometry.
    pub fn name(&self) -> &str {
        match self {
            MeshResource::Plain(geometry) => &geometry.name,
            MeshResource::Morph(morph) => &morph.base.name,
        }
    }

    /// Smooth this resource and report the outcome of every geometry in it.
    pub fn smooth(&mut self, options: &SmoothOptions) -> BatchReport {
        let mut report = BatchReport::new();
        report.meshes = 1;
        match self {
            MeshResource::Plain(geometry) => smooth_plain(geometry, options, &mut report),
            MeshResource::Morph(morph) => smooth_morph(morph, options, &mut report),
        }
        report
    }
}

/// A mesh resource that may be referenced from many places.
pub type SharedMesh = Arc<Mutex<MeshResource>>;

/// Wrap a resource for sharing.
pub fn shared(resource: MeshResource) -> SharedMesh {
    Arc::new(Mutex::new(resource))
}

/// Mode used for a plain geometry: without normals there is nothing to
/// diagnose or fix, so they are recomputed.
fn select_mode(geometry: &Geometry, options: &SmoothOptions) -> SmoothMode {
    if geometry.normals.is_none() {
        SmoothMode::Recompute
    } else {
        options.mode
    }
}

fn smooth_plain(geometry: &mut Geometry, options: &SmoothOptions, report: &mut BatchReport) {
    let options = options.clone().with_mode(select_mode(geometry, options));
    match smooth_normals(geometry, &options) {
        Ok(outcome) => report.record(&geometry.name, &outcome),
        Err(error) => report.record_error(&geometry.name, error),
    }
}

/// Smooth a morph geometry over the base's connectivity.
///
/// The base runs in the mode [`select_mode`] picks, with the caller's crease
/// angle, except that `Recompute` becomes `SmoothAll`: duplicating base
/// vertices would leave the targets misaligned. Targets are always
/// force-smoothed with the caller's crease angle. `SmoothAll` never
/// duplicates, so the crease angle only shapes the averages.
fn smooth_morph(morph: &mut MorphGeometry, options: &SmoothOptions, report: &mut BatchReport) {
    let base_mode = match select_mode(&morph.base, options) {
        SmoothMode::Recompute => SmoothMode::SmoothAll,
        mode => mode,
    };
    let base_options = options.clone().with_mode(base_mode);
    let target_options = options.clone().with_mode(SmoothMode::SmoothAll);
    let primitives = morph.base.primitives.clone();

    let base = NormalSmoother::<u32>::with_connectivity(&mut morph.base, &primitives, &base_options)
        .and_then(NormalSmoother::run);
    match base {
        Ok(outcome) => report.record(&morph.base.name, &outcome),
        Err(error) => {
            let connectivity = rejects_connectivity(&error);
            report.record_error(&morph.base.name, error);
            if connectivity {
                return;
            }
        }
    }

    let expected = morph.base.vertex_count();
    for target in &mut morph.targets {
        let name = format!("{}/{}", morph.base.name, target.name);
        let actual = target.geometry.vertex_count();
        if actual != expected {
            report.record_error(
                &name,
                MeshError::BufferLengthMismatch {
                    buffer: "morph target position".to_string(),
                    expected,
                    actual,
                },
            );
            continue;
        }

        let outcome =
            NormalSmoother::<u32>::with_connectivity(&mut target.geometry, &primitives, &target_options)
                .and_then(NormalSmoother::run);
        match outcome {
            Ok(outcome) => report.record(&name, &outcome),
            Err(error) => report.record_error(&name, error),
        }
    }
}

/// Whether a base failure also rules out its targets, which share its
/// primitive groups.
fn rejects_connectivity(error: &MeshError) -> bool {
    matches!(
        error,
        MeshError::UnsupportedTopology { .. }
            | MeshError::InvalidVertexIndex { .. }
            | MeshError::IndexOverflow { .. }
    )
}

/// Collects each distinct shared mesh once, in first-seen order.
///
/// Identity is the `Arc` allocation, not the contents: two equal meshes in
/// separate allocations are both kept. The visitor holds a clone of every
/// kept `Arc`, so addresses cannot be reused while it lives.
///
/// The memo table is not synchronized; share a visitor across threads only
/// behind a lock.
#[derive(Debug, Default)]
pub struct UniqueMeshVisitor {
    seen: HashSet<*const Mutex<MeshResource>>,
    meshes: Vec<SharedMesh>,
}

impl UniqueMeshVisitor {
    /// Create an empty visitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Visit a reference. Returns `true` if the mesh was not seen before.
    pub fn visit(&mut self, mesh: &SharedMesh) -> bool {
        if !self.seen.insert(Arc::as_ptr(mesh)) {
            return false;
        }
        self.meshes.push(Arc::clone(mesh));
        true
    }

    /// Number of distinct meshes seen.
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Whether nothing was visited.
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// The distinct meshes, in first-seen order.
    pub fn finish(self) -> Vec<SharedMesh> {
        self.meshes
    }
}

/// Smooth every distinct mesh among `meshes` exactly once.
///
/// Geometries without normals are recomputed; others use `options.mode`.
/// Morph geometries are force-smoothed over their base connectivity.
///
/// # Errors
///
/// Returns [`MeshError::InvalidParameter`] if `options` fail validation.
/// Per-mesh failures are diagnostics in the returned report.
pub fn smooth_batch<'a, M>(meshes: M, options: &SmoothOptions) -> Result<BatchReport>
where
    M: IntoIterator<Item = &'a SharedMesh>,
{
    options.validate()?;

    let mut visitor = UniqueMeshVisitor::new();
    let mut references = 0usize;
    for mesh in meshes {
        references += 1;
        visitor.visit(mesh);
    }
    let unique = visitor.finish();
    log::debug!("smoothing {} unique meshes ({} references)", unique.len(), references);

    let reports: Vec<BatchReport> = if options.parallel {
        unique
            .par_iter()
            .map(|mesh| mesh.lock().smooth(options))
            .collect()
    } else {
        unique.iter().map(|mesh| mesh.lock().smooth(options)).collect()
    };

    let mut batch = BatchReport::new();
    for report in reports {
        batch.merge(report);
    }
    Ok(batch)
}
