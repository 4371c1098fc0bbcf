//! Per-mesh outcome reporting.
//!
//! Every mesh processed by a batch produces at most one [`Diagnostic`]:
//! skipped meshes produce a warning, meshes with flipped normals or
//! recomputed normals produce a note. Diagnostics are written to the `log`
//! facade as they are created and collected in a [`BatchReport`] for tooling.

use std::fmt;

use crate::algo::normals::{SmoothMode, SmoothReport};
use crate::error::MeshError;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational outcome.
    Info,
    /// The mesh was skipped or still carries inconsistent normals.
    Warning,
}

impl Severity {
    fn level(self) -> log::Level {
        match self {
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
        }
    }
}

/// What happened to a mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// A primitive group must be triangulated first. The mesh is unmodified.
    UnsupportedTopology(MeshError),
    /// Buffers were absent, misaligned or out of range. The mesh is
    /// unmodified.
    InvalidBuffers(MeshError),
    /// Stored normals disagreed with their one-ring average.
    FlippedNormals {
        /// Mode that found them. Only `Diagnose` leaves them in place.
        mode: SmoothMode,
        /// Number of flipped normals.
        count: usize,
    },
    /// Normals were recomputed from scratch.
    Recomputed {
        /// Vertices appended across creases.
        duplicated: usize,
    },
}

/// A single per-mesh outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// How serious the outcome is.
    pub severity: Severity,
    /// Name of the mesh it concerns.
    pub mesh: String,
    /// The outcome.
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// Create a diagnostic.
    pub fn new(severity: Severity, mesh: impl Into<String>, kind: DiagnosticKind) -> Self {
        Self {
            severity,
            mesh: mesh.into(),
            kind,
        }
    }

    /// Diagnostic for a mesh that was skipped because of `error`.
    pub fn from_error(mesh: impl Into<String>, error: MeshError) -> Self {
        let kind = if error.is_topology() {
            DiagnosticKind::UnsupportedTopology(error)
        } else {
            DiagnosticKind::InvalidBuffers(error)
        };
        Self::new(Severity::Warning, mesh, kind)
    }

    /// Diagnostic for a completed pass, if it has anything to say.
    ///
    /// Flips found in `Diagnose` mode are warnings since they remain in the
    /// mesh; flips that were fixed and recomputations are informational.
    pub fn from_report(mesh: impl Into<String>, report: &SmoothReport) -> Option<Self> {
        if report.mode == SmoothMode::Recompute {
            return Some(Self::new(
                Severity::Info,
                mesh,
                DiagnosticKind::Recomputed {
                    duplicated: report.duplicated,
                },
            ));
        }

        if !report.found_flips() {
            return None;
        }

        let severity = if report.mode.mutates() {
            Severity::Info
        } else {
            Severity::Warning
        };
        Some(Self::new(
            severity,
            mesh,
            DiagnosticKind::FlippedNormals {
                mode: report.mode,
                count: report.flipped,
            },
        ))
    }

    /// Whether this diagnostic is a warning.
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Whether the mesh was left unprocessed.
    pub fn is_skip(&self) -> bool {
        matches!(
            self.kind,
            DiagnosticKind::UnsupportedTopology(_) | DiagnosticKind::InvalidBuffers(_)
        )
    }

    /// Write this diagnostic to the `log` facade at its severity.
    pub fn emit(&self) {
        log::log!(self.severity.level(), "{}", self);
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh '{}': ", self.mesh)?;
        match &self.kind {
            DiagnosticKind::UnsupportedTopology(error) => {
                write!(f, "skipped, triangulate first ({})", error)
            }
            DiagnosticKind::InvalidBuffers(error) => write!(f, "skipped ({})", error),
            DiagnosticKind::FlippedNormals { mode, count } if mode.mutates() => {
                write!(f, "{} flipped normals fixed by {}", count, mode)
            }
            DiagnosticKind::FlippedNormals { count, .. } => {
                write!(f, "{} flipped normals found", count)
            }
            DiagnosticKind::Recomputed { duplicated } => {
                write!(f, "normals recomputed, {} vertices duplicated", duplicated)
            }
        }
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Number of unique meshes visited.
    pub meshes: usize,
    /// Number of geometries (bases and morph targets) smoothed successfully.
    pub processed: usize,
    /// Diagnostics in visiting order.
    pub diagnostics: Vec<Diagnostic>,
}

impl BatchReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a diagnostic and keep it.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        diagnostic.emit();
        self.diagnostics.push(diagnostic);
    }

    /// Record a successful pass, keeping its diagnostic if any.
    pub fn record(&mut self, mesh: &str, report: &SmoothReport) {
        self.processed += 1;
        if let Some(diagnostic) = Diagnostic::from_report(mesh, report) {
            self.push(diagnostic);
        }
    }

    /// Record a pass that was refused.
    pub fn record_error(&mut self, mesh: &str, error: MeshError) {
        self.push(Diagnostic::from_error(mesh, error));
    }

    /// Append another report, keeping its diagnostics in order.
    pub fn merge(&mut self, other: BatchReport) {
        self.meshes += other.meshes;
        self.processed += other.processed;
        self.diagnostics.extend(other.diagnostics);
    }

    /// Iterate over the warnings.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.diagnostics.iter().filter(|d| d.is_warning())
    }

    /// Whether any warning was raised.
    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    /// Number of geometries that were skipped.
    pub fn skipped(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_skip()).count()
    }

    /// Total flipped normals across the batch.
    pub fn flipped(&self) -> usize {
        self.diagnostics
            .iter()
            .map(|d| match d.kind {
                DiagnosticKind::FlippedNormals { count, .. } => count,
                _ => 0,
            })
            .sum()
    }

    /// Total vertices duplicated by recomputation across the batch.
    pub fn duplicated(&self) -> usize {
        self.diagnostics
            .iter()
            .map(|d| match d.kind {
                DiagnosticKind::Recomputed { duplicated } => duplicated,
                _ => 0,
            })
            .sum()
    }
}
