//! Indexed geometry buffers.
//!
//! A [`Geometry`] is the buffer set handed over by a loader: a position
//! array, an optional normal array, any number of extra vertex attributes and
//! a list of primitive groups indexing into them. Every per-vertex buffer is
//! index-aligned with the positions; [`Geometry::duplicate_vertex`] is the only
//! way the smoother grows them, so they always grow together.

use std::fmt;

use nalgebra::{Point3, Vector2, Vector3, Vector4};

use crate::error::{MeshError, Result};

/// How a primitive group assembles its indices into primitives.
///
/// Variants are ordered by complexity: everything after
/// [`DrawMode::Triangles`] must be triangulated before smoothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DrawMode {
    /// Each index is a point.
    Points,
    /// Every two indices form a line.
    Lines,
    /// Closed loop of lines.
    LineLoop,
    /// Connected strip of lines.
    LineStrip,
    /// Every three indices form an independent triangle.
    #[default]
    Triangles,
    /// Connected strip of triangles.
    TriangleStrip,
    /// Fan of triangles around the first index.
    TriangleFan,
    /// Every four indices form a quad.
    Quads,
    /// Connected strip of quads.
    QuadStrip,
    /// A single convex polygon.
    Polygon,
}

impl DrawMode {
    /// Whether primitives of this mode need triangulating before they can be
    /// smoothed.
    pub fn requires_triangulation(self) -> bool {
        self > DrawMode::Triangles
    }
}

/// A primitive group: a draw mode plus an ordered list of raw vertex indices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Primitive {
    /// Draw mode.
    pub mode: DrawMode,
    /// Raw vertex indices.
    pub indices: Vec<u32>,
}

impl Primitive {
    /// Create a primitive group.
    pub fn new(mode: DrawMode, indices: Vec<u32>) -> Self {
        Self { mode, indices }
    }

    /// Create an independent triangle list from index triples.
    pub fn triangles(triangles: &[[u32; 3]]) -> Self {
        Self::new(
            DrawMode::Triangles,
            triangles.iter().flat_map(|t| t.iter().copied()).collect(),
        )
    }

    /// Number of complete triangles if this is a triangle list, zero otherwise.
    pub fn triangle_count(&self) -> usize {
        if self.mode == DrawMode::Triangles {
            self.indices.len() / 3
        } else {
            0
        }
    }
}

/// How an attribute array is bound to the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Binding {
    /// One entry per vertex, aligned with the positions.
    #[default]
    PerVertex,
    /// A single value for the whole geometry.
    Overall,
}

/// What an attribute array means to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSemantic {
    /// Primary vertex color.
    Color,
    /// Secondary vertex color.
    SecondaryColor,
    /// Fog coordinate.
    FogCoord,
    /// Texture coordinates for the given unit.
    TexCoord(u32),
    /// Tangent frame, usually from a tangent-space generator.
    Tangent,
    /// Skinning joint indices.
    Joints(u32),
    /// Skinning weights.
    Weights(u32),
    /// Any other generic vertex attribute slot.
    Generic(u32),
}

impl fmt::Display for AttributeSemantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeSemantic::Color => write!(f, "color"),
            AttributeSemantic::SecondaryColor => write!(f, "secondary color"),
            AttributeSemantic::FogCoord => write!(f, "fog coordinate"),
            AttributeSemantic::TexCoord(unit) => write!(f, "texcoord{}", unit),
            AttributeSemantic::Tangent => write!(f, "tangent"),
            AttributeSemantic::Joints(set) => write!(f, "joints{}", set),
            AttributeSemantic::Weights(set) => write!(f, "weights{}", set),
            AttributeSemantic::Generic(slot) => write!(f, "attribute{}", slot),
        }
    }
}

/// Typed storage of an attribute array.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    /// Scalar floats.
    Float(Vec<f32>),
    /// Two-component floats.
    Vec2(Vec<Vector2<f32>>),
    /// Three-component floats.
    Vec3(Vec<Vector3<f32>>),
    /// Four-component floats.
    Vec4(Vec<Vector4<f32>>),
    /// Four unsigned shorts, as used for joint indices.
    UShort4(Vec<[u16; 4]>),
}

impl AttributeData {
    /// Number of entries.
    pub fn len(&self) -> usize {
        match self {
            AttributeData::Float(v) => v.len(),
            AttributeData::Vec2(v) => v.len(),
            AttributeData::Vec3(v) => v.len(),
            AttributeData::Vec4(v) => v.len(),
            AttributeData::UShort4(v) => v.len(),
        }
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a copy of entry `index`.
    fn push_copy(&mut self, index: usize) {
        match self {
            AttributeData::Float(v) => v.push(v[index]),
            AttributeData::Vec2(v) => v.push(v[index]),
            AttributeData::Vec3(v) => v.push(v[index]),
            AttributeData::Vec4(v) => v.push(v[index]),
            AttributeData::UShort4(v) => v.push(v[index]),
        }
    }

    /// Append the exact bit pattern of entry `index` to `key`.
    pub(crate) fn extend_key(&self, index: usize, key: &mut Vec<u32>) {
        match self {
            AttributeData::Float(v) => key.push(v[index].to_bits()),
            AttributeData::Vec2(v) => key.extend(v[index].iter().map(|c| c.to_bits())),
            AttributeData::Vec3(v) => key.extend(v[index].iter().map(|c| c.to_bits())),
            AttributeData::Vec4(v) => key.extend(v[index].iter().map(|c| c.to_bits())),
            AttributeData::UShort4(v) => key.extend(v[index].iter().map(|&c| u32::from(c))),
        }
    }
}

/// A named attribute array with its binding.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute {
    /// What the attribute means.
    pub semantic: AttributeSemantic,
    /// How it is bound.
    pub binding: Binding,
    /// The values.
    pub data: AttributeData,
}

impl VertexAttribute {
    /// Create a per-vertex attribute.
    pub fn per_vertex(semantic: AttributeSemantic, data: AttributeData) -> Self {
        Self {
            semantic,
            binding: Binding::PerVertex,
            data,
        }
    }

    /// Create an attribute with a single value for the whole geometry.
    pub fn overall(semantic: AttributeSemantic, data: AttributeData) -> Self {
        Self {
            semantic,
            binding: Binding::Overall,
            data,
        }
    }

    /// Whether this attribute must stay aligned with the positions.
    #[inline]
    pub fn is_per_vertex(&self) -> bool {
        self.binding == Binding::PerVertex
    }
}

/// The buffer set of one drawable mesh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    /// Name used in diagnostics.
    pub name: String,
    /// Vertex positions.
    pub positions: Vec<Point3<f32>>,
    /// Per-vertex normals, if any.
    pub normals: Option<Vec<Vector3<f32>>>,
    /// Additional attribute arrays.
    pub attributes: Vec<VertexAttribute>,
    /// Primitive groups.
    pub primitives: Vec<Primitive>,
}

impl Geometry {
    /// Create a geometry from positions only.
    pub fn new(name: impl Into<String>, positions: Vec<Point3<f32>>) -> Self {
        Self {
            name: name.into(),
            positions,
            ..Self::default()
        }
    }

    /// Set the normal array.
    pub fn with_normals(mut self, normals: Vec<Vector3<f32>>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Add an attribute array.
    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add a primitive group.
    pub fn with_primitive(mut self, primitive: Primitive) -> Self {
        self.primitives.push(primitive);
        self
    }

    /// Number of raw vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles across all triangle-list groups.
    pub fn triangle_count(&self) -> usize {
        self.primitives.iter().map(Primitive::triangle_count).sum()
    }

    /// Iterate over the per-vertex attribute arrays.
    pub fn per_vertex_attributes(&self) -> impl Iterator<Item = &VertexAttribute> + '_ {
        self.attributes.iter().filter(|a| a.is_per_vertex())
    }

    /// Check that every per-vertex attribute is aligned with the positions.
    ///
    /// Normals are not checked here; their absence or length is judged by the
    /// smoothing mode.
    pub fn validate_per_vertex_buffers(&self) -> Result<()> {
        let expected = self.vertex_count();
        for attribute in self.per_vertex_attributes() {
            if attribute.data.len() != expected {
                return Err(MeshError::BufferLengthMismatch {
                    buffer: attribute.semantic.to_string(),
                    expected,
                    actual: attribute.data.len(),
                });
            }
        }
        Ok(())
    }

    /// Append a copy of vertex `source` to every per-vertex buffer and return
    /// the new vertex index.
    ///
    /// # Panics
    /// Panics if `source` is out of range.
    pub fn duplicate_vertex(&mut self, source: usize) -> usize {
        let new_index = self.positions.len();
        self.positions.push(self.positions[source]);

        if let Some(normals) = self.normals.as_mut() {
            if source < normals.len() {
                normals.push(normals[source]);
            }
        }

        for attribute in self.attributes.iter_mut().filter(|a| a.is_per_vertex()) {
            attribute.data.push_copy(source);
        }

        new_index
    }
}
