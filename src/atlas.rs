//! Atlas-builder contract and the built-in reference packer.
//!
//! The chart unwrapper is an external collaborator. The pipeline submits
//! raw vertex streams for every mesh, drives chart computation,
//! parameterization, and packing in that order, and reads back per-mesh
//! vertices carrying an atlas-space UV pair plus an `xref` to the source
//! vertex they originated from.

mod packer;

pub use packer::GridPacker;

use anyhow::Result;

/// Options forwarded to chart computation and packing.
#[derive(Debug, Clone)]
pub struct ChartOptions {
    /// Atlas width and height in texels.
    pub resolution: u32,
    /// Clearance around each chart in texels.
    pub padding: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            resolution: 1024,
            padding: 2,
        }
    }
}

/// One vertex stream of a mesh declaration: base bytes plus stride.
#[derive(Clone, Copy)]
pub struct VertexStream<'a> {
    pub data: &'a [u8],
    pub stride: usize,
}

impl VertexStream<'_> {
    pub fn vec2(&self, index: usize) -> [f32; 2] {
        let base = index * self.stride;
        [self.f32_at(base), self.f32_at(base + 4)]
    }

    pub fn vec3(&self, index: usize) -> [f32; 3] {
        let base = index * self.stride;
        [
            self.f32_at(base),
            self.f32_at(base + 4),
            self.f32_at(base + 8),
        ]
    }

    fn f32_at(&self, offset: usize) -> f32 {
        f32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }
}

/// Raw geometry streams submitted for one mesh. Positions are packed fp32
/// vec3 and indices packed little-endian u32, which the flattening stage
/// guarantees; normals and UVs are optional quality hints.
pub struct MeshDecl<'a> {
    pub vertex_count: u32,
    pub positions: VertexStream<'a>,
    pub normals: Option<VertexStream<'a>>,
    pub uvs: Option<VertexStream<'a>>,
    pub index_data: &'a [u8],
    pub index_count: u32,
}

impl MeshDecl<'_> {
    pub fn index(&self, i: usize) -> u32 {
        let base = i * 4;
        u32::from_le_bytes([
            self.index_data[base],
            self.index_data[base + 1],
            self.index_data[base + 2],
            self.index_data[base + 3],
        ])
    }
}

/// A vertex emitted by the atlas builder: its UV pair in atlas space and
/// the source-vertex index it originated from.
#[derive(Debug, Clone, Copy)]
pub struct AtlasVertex {
    pub uv: [f32; 2],
    pub xref: u32,
}

/// Per-mesh atlas output.
#[derive(Debug, Default, Clone)]
pub struct AtlasMesh {
    pub vertices: Vec<AtlasVertex>,
    pub indices: Vec<u32>,
}

/// A chart-based UV unwrapper.
///
/// Drivers call [`add_mesh`](Self::add_mesh) once per mesh, then
/// [`compute_charts`](Self::compute_charts),
/// [`parameterize_charts`](Self::parameterize_charts), and
/// [`pack_charts`](Self::pack_charts) in that order, and finally read the
/// results back through [`meshes`](Self::meshes).
pub trait AtlasBuilder {
    fn add_mesh(&mut self, decl: &MeshDecl) -> Result<()>;
    fn compute_charts(&mut self, options: &ChartOptions);
    fn parameterize_charts(&mut self);
    fn pack_charts(&mut self);
    /// Atlas width in texels; baked U coordinates lie in `[0, width]`.
    fn width(&self) -> u32;
    /// Atlas height in texels; baked V coordinates lie in `[0, height]`.
    fn height(&self) -> u32;
    /// One entry per added mesh, in submission order.
    fn meshes(&self) -> &[AtlasMesh];
}
