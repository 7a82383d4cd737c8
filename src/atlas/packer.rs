//! Reference atlas builder: one chart per triangle, packed on a grid.

use anyhow::{ensure, Result};
use glam::{Vec2, Vec3};

use super::{AtlasBuilder, AtlasMesh, AtlasVertex, ChartOptions, MeshDecl};

struct InputMesh {
    positions: Vec<[f32; 3]>,
    indices: Vec<u32>,
}

/// Trivial [`AtlasBuilder`] implementation.
///
/// Every triangle becomes its own chart, projected along its dominant
/// normal axis and scaled into a uniform grid cell. Texel utilization is
/// poor compared to a real unwrapper, but the output is deterministic,
/// seam-free per chart, and honors the full builder contract, which makes
/// it a usable default and a stable test double.
pub struct GridPacker {
    inputs: Vec<InputMesh>,
    projected: Vec<Vec<[Vec2; 3]>>,
    meshes: Vec<AtlasMesh>,
    resolution: u32,
    padding: f32,
}

impl GridPacker {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            projected: Vec::new(),
            meshes: Vec::new(),
            resolution: 1024,
            padding: 2.0,
        }
    }
}

impl Default for GridPacker {
    fn default() -> Self {
        Self::new()
    }
}

impl AtlasBuilder for GridPacker {
    fn add_mesh(&mut self, decl: &MeshDecl) -> Result<()> {
        ensure!(
            decl.index_count % 3 == 0,
            "index count {} is not a multiple of three",
            decl.index_count
        );
        let positions: Vec<[f32; 3]> = (0..decl.vertex_count as usize)
            .map(|i| decl.positions.vec3(i))
            .collect();
        let indices: Vec<u32> = (0..decl.index_count as usize)
            .map(|i| decl.index(i))
            .collect();
        if let Some(&bad) = indices.iter().find(|&&i| i >= decl.vertex_count) {
            anyhow::bail!("index {} out of range for {} vertices", bad, decl.vertex_count);
        }
        self.inputs.push(InputMesh { positions, indices });
        Ok(())
    }

    fn compute_charts(&mut self, options: &ChartOptions) {
        // Charts are fixed at one triangle each; only the packing
        // parameters come from the options.
        self.resolution = options.resolution.max(1);
        self.padding = options.padding as f32;
    }

    fn parameterize_charts(&mut self) {
        self.projected = self
            .inputs
            .iter()
            .map(|mesh| {
                mesh.indices
                    .chunks_exact(3)
                    .map(|tri| project_triangle(mesh, tri))
                    .collect()
            })
            .collect();
    }

    fn pack_charts(&mut self) {
        let total: usize = self.projected.iter().map(Vec::len).sum();
        let cols = (total as f32).sqrt().ceil().max(1.0) as usize;
        let cell = self.resolution as f32 / cols as f32;
        let avail = (cell - 2.0 * self.padding).max(f32::EPSILON);

        let mut slot = 0usize;
        self.meshes = self
            .projected
            .iter()
            .zip(&self.inputs)
            .map(|(charts, mesh)| {
                let mut out = AtlasMesh::default();
                for (chart, tri) in charts.iter().zip(mesh.indices.chunks_exact(3)) {
                    let corner = Vec2::new(
                        (slot % cols) as f32 * cell + self.padding,
                        (slot / cols) as f32 * cell + self.padding,
                    );
                    slot += 1;
                    let extent = chart[0].max(chart[1]).max(chart[2]);
                    let scale = if extent.max_element() > 0.0 {
                        avail / extent.max_element()
                    } else {
                        0.0
                    };
                    let base = out.vertices.len() as u32;
                    for (uv, &xref) in chart.iter().zip(tri) {
                        out.vertices.push(AtlasVertex {
                            uv: (corner + *uv * scale).to_array(),
                            xref,
                        });
                    }
                    out.indices.extend([base, base + 1, base + 2]);
                }
                out
            })
            .collect();
    }

    fn width(&self) -> u32 {
        self.resolution
    }

    fn height(&self) -> u32 {
        self.resolution
    }

    fn meshes(&self) -> &[AtlasMesh] {
        &self.meshes
    }
}

/// Project one triangle to 2D by dropping its dominant normal axis and
/// translating the result to the origin.
fn project_triangle(mesh: &InputMesh, tri: &[u32]) -> [Vec2; 3] {
    let p0 = Vec3::from(mesh.positions[tri[0] as usize]);
    let p1 = Vec3::from(mesh.positions[tri[1] as usize]);
    let p2 = Vec3::from(mesh.positions[tri[2] as usize]);
    let normal = (p1 - p0).cross(p2 - p0).abs();

    let flatten = |p: Vec3| -> Vec2 {
        if normal.x >= normal.y && normal.x >= normal.z {
            Vec2::new(p.y, p.z)
        } else if normal.y >= normal.z {
            Vec2::new(p.x, p.z)
        } else {
            Vec2::new(p.x, p.y)
        }
    };

    let (a, b, c) = (flatten(p0), flatten(p1), flatten(p2));
    let origin = a.min(b).min(c);
    [a - origin, b - origin, c - origin]
}
