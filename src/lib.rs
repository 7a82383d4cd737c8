//! uvbake library
//!
//! Prepares arbitrary glTF scenes for per-texel lightmap baking (e.g.
//! ambient occlusion) in three stages:
//!
//! 1. **Buffer flattening** - every binary buffer is aggregated into one
//!    contiguous buffer and all buffer views are re-offset into it.
//! 2. **Primitive flattening** - node transforms are baked into world-space
//!    vertex data and the scene collapses to one node per primitive, with
//!    positions/normals/tangents repacked as fp32 and indices as u32.
//! 3. **UV parameterization** - an atlas builder unwraps the flattened
//!    geometry into charts and the document is rebuilt with an interleaved
//!    vertex buffer carrying a unique UV set at the reserved slot.
//!
//! A [`Pipeline`] owns every asset the stages produce and hands out copyable
//! [`AssetHandle`]s; downstream bakers read the generated UVs from the
//! [`BAKED_UV_ATTRIB`] attribute.

pub mod accessor;
pub mod asset;
pub mod atlas;
pub mod flatten;
pub mod parameterize;

pub use asset::{Asset, AssetHandle, Pipeline};
pub use atlas::{
    AtlasBuilder, AtlasMesh, AtlasVertex, ChartOptions, GridPacker, MeshDecl, VertexStream,
};
pub use flatten::FILTER_TRIANGLES;

/// Name of the UV attribute added by parameterization. The downstream baker
/// reads per-texel coordinates from this slot.
pub const BAKED_UV_ATTRIB: &str = "TEXCOORD_4";

/// Texcoord set index of [`BAKED_UV_ATTRIB`].
pub const BAKED_UV_ATTRIB_INDEX: u32 = 4;

/// Generator string stamped on documents produced by primitive flattening.
/// Exact equality against this constant is what marks a document as
/// flattened, so the value must stay stable across releases.
pub const GENERATOR_ID: &str = "uvbake";
