//! Unique-UV generation: drive an atlas builder over a flattened document
//! and rebuild it with one interleaved vertex buffer per mesh plus the
//! baked UV attribute at the reserved slot.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use bytemuck::cast_slice;
use gltf_json as json;
use json::accessor::{ComponentType, GenericComponentType, Type};
use json::mesh::Semantic;
use json::validation::Checked::Valid;
use tracing::info;

use crate::accessor::{self, ElementReader};
use crate::asset::Asset;
use crate::atlas::{AtlasBuilder, ChartOptions, MeshDecl, VertexStream};
use crate::BAKED_UV_ATTRIB_INDEX;

/// Run the atlas builder over every mesh of a flattened document and emit a
/// new document whose primitives carry a unique UV set at the reserved
/// texcoord slot.
pub fn parameterize(
    source: &Asset,
    builder: &mut dyn AtlasBuilder,
    options: &ChartOptions,
) -> Result<Asset> {
    if !source.is_flattened() {
        bail!("only flattened assets can be parameterized");
    }
    let root = &source.root;

    for (i, mesh) in root.meshes.iter().enumerate() {
        mesh_decl(source, i)
            .and_then(|decl| builder.add_mesh(&decl))
            .with_context(|| {
                format!(
                    "failed to parameterize mesh {:?}",
                    mesh.name.as_deref().unwrap_or("")
                )
            })?;
    }

    info!("computing charts");
    builder.compute_charts(options);
    info!("parameterizing charts");
    builder.parameterize_charts();
    info!("packing charts");
    builder.pack_charts();

    let atlas_meshes = builder.meshes();
    if atlas_meshes.len() != root.meshes.len() {
        bail!(
            "atlas builder returned {} meshes for {} inputs",
            atlas_meshes.len(),
            root.meshes.len()
        );
    }
    info!(
        "atlas extent {}x{}, {} meshes",
        builder.width(),
        builder.height(),
        atlas_meshes.len()
    );

    // Interleaved layout per mesh: the source attributes' float widths in
    // attribute order, then the two baked UV floats.
    let mut floats_per_vert = Vec::with_capacity(root.meshes.len());
    for mesh in &root.meshes {
        let prim = &mesh.primitives[0];
        let mut floats = 2usize;
        for accessor_index in prim.attributes.values() {
            let accessor = &root.accessors[accessor_index.value()];
            let Valid(ty) = accessor.type_ else {
                bail!("attribute accessor has an unrecognized element type");
            };
            floats += accessor::float_width(ty);
        }
        floats_per_vert.push(floats);
    }

    // Fill the consolidated vertex region: every atlas vertex pulls its
    // source attributes through the xref, converted to fp32, and the UV
    // pair trails each vertex.
    let mut vertex_floats: Vec<f32> = Vec::new();
    for (i, atlas_mesh) in atlas_meshes.iter().enumerate() {
        let prim = &root.meshes[i].primitives[0];
        let readers: Vec<(ElementReader, usize)> = prim
            .attributes
            .values()
            .map(|accessor_index| {
                let accessor = &root.accessors[accessor_index.value()];
                let Valid(ty) = accessor.type_ else {
                    bail!("attribute accessor has an unrecognized element type");
                };
                let reader = ElementReader::new(root, &source.buffer_data, accessor)?;
                Ok((reader, accessor::float_width(ty)))
            })
            .collect::<Result<_>>()?;

        let mut element = [0.0f32; 16];
        for vertex in &atlas_mesh.vertices {
            for (reader, width) in &readers {
                reader.read_f32(vertex.xref as usize, &mut element[..*width]);
                vertex_floats.extend_from_slice(&element[..*width]);
            }
            vertex_floats.extend_from_slice(&vertex.uv);
        }
    }

    let vertex_region = vertex_floats.len() * 4;
    let mut data: Vec<u8> = Vec::with_capacity(
        vertex_region + atlas_meshes.iter().map(|m| m.indices.len() * 4).sum::<usize>(),
    );
    data.extend_from_slice(cast_slice(&vertex_floats));
    for atlas_mesh in atlas_meshes {
        data.extend_from_slice(cast_slice(&atlas_mesh.indices));
    }

    // Two buffer views per mesh: interleaved vertices and indices.
    let mut views = Vec::with_capacity(atlas_meshes.len() * 2);
    let mut vertex_offset = 0u64;
    let mut index_offset = vertex_region as u64;
    for (i, atlas_mesh) in atlas_meshes.iter().enumerate() {
        let stride = floats_per_vert[i] * 4;
        let vertex_length = atlas_mesh.vertices.len() * stride;
        views.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: (vertex_length as u64).into(),
            byte_offset: Some(vertex_offset.into()),
            byte_stride: Some(json::buffer::Stride(stride as _)),
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: Some(Valid(json::buffer::Target::ArrayBuffer)),
        });
        vertex_offset += vertex_length as u64;

        let index_length = atlas_mesh.indices.len() * 4;
        views.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: (index_length as u64).into(),
            byte_offset: Some(index_offset.into()),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: Some(Valid(json::buffer::Target::ElementArrayBuffer)),
        });
        index_offset += index_length as u64;
    }

    // Accessors: per mesh, one fp32 accessor per source attribute into the
    // interleaved view, the baked UV accessor at the trailing offset, and a
    // u32 index accessor.
    let mut accessors = Vec::new();
    let mut meshes = Vec::with_capacity(root.meshes.len());
    for (i, atlas_mesh) in atlas_meshes.iter().enumerate() {
        let src_mesh = &root.meshes[i];
        let src_prim = &src_mesh.primitives[0];
        let vertex_view = (i * 2) as u32;
        let index_view = vertex_view + 1;
        let vertex_count = atlas_mesh.vertices.len();

        let mut attributes = BTreeMap::new();
        let mut offset = 0u64;
        for (semantic, accessor_index) in &src_prim.attributes {
            let src_accessor = &root.accessors[accessor_index.value()];
            let Valid(ty) = src_accessor.type_ else {
                bail!("attribute accessor has an unrecognized element type");
            };
            attributes.insert(
                semantic.clone(),
                json::Index::new(accessors.len() as u32),
            );
            accessors.push(json::Accessor {
                buffer_view: Some(json::Index::new(vertex_view)),
                byte_offset: Some(offset.into()),
                count: vertex_count.into(),
                component_type: Valid(GenericComponentType(ComponentType::F32)),
                extensions: Default::default(),
                extras: Default::default(),
                type_: Valid(ty),
                min: src_accessor.min.clone(),
                max: src_accessor.max.clone(),
                name: None,
                normalized: false,
                sparse: None,
            });
            offset += (accessor::float_width(ty) * 4) as u64;
        }

        attributes.insert(
            Valid(Semantic::TexCoords(BAKED_UV_ATTRIB_INDEX)),
            json::Index::new(accessors.len() as u32),
        );
        accessors.push(json::Accessor {
            buffer_view: Some(json::Index::new(vertex_view)),
            byte_offset: Some(offset.into()),
            count: vertex_count.into(),
            component_type: Valid(GenericComponentType(ComponentType::F32)),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(Type::Vec2),
            min: None,
            max: None,
            name: None,
            normalized: false,
            sparse: None,
        });

        let indices_accessor = accessors.len() as u32;
        accessors.push(json::Accessor {
            buffer_view: Some(json::Index::new(index_view)),
            byte_offset: Some(0u64.into()),
            count: atlas_mesh.indices.len().into(),
            component_type: Valid(GenericComponentType(ComponentType::U32)),
            extensions: Default::default(),
            extras: Default::default(),
            type_: Valid(Type::Scalar),
            min: None,
            max: None,
            name: None,
            normalized: false,
            sparse: None,
        });

        meshes.push(json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: src_mesh.name.clone(),
            primitives: vec![json::mesh::Primitive {
                attributes,
                extensions: Default::default(),
                extras: src_prim.extras.clone(),
                indices: Some(json::Index::new(indices_accessor)),
                material: src_prim.material,
                mode: src_prim.mode,
                targets: None,
            }],
            weights: None,
        });
    }

    // Embedded images lose their home when the buffer is rebuilt; copy
    // their byte regions to the tail and re-point the references.
    let mut images = root.images.clone();
    for image in &mut images {
        let Some(view_index) = image.buffer_view else {
            continue;
        };
        let src_view = root
            .buffer_views
            .get(view_index.value())
            .context("image buffer view out of range")?;
        let blob = &source.buffer_data[src_view.buffer.value()];
        let start = src_view.byte_offset.map(|o| o.0).unwrap_or(0) as usize;
        let length = src_view.byte_length.0 as usize;
        let bytes = blob
            .get(start..start + length)
            .context("image buffer view out of bounds")?;

        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        image.buffer_view = Some(json::Index::new(views.len() as u32));
        views.push(json::buffer::View {
            buffer: json::Index::new(0),
            byte_length: (length as u64).into(),
            byte_offset: Some(offset.into()),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: src_view.name.clone(),
            target: None,
        });
    }

    let mut out = root.clone();
    out.accessors = accessors;
    out.buffer_views = views;
    out.buffers = vec![json::Buffer {
        byte_length: (data.len() as u64).into(),
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        uri: None,
    }];
    out.meshes = meshes;
    out.images = images;

    Ok(Asset {
        root: out,
        buffer_data: vec![data],
    })
}

/// Build the raw-stream declaration for one mesh. Only packed fp32 streams
/// are declared; omitting anything else degrades atlas quality gracefully
/// rather than failing.
fn mesh_decl<'a>(source: &'a Asset, mesh_index: usize) -> Result<MeshDecl<'a>> {
    let root = &source.root;
    let prim = &root.meshes[mesh_index].primitives[0];

    let mut positions = None;
    let mut normals = None;
    let mut uvs = None;
    let mut vertex_count = 0u32;
    for (semantic, accessor_index) in &prim.attributes {
        let accessor = &root.accessors[accessor_index.value()];
        if !matches!(accessor.component_type, Valid(GenericComponentType(ComponentType::F32))) {
            continue;
        }
        let Some((data, stride)) = accessor::stream(root, &source.buffer_data, accessor) else {
            continue;
        };
        let stream = VertexStream { data, stride };
        match semantic {
            Valid(Semantic::Positions) => {
                vertex_count = accessor.count.0 as u32;
                positions = Some(stream);
            }
            Valid(Semantic::Normals) => normals = Some(stream),
            Valid(Semantic::TexCoords(0)) => uvs = Some(stream),
            _ => {}
        }
    }
    let positions = positions.context("mesh has no packed fp32 position stream")?;

    let indices_index = prim.indices.context("mesh has no indices")?;
    let indices_accessor = &root.accessors[indices_index.value()];
    let (index_data, _) = accessor::stream(root, &source.buffer_data, indices_accessor)
        .context("index accessor does not resolve to buffer data")?;

    Ok(MeshDecl {
        vertex_count,
        positions,
        normals,
        uvs,
        index_data,
        index_count: indices_accessor.count.0 as u32,
    })
}
