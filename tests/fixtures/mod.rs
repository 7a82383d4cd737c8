//! Programmatic glTF fixtures for pipeline tests.
//!
//! Builds small in-memory documents (JSON root plus binary blobs) covering
//! the shapes the pipeline cares about: plain and transformed triangles,
//! node hierarchies, multi-buffer layouts, mixed topologies, and a textured
//! cube with pass-through attributes.

use std::collections::BTreeMap;

use gltf_json as json;
use json::accessor::{ComponentType, GenericComponentType, Type};
use json::mesh::{Mode, Semantic};
use json::validation::Checked::Valid;
use uvbake::Asset;

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn u16_bytes(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn buffer(length: usize) -> json::Buffer {
    json::Buffer {
        byte_length: (length as u64).into(),
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        uri: None,
    }
}

pub fn view(buffer: u32, offset: usize, length: usize) -> json::buffer::View {
    json::buffer::View {
        buffer: json::Index::new(buffer),
        byte_length: (length as u64).into(),
        byte_offset: Some((offset as u64).into()),
        byte_stride: None,
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        target: None,
    }
}

pub fn accessor(
    view: u32,
    count: usize,
    component_type: ComponentType,
    ty: Type,
    normalized: bool,
) -> json::Accessor {
    json::Accessor {
        buffer_view: Some(json::Index::new(view)),
        byte_offset: Some(0u64.into()),
        count: count.into(),
        component_type: Valid(GenericComponentType(component_type)),
        extensions: Default::default(),
        extras: Default::default(),
        type_: Valid(ty),
        min: None,
        max: None,
        name: None,
        normalized,
        sparse: None,
    }
}

pub fn node(mesh: Option<u32>) -> json::Node {
    json::Node {
        camera: None,
        children: None,
        extensions: Default::default(),
        extras: Default::default(),
        matrix: None,
        mesh: mesh.map(json::Index::new),
        name: None,
        rotation: None,
        scale: None,
        translation: None,
        skin: None,
        weights: None,
    }
}

pub fn primitive(
    attributes: &[(Semantic, u32)],
    indices: Option<u32>,
    material: Option<u32>,
    mode: Mode,
) -> json::mesh::Primitive {
    let mut map = BTreeMap::new();
    for (semantic, accessor) in attributes {
        map.insert(Valid(semantic.clone()), json::Index::new(*accessor));
    }
    json::mesh::Primitive {
        attributes: map,
        extensions: Default::default(),
        extras: Default::default(),
        indices: indices.map(json::Index::new),
        material: material.map(json::Index::new),
        mode: Valid(mode),
        targets: None,
    }
}

pub fn mesh(name: &str, primitives: Vec<json::mesh::Primitive>) -> json::Mesh {
    json::Mesh {
        extensions: Default::default(),
        extras: Default::default(),
        name: Some(name.to_string()),
        primitives,
        weights: None,
    }
}

/// Attach a default scene listing the given root nodes.
pub fn with_scene(mut root: json::Root, nodes: Vec<u32>) -> json::Root {
    root.scenes.push(json::Scene {
        extensions: Default::default(),
        extras: Default::default(),
        name: Some("Scene".to_string()),
        nodes: nodes.into_iter().map(json::Index::new).collect(),
    });
    root.scene = Some(json::Index::new(0));
    root
}

/// Single triangle under a single node, optionally translated. Positions
/// are (0,0,0), (1,0,0), (0,1,0) with u16 indices 0,1,2.
pub fn triangle_asset(translation: Option<[f32; 3]>) -> Asset {
    let positions = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let indices = u16_bytes(&[0, 1, 2]);
    let mut blob = positions;
    blob.extend_from_slice(&indices);

    let mut root = json::Root::default();
    root.buffers.push(buffer(blob.len()));
    root.buffer_views.push(view(0, 0, 36));
    root.buffer_views.push(view(0, 36, 6));
    root.accessors
        .push(accessor(0, 3, ComponentType::F32, Type::Vec3, false));
    root.accessors
        .push(accessor(1, 3, ComponentType::U16, Type::Scalar, false));
    root.meshes.push(mesh(
        "Tri",
        vec![primitive(
            &[(Semantic::Positions, 0)],
            Some(1),
            None,
            Mode::Triangles,
        )],
    ));
    let mut tri_node = node(Some(0));
    tri_node.translation = translation;
    root.nodes.push(tri_node);
    let root = with_scene(root, vec![0]);

    Asset {
        root,
        buffer_data: vec![blob],
    }
}

/// A triangle with normals under a two-level hierarchy: the parent
/// translates by (10,0,0), the child applies a non-uniform (1,1,2) scale.
pub fn hierarchy_asset() -> Asset {
    let positions = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    let normals = f32_bytes(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    let indices = u16_bytes(&[0, 1, 2]);
    let mut blob = positions;
    blob.extend_from_slice(&normals);
    blob.extend_from_slice(&indices);

    let mut root = json::Root::default();
    root.buffers.push(buffer(blob.len()));
    root.buffer_views.push(view(0, 0, 36));
    root.buffer_views.push(view(0, 36, 36));
    root.buffer_views.push(view(0, 72, 6));
    root.accessors
        .push(accessor(0, 3, ComponentType::F32, Type::Vec3, false));
    root.accessors
        .push(accessor(1, 3, ComponentType::F32, Type::Vec3, false));
    root.accessors
        .push(accessor(2, 3, ComponentType::U16, Type::Scalar, false));
    root.meshes.push(mesh(
        "Leaf",
        vec![primitive(
            &[(Semantic::Positions, 0), (Semantic::Normals, 1)],
            Some(2),
            None,
            Mode::Triangles,
        )],
    ));

    let mut parent = node(None);
    parent.translation = Some([10.0, 0.0, 0.0]);
    parent.children = Some(vec![json::Index::new(1)]);
    let mut child = node(Some(0));
    child.scale = Some([1.0, 1.0, 2.0]);
    root.nodes.push(parent);
    root.nodes.push(child);
    let root = with_scene(root, vec![0]);

    Asset {
        root,
        buffer_data: vec![blob],
    }
}

/// Three buffers of 4, 8, and 2 bytes with a view into each, including one
/// at offset 1 of the last buffer.
pub fn three_buffer_asset() -> Asset {
    let blobs = vec![
        vec![0u8, 1, 2, 3],
        vec![10u8, 11, 12, 13, 14, 15, 16, 17],
        vec![20u8, 21],
    ];

    let mut root = json::Root::default();
    for blob in &blobs {
        root.buffers.push(buffer(blob.len()));
    }
    root.buffer_views.push(view(0, 0, 4));
    root.buffer_views.push(view(1, 0, 8));
    root.buffer_views.push(view(2, 1, 1));
    root.accessors
        .push(accessor(1, 1, ComponentType::F32, Type::Vec2, false));

    Asset {
        root,
        buffer_data: blobs,
    }
}

/// A non-indexed line primitive next to an indexed triangle primitive.
pub fn mixed_topology_asset() -> Asset {
    let line_positions = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    let tri_positions = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let tri_indices = u16_bytes(&[0, 1, 2]);
    let mut blob = line_positions;
    blob.extend_from_slice(&tri_positions);
    blob.extend_from_slice(&tri_indices);

    let mut root = json::Root::default();
    root.buffers.push(buffer(blob.len()));
    root.buffer_views.push(view(0, 0, 24));
    root.buffer_views.push(view(0, 24, 36));
    root.buffer_views.push(view(0, 60, 6));
    root.accessors
        .push(accessor(0, 2, ComponentType::F32, Type::Vec3, false));
    root.accessors
        .push(accessor(1, 3, ComponentType::F32, Type::Vec3, false));
    root.accessors
        .push(accessor(2, 3, ComponentType::U16, Type::Scalar, false));
    root.meshes.push(mesh(
        "Lines",
        vec![primitive(
            &[(Semantic::Positions, 0)],
            None,
            None,
            Mode::Lines,
        )],
    ));
    root.meshes.push(mesh(
        "Tri",
        vec![primitive(
            &[(Semantic::Positions, 1)],
            Some(2),
            None,
            Mode::Triangles,
        )],
    ));
    root.nodes.push(node(Some(0)));
    root.nodes.push(node(Some(1)));
    let root = with_scene(root, vec![0, 1]);

    Asset {
        root,
        buffer_data: vec![blob],
    }
}

/// An indexed line primitive next to an indexed triangle primitive; both
/// are eligible when the triangle filter is off.
pub fn indexed_lines_asset() -> Asset {
    let line_positions = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    let line_indices = u16_bytes(&[0, 1]);
    let tri_positions = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let tri_indices = u16_bytes(&[0, 1, 2]);
    let mut blob = line_positions;
    blob.extend_from_slice(&line_indices);
    blob.extend_from_slice(&tri_positions);
    blob.extend_from_slice(&tri_indices);

    let mut root = json::Root::default();
    root.buffers.push(buffer(blob.len()));
    root.buffer_views.push(view(0, 0, 24));
    root.buffer_views.push(view(0, 24, 4));
    root.buffer_views.push(view(0, 28, 36));
    root.buffer_views.push(view(0, 64, 6));
    root.accessors
        .push(accessor(0, 2, ComponentType::F32, Type::Vec3, false));
    root.accessors
        .push(accessor(1, 2, ComponentType::U16, Type::Scalar, false));
    root.accessors
        .push(accessor(2, 3, ComponentType::F32, Type::Vec3, false));
    root.accessors
        .push(accessor(3, 3, ComponentType::U16, Type::Scalar, false));
    root.meshes.push(mesh(
        "Lines",
        vec![primitive(
            &[(Semantic::Positions, 0)],
            Some(1),
            None,
            Mode::Lines,
        )],
    ));
    root.meshes.push(mesh(
        "Tri",
        vec![primitive(
            &[(Semantic::Positions, 2)],
            Some(3),
            None,
            Mode::Triangles,
        )],
    ));
    root.nodes.push(node(Some(0)));
    root.nodes.push(node(Some(1)));
    let root = with_scene(root, vec![0, 1]);

    Asset {
        root,
        buffer_data: vec![blob],
    }
}

/// Per-corner color of [`cube_asset`], normalized to fp32.
pub fn cube_corner_color(corner: usize) -> [f32; 4] {
    [
        (corner as u8 * 32) as f32 / 255.0,
        (255 - corner as u8 * 32) as f32 / 255.0,
        128.0 / 255.0,
        1.0,
    ]
}

/// Corner positions of [`cube_asset`].
pub fn cube_corners() -> [[f32; 3]; 8] {
    let mut corners = [[0.0f32; 3]; 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        corner[0] = if i & 1 != 0 { 1.0 } else { -1.0 };
        corner[1] = if i & 2 != 0 { 1.0 } else { -1.0 };
        corner[2] = if i & 4 != 0 { 1.0 } else { -1.0 };
    }
    corners
}

/// A unit cube (8 corners, 36 indices) with a texcoord set, normalized u8
/// vertex colors, and a full material/texture/image/sampler chain. With
/// `embedded_image` the image's bytes live in the buffer behind a view
/// instead of an external URI.
pub fn cube_asset(embedded_image: bool) -> Asset {
    let corners = cube_corners();
    let positions = f32_bytes(&corners.concat());
    let mut uvs = Vec::new();
    for corner in &corners {
        uvs.extend_from_slice(&f32_bytes(&[
            (corner[0] + 1.0) * 0.5,
            (corner[1] + 1.0) * 0.5,
        ]));
    }
    let mut colors = Vec::new();
    for i in 0..8u8 {
        colors.extend_from_slice(&[i * 32, 255 - i * 32, 128, 255]);
    }
    let indices: [u16; 36] = [
        0, 1, 2, 1, 3, 2, 4, 6, 5, 5, 6, 7, 0, 4, 1, 1, 4, 5, 2, 3, 6, 3, 7, 6, 0, 2, 4, 2, 6, 4,
        1, 5, 3, 3, 5, 7,
    ];
    let image_bytes = b"PNGDATA!";

    let mut blob = positions;
    blob.extend_from_slice(&uvs);
    blob.extend_from_slice(&colors);
    blob.extend_from_slice(&u16_bytes(&indices));
    let image_offset = blob.len();
    if embedded_image {
        blob.extend_from_slice(image_bytes);
    }

    let mut root = json::Root::default();
    root.buffers.push(buffer(blob.len()));
    root.buffer_views.push(view(0, 0, 96));
    root.buffer_views.push(view(0, 96, 64));
    root.buffer_views.push(view(0, 160, 32));
    root.buffer_views.push(view(0, 192, 72));
    root.accessors
        .push(accessor(0, 8, ComponentType::F32, Type::Vec3, false));
    root.accessors
        .push(accessor(1, 8, ComponentType::F32, Type::Vec2, false));
    root.accessors
        .push(accessor(2, 8, ComponentType::U8, Type::Vec4, true));
    root.accessors
        .push(accessor(3, 36, ComponentType::U16, Type::Scalar, false));

    let image_view = if embedded_image {
        root.buffer_views
            .push(view(0, image_offset, image_bytes.len()));
        Some(json::Index::new(root.buffer_views.len() as u32 - 1))
    } else {
        None
    };
    root.images.push(json::Image {
        buffer_view: image_view,
        mime_type: image_view.map(|_| json::image::MimeType("image/png".to_string())),
        name: None,
        uri: if embedded_image {
            None
        } else {
            Some("albedo.png".to_string())
        },
        extensions: Default::default(),
        extras: Default::default(),
    });
    root.samplers.push(json::texture::Sampler {
        mag_filter: None,
        min_filter: None,
        name: None,
        wrap_s: Valid(json::texture::WrappingMode::Repeat),
        wrap_t: Valid(json::texture::WrappingMode::Repeat),
        extensions: Default::default(),
        extras: Default::default(),
    });
    root.textures.push(json::Texture {
        name: None,
        sampler: Some(json::Index::new(0)),
        source: json::Index::new(0),
        extensions: Default::default(),
        extras: Default::default(),
    });
    let mut material = json::Material::default();
    material.pbr_metallic_roughness.base_color_texture = Some(json::texture::Info {
        index: json::Index::new(0),
        tex_coord: 0,
        extensions: Default::default(),
        extras: Default::default(),
    });
    material.emissive_factor = json::material::EmissiveFactor([0.1, 0.2, 0.3]);
    root.materials.push(material);

    root.meshes.push(mesh(
        "Cube",
        vec![primitive(
            &[
                (Semantic::Positions, 0),
                (Semantic::TexCoords(0), 1),
                (Semantic::Colors(0), 2),
            ],
            Some(3),
            Some(0),
            Mode::Triangles,
        )],
    ));
    root.nodes.push(node(Some(0)));
    let root = with_scene(root, vec![0]);

    Asset {
        root,
        buffer_data: vec![blob],
    }
}
