//! Transform baking: one output node per eligible primitive.
//!
//! Walks every node of a single-buffer document, evaluates its world
//! transform, and rewrites each surviving primitive with world-space fp32
//! positions (and normals/tangents when present) plus u32 indices. The
//! baked streams land in a fresh buffer; the source buffer is carried
//! verbatim as a second entry so pass-through attributes keep working
//! without data copies. A later `flatten_buffers` merges the two.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use bytemuck::cast_slice;
use glam::{Mat3, Mat4, Quat, Vec3};
use gltf_json as json;
use json::accessor::{ComponentType, GenericComponentType, Type};
use json::mesh::Semantic;
use json::validation::Checked::Valid;
use tracing::debug;

use crate::asset::Asset;
use crate::flatten::FILTER_TRIANGLES;
use crate::GENERATOR_ID;

/// Bookkeeping for one primitive + node pair scheduled for baking.
struct BakedPrim {
    node: usize,
    mesh: usize,
    prim: usize,
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    tangents: Option<Vec<[f32; 4]>>,
    indices: Vec<u32>,
    min: Vec3,
    max: Vec3,
}

/// Bake node transforms into vertex data and collapse the scene to one node
/// per primitive. Requires a single-buffer document.
pub fn flatten_prims(source: &Asset, flags: u32) -> Result<Asset> {
    if source.root.buffers.len() != 1 {
        bail!("flatten_prims requires a single-buffer document (run flatten_buffers first)");
    }
    let root = &source.root;

    // Parent links, for world-transform evaluation.
    let mut parents = vec![None; root.nodes.len()];
    for (index, node) in root.nodes.iter().enumerate() {
        for child in node.children.iter().flatten() {
            parents[child.value()] = Some(index);
        }
    }

    // Bake every primitive that survives the eligibility filter, in
    // node-array order. Iteration order determines buffer layout.
    let mut baked = Vec::new();
    for (node_index, node) in root.nodes.iter().enumerate() {
        let Some(mesh_index) = node.mesh.map(|m| m.value()) else {
            continue;
        };
        let world = world_transform(root, &parents, node_index);
        let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
        for (prim_index, prim) in root.meshes[mesh_index].primitives.iter().enumerate() {
            if !is_bakeable(root, prim, flags) {
                debug!(
                    "culling primitive {} of mesh {:?}",
                    prim_index,
                    root.meshes[mesh_index].name.as_deref().unwrap_or("")
                );
                continue;
            }
            baked.push(bake(
                source,
                node_index,
                mesh_index,
                prim_index,
                world,
                normal_matrix,
            )?);
        }
    }

    let num_prims = baked.len();
    let prims_with_normals = baked.iter().filter(|p| p.normals.is_some()).count();
    let prims_with_tangents = baked.iter().filter(|p| p.tangents.is_some()).count();

    // New buffer layout: positions, normals, tangents, then indices, all
    // tightly packed.
    let positions_size: usize = baked.iter().map(|p| p.positions.len() * 12).sum();
    let normals_size: usize = baked
        .iter()
        .filter_map(|p| p.normals.as_ref())
        .map(|n| n.len() * 12)
        .sum();
    let tangents_size: usize = baked
        .iter()
        .filter_map(|p| p.tangents.as_ref())
        .map(|t| t.len() * 16)
        .sum();
    let vertex_size = positions_size + normals_size + tangents_size;
    let index_size: usize = baked.iter().map(|p| p.indices.len() * 4).sum();

    let mut data = Vec::with_capacity(vertex_size + index_size);
    for prim in &baked {
        data.extend_from_slice(cast_slice(&prim.positions));
    }
    for normals in baked.iter().filter_map(|p| p.normals.as_ref()) {
        data.extend_from_slice(cast_slice(normals));
    }
    for tangents in baked.iter().filter_map(|p| p.tangents.as_ref()) {
        data.extend_from_slice(cast_slice(tangents));
    }
    for prim in &baked {
        data.extend_from_slice(cast_slice(&prim.indices));
    }

    // Views and accessors are laid out in matching order: per-prim indices,
    // per-prim positions, normals (prims that have them), tangents (ditto),
    // then every source entry re-pointed at buffer 1. With that ordering a
    // baked accessor and its view share the same index.
    let baked_entries = 2 * num_prims + prims_with_normals + prims_with_tangents;
    let src_base = baked_entries;

    let mut index_views = Vec::with_capacity(num_prims);
    let mut position_views = Vec::with_capacity(num_prims);
    let mut normal_views = Vec::with_capacity(prims_with_normals);
    let mut tangent_views = Vec::with_capacity(prims_with_tangents);
    let mut index_accessors = Vec::with_capacity(num_prims);
    let mut position_accessors = Vec::with_capacity(num_prims);
    let mut normal_accessors = Vec::with_capacity(prims_with_normals);
    let mut tangent_accessors = Vec::with_capacity(prims_with_tangents);

    let mut index_offset = vertex_size as u64;
    let mut position_offset = 0u64;
    let mut normal_offset = positions_size as u64;
    let mut tangent_offset = (positions_size + normals_size) as u64;

    let mut meshes = Vec::with_capacity(num_prims);
    let mut nodes = Vec::with_capacity(num_prims);
    let mut normal_rank = 0usize;
    let mut tangent_rank = 0usize;

    for (i, prim) in baked.iter().enumerate() {
        let src_prim = &root.meshes[prim.mesh].primitives[prim.prim];

        let index_length = prim.indices.len() * 4;
        index_views.push(baked_view(
            index_offset,
            index_length,
            json::buffer::Target::ElementArrayBuffer,
        ));
        index_offset += index_length as u64;
        index_accessors.push(baked_accessor(
            i as u32,
            prim.indices.len(),
            ComponentType::U32,
            Type::Scalar,
        ));

        let position_length = prim.positions.len() * 12;
        position_views.push(baked_view(
            position_offset,
            position_length,
            json::buffer::Target::ArrayBuffer,
        ));
        position_offset += position_length as u64;
        let mut position_accessor = baked_accessor(
            (num_prims + i) as u32,
            prim.positions.len(),
            ComponentType::F32,
            Type::Vec3,
        );
        position_accessor.min = Some(bounds_value(prim.min));
        position_accessor.max = Some(bounds_value(prim.max));
        position_accessors.push(position_accessor);

        let normal_slot = prim.normals.as_ref().map(|normals| {
            let slot = 2 * num_prims + normal_rank;
            normal_rank += 1;
            let length = normals.len() * 12;
            normal_views.push(baked_view(
                normal_offset,
                length,
                json::buffer::Target::ArrayBuffer,
            ));
            normal_offset += length as u64;
            normal_accessors.push(baked_accessor(
                slot as u32,
                normals.len(),
                ComponentType::F32,
                Type::Vec3,
            ));
            slot
        });

        let tangent_slot = prim.tangents.as_ref().map(|tangents| {
            let slot = 2 * num_prims + prims_with_normals + tangent_rank;
            tangent_rank += 1;
            let length = tangents.len() * 16;
            tangent_views.push(baked_view(
                tangent_offset,
                length,
                json::buffer::Target::ArrayBuffer,
            ));
            tangent_offset += length as u64;
            tangent_accessors.push(baked_accessor(
                slot as u32,
                tangents.len(),
                ComponentType::F32,
                Type::Vec4,
            ));
            slot
        });

        // Rewrite the attribute map: baked attributes point at the new
        // accessors, everything else shifts into the source tail.
        let mut attributes = BTreeMap::new();
        for (semantic, accessor_index) in &src_prim.attributes {
            let target = match semantic {
                Valid(Semantic::Positions) => num_prims + i,
                Valid(Semantic::Normals) if normal_slot.is_some() => normal_slot.unwrap_or(0),
                Valid(Semantic::Tangents) if tangent_slot.is_some() => tangent_slot.unwrap_or(0),
                _ => src_base + accessor_index.value(),
            };
            attributes.insert(semantic.clone(), json::Index::new(target as u32));
        }

        meshes.push(json::Mesh {
            extensions: Default::default(),
            extras: Default::default(),
            name: root.meshes[prim.mesh].name.clone(),
            primitives: vec![json::mesh::Primitive {
                attributes,
                extensions: Default::default(),
                extras: src_prim.extras.clone(),
                indices: Some(json::Index::new(i as u32)),
                material: src_prim.material,
                mode: src_prim.mode,
                targets: None,
            }],
            weights: None,
        });

        // Output nodes carry no transform; the geometry is world space now.
        nodes.push(json::Node {
            camera: None,
            children: None,
            extensions: Default::default(),
            extras: Default::default(),
            matrix: None,
            mesh: Some(json::Index::new(i as u32)),
            name: root.nodes[prim.node].name.clone(),
            rotation: None,
            scale: None,
            translation: None,
            skin: None,
            weights: None,
        });
    }

    let mut views = index_views;
    views.extend(position_views);
    views.extend(normal_views);
    views.extend(tangent_views);
    for view in &root.buffer_views {
        let mut view = view.clone();
        view.buffer = json::Index::new(1);
        views.push(view);
    }

    let mut accessors = index_accessors;
    accessors.extend(position_accessors);
    accessors.extend(normal_accessors);
    accessors.extend(tangent_accessors);
    for accessor in &root.accessors {
        let mut accessor = accessor.clone();
        accessor.buffer_view = accessor
            .buffer_view
            .map(|v| json::Index::new((src_base + v.value()) as u32));
        accessors.push(accessor);
    }

    // Embedded images keep their view, shifted into the source tail.
    let images = root
        .images
        .iter()
        .map(|image| {
            let mut image = image.clone();
            image.buffer_view = image
                .buffer_view
                .map(|v| json::Index::new((src_base + v.value()) as u32));
            image
        })
        .collect();

    // Only the default scene survives; its name is preserved.
    let scene_name = root
        .scene
        .and_then(|s| root.scenes.get(s.value()))
        .and_then(|s| s.name.clone());
    let scene = json::Scene {
        extensions: Default::default(),
        extras: Default::default(),
        name: scene_name,
        nodes: (0..num_prims).map(|i| json::Index::new(i as u32)).collect(),
    };

    let buffers = vec![
        json::Buffer {
            byte_length: (data.len() as u64).into(),
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            uri: None,
        },
        root.buffers[0].clone(),
    ];

    let mut out = root.clone();
    out.accessors = accessors;
    out.buffer_views = views;
    out.buffers = buffers;
    out.meshes = meshes;
    out.nodes = nodes;
    out.scenes = vec![scene];
    out.scene = Some(json::Index::new(0));
    out.images = images;
    // Baking world transforms into vertices invalidates node-targeted data.
    out.animations = Vec::new();
    out.skins = Vec::new();
    out.cameras = Vec::new();
    out.asset.generator = Some(GENERATOR_ID.to_string());

    Ok(Asset {
        root: out,
        buffer_data: vec![data, source.buffer_data[0].clone()],
    })
}

/// Whether a primitive should be baked out rather than culled away.
fn is_bakeable(root: &json::Root, prim: &json::mesh::Primitive, flags: u32) -> bool {
    if flags & FILTER_TRIANGLES != 0 && prim.mode != Valid(json::mesh::Mode::Triangles) {
        return false;
    }
    if !prim.attributes.contains_key(&Valid(Semantic::Positions)) {
        return false;
    }
    for accessor_index in prim.attributes.values() {
        let Some(accessor) = root.accessors.get(accessor_index.value()) else {
            return false;
        };
        if accessor.sparse.is_some() || accessor.count.0 == 0 {
            return false;
        }
    }
    match prim.indices.and_then(|i| root.accessors.get(i.value())) {
        Some(indices) => indices.sparse.is_none(),
        None => false,
    }
}

fn bake(
    source: &Asset,
    node: usize,
    mesh: usize,
    prim: usize,
    world: Mat4,
    normal_matrix: Mat3,
) -> Result<BakedPrim> {
    let src_prim = &source.root.meshes[mesh].primitives[prim];
    let attribute = |semantic: Semantic| src_prim.attributes.get(&Valid(semantic)).copied();

    // Eligibility guarantees a position attribute and indices.
    let positions_index = attribute(Semantic::Positions)
        .ok_or_else(|| anyhow::anyhow!("bakeable primitive lost its position attribute"))?;
    let reader = source.reader(positions_index)?;
    let mut positions = Vec::with_capacity(reader.count());
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for i in 0..reader.count() {
        let mut element = [0.0f32; 3];
        reader.read_f32(i, &mut element);
        let p = world.transform_point3(Vec3::from(element));
        min = min.min(p);
        max = max.max(p);
        positions.push(p.to_array());
    }

    let normals = match attribute(Semantic::Normals) {
        Some(index) => {
            let reader = source.reader(index)?;
            let mut normals = Vec::with_capacity(reader.count());
            for i in 0..reader.count() {
                let mut element = [0.0f32; 3];
                reader.read_f32(i, &mut element);
                // Direction hints; re-normalization is the consumer's call.
                normals.push((normal_matrix * Vec3::from(element)).to_array());
            }
            Some(normals)
        }
        None => None,
    };

    let tangents = match attribute(Semantic::Tangents) {
        Some(index) => {
            let reader = source.reader(index)?;
            let mut tangents = Vec::with_capacity(reader.count());
            for i in 0..reader.count() {
                let mut element = [0.0f32; 4];
                reader.read_f32(i, &mut element);
                let t = normal_matrix * Vec3::new(element[0], element[1], element[2]);
                // The w component is the bitangent sign and passes through.
                tangents.push([t.x, t.y, t.z, element[3]]);
            }
            Some(tangents)
        }
        None => None,
    };

    let indices_index = src_prim
        .indices
        .ok_or_else(|| anyhow::anyhow!("bakeable primitive lost its indices"))?;
    let reader = source.reader(indices_index)?;
    let indices = (0..reader.count()).map(|i| reader.read_u32(i)).collect();

    Ok(BakedPrim {
        node,
        mesh,
        prim,
        positions,
        normals,
        tangents,
        indices,
        min,
        max,
    })
}

fn world_transform(root: &json::Root, parents: &[Option<usize>], node: usize) -> Mat4 {
    let mut matrix = local_transform(&root.nodes[node]);
    let mut current = parents[node];
    while let Some(index) = current {
        matrix = local_transform(&root.nodes[index]) * matrix;
        current = parents[index];
    }
    matrix
}

fn local_transform(node: &json::Node) -> Mat4 {
    if let Some(m) = node.matrix {
        return Mat4::from_cols_array(&m);
    }
    let translation = node.translation.map(Vec3::from).unwrap_or(Vec3::ZERO);
    let rotation = node
        .rotation
        .map(|r| Quat::from_array(r.0))
        .unwrap_or(Quat::IDENTITY);
    let scale = node.scale.map(Vec3::from).unwrap_or(Vec3::ONE);
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

fn baked_view(offset: u64, length: usize, target: json::buffer::Target) -> json::buffer::View {
    json::buffer::View {
        buffer: json::Index::new(0),
        byte_length: (length as u64).into(),
        byte_offset: Some(offset.into()),
        byte_stride: None,
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        target: Some(Valid(target)),
    }
}

fn baked_accessor(
    view: u32,
    count: usize,
    component_type: ComponentType,
    ty: Type,
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
        normalized: false,
        sparse: None,
    }
}

fn bounds_value(v: Vec3) -> json::Value {
    json::Value::Array(v.to_array().into_iter().map(json::Value::from).collect())
}
