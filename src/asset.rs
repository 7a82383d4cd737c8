//! In-memory assets and the pipeline arena.
//!
//! An [`Asset`] pairs the parsed glTF JSON tree with one byte blob per
//! buffer entry. A [`Pipeline`] owns every asset it loads or produces and
//! hands out copyable [`AssetHandle`]s; everything is freed together when
//! the pipeline is dropped. Stages never mutate their input asset.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use gltf_json as json;
use tracing::info;

use crate::accessor::{self, ElementReader};
use crate::atlas::{AtlasBuilder, ChartOptions, GridPacker};
use crate::{flatten, parameterize, GENERATOR_ID};

/// A glTF document held in memory: the JSON tree plus the binary payload of
/// each buffer, kept parallel to `root.buffers`.
pub struct Asset {
    pub root: json::Root,
    pub buffer_data: Vec<Vec<u8>>,
}

impl Asset {
    /// Whether this document has been through primitive flattening and is
    /// amenable to parameterization and export: a single buffer, one node
    /// per single-primitive mesh, and the generator marker set.
    pub fn is_flattened(&self) -> bool {
        self.root.buffers.len() == 1
            && self.root.nodes.len() == self.root.meshes.len()
            && self.root.meshes.iter().all(|m| m.primitives.len() == 1)
            && self.root.asset.generator.as_deref() == Some(GENERATOR_ID)
    }

    /// Element reader for the accessor at `index`.
    pub fn reader(&self, index: json::Index<json::Accessor>) -> Result<ElementReader<'_>> {
        accessor::reader(&self.root, &self.buffer_data, index)
    }
}

/// Handle to an asset owned by a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetHandle(usize);

/// Owns every asset produced by the pipeline stages.
///
/// Not shareable across threads; callers wanting parallel asset processing
/// should instantiate one pipeline per thread.
#[derive(Default)]
pub struct Pipeline {
    assets: Vec<Asset>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset with the arena.
    pub fn insert(&mut self, asset: Asset) -> AssetHandle {
        self.assets.push(asset);
        AssetHandle(self.assets.len() - 1)
    }

    pub fn get(&self, handle: AssetHandle) -> &Asset {
        &self.assets[handle.0]
    }

    /// Parse a glTF or GLB file. A directory selects the first `.gltf`
    /// file it contains (in name order). External buffers are resolved
    /// eagerly; failure to load them fails the whole operation.
    pub fn load(&mut self, path: &Path) -> Result<AssetHandle> {
        let path = if path.is_dir() {
            first_gltf(path)?
        } else {
            path.to_path_buf()
        };
        let gltf::Gltf { document, blob } =
            gltf::Gltf::open(&path).with_context(|| format!("failed to load glTF {:?}", path))?;
        // Only buffers are resolved; images stay untouched references.
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let buffers = gltf::import_buffers(&document, Some(base), blob)
            .context("unable to load external buffers")?;
        let root = document.into_json();
        let mut buffer_data: Vec<Vec<u8>> = buffers.into_iter().map(|data| data.0).collect();
        // The importer pads payloads to four bytes; trim back to the
        // declared sizes so blob length always equals buffer size.
        for (blob, buffer) in buffer_data.iter_mut().zip(&root.buffers) {
            blob.truncate(buffer.byte_length.0 as usize);
        }
        info!(
            "loaded {:?}: {} buffers, {} meshes, {} nodes",
            path,
            root.buffers.len(),
            root.meshes.len(),
            root.nodes.len()
        );
        Ok(self.insert(Asset { root, buffer_data }))
    }

    /// Aggregate all buffers into one. Infallible; idempotent on
    /// single-buffer documents.
    pub fn flatten_buffers(&mut self, handle: AssetHandle) -> AssetHandle {
        let result = flatten::buffers::flatten_buffers(self.get(handle));
        self.insert(result)
    }

    /// Bake node transforms into vertex data, one output node per eligible
    /// primitive. Requires a single-buffer document.
    pub fn flatten_prims(&mut self, handle: AssetHandle, flags: u32) -> Result<AssetHandle> {
        let result = flatten::prims::flatten_prims(self.get(handle), flags)?;
        Ok(self.insert(result))
    }

    /// Full flattening: aggregate buffers (when more than one), bake
    /// primitives, then merge the baked and pass-through buffers.
    pub fn flatten(&mut self, handle: AssetHandle, flags: u32) -> Result<AssetHandle> {
        let mut handle = handle;
        if self.get(handle).root.buffers.len() > 1 {
            handle = self.flatten_buffers(handle);
        }
        let handle = self.flatten_prims(handle, flags)?;
        Ok(self.flatten_buffers(handle))
    }

    /// Generate the baked UV set with the built-in [`GridPacker`].
    pub fn parameterize(&mut self, handle: AssetHandle) -> Result<AssetHandle> {
        self.parameterize_with(handle, &mut GridPacker::new(), &ChartOptions::default())
    }

    /// Generate the baked UV set by driving the given atlas builder.
    pub fn parameterize_with(
        &mut self,
        handle: AssetHandle,
        builder: &mut dyn AtlasBuilder,
        options: &ChartOptions,
    ) -> Result<AssetHandle> {
        let result = parameterize::parameterize(self.get(handle), builder, options)?;
        Ok(self.insert(result))
    }

    /// Write a flattened asset as side-by-side `.gltf` + `.bin` files. The
    /// JSON's buffer URI is set to the binary file name during
    /// serialization; the stored asset itself is not touched.
    pub fn save(&self, handle: AssetHandle, json_path: &Path, bin_path: &Path) -> Result<()> {
        let asset = self.get(handle);
        if !asset.is_flattened() {
            bail!("only flattened assets can be saved");
        }
        let bin_name = bin_path
            .file_name()
            .and_then(|n| n.to_str())
            .context("binary path has no usable file name")?;

        let mut root = asset.root.clone();
        root.buffers[0].uri = Some(bin_name.to_string());
        let json_text =
            json::serialize::to_string(&root).context("failed to serialize glTF JSON")?;
        fs::write(json_path, json_text)
            .with_context(|| format!("failed to write {:?}", json_path))?;
        fs::write(bin_path, &asset.buffer_data[0])
            .with_context(|| format!("failed to write {:?}", bin_path))?;
        info!("wrote {:?} + {:?}", json_path, bin_path);
        Ok(())
    }
}

fn first_gltf(dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("gltf"))
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .with_context(|| format!("no glTF file found in {:?}", dir))
}
