//! Buffer aggregation: consolidate every binary buffer into one.

use gltf_json as json;

use crate::asset::Asset;

/// Concatenate all buffers of `source`, in declaration order, into a single
/// buffer and re-offset every buffer view into it. All other collections
/// pass through untouched; their references are indices into arrays whose
/// order this stage preserves.
///
/// Applying this to a single-buffer document yields an identical byte
/// stream. An empty buffer list yields one zero-sized buffer.
pub fn flatten_buffers(source: &Asset) -> Asset {
    let total: usize = source.buffer_data.iter().map(Vec::len).sum();
    let mut data = Vec::with_capacity(total);
    let mut offsets = Vec::with_capacity(source.buffer_data.len());
    for blob in &source.buffer_data {
        offsets.push(data.len() as u64);
        data.extend_from_slice(blob);
    }

    let mut root = source.root.clone();
    for view in &mut root.buffer_views {
        let prefix = offsets[view.buffer.value()];
        view.buffer = json::Index::new(0);
        view.byte_offset = Some((view.byte_offset.map(|o| o.0).unwrap_or(0) + prefix).into());
    }
    root.buffers = vec![json::Buffer {
        byte_length: (total as u64).into(),
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        uri: None,
    }];

    Asset {
        root,
        buffer_data: vec![data],
    }
}
