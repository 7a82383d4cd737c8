//! Typed reading of accessor elements.
//!
//! Vertex attributes arrive with heterogeneous component types (signed and
//! unsigned 8/16/32-bit integers, fp32, optionally normalized). The baking
//! stages only ever need two views of an element: an fp32 vector of the
//! accessor's width, or a single u32 index. [`ElementReader`] provides both
//! and dispatches on the component type internally.

use anyhow::{bail, Context, Result};
use gltf_json as json;
use json::accessor::{ComponentType, GenericComponentType, Type};
use json::validation::Checked::Valid;

/// Number of fp32 components an element of the given shape occupies.
pub fn float_width(ty: Type) -> usize {
    match ty {
        Type::Scalar => 1,
        Type::Vec2 => 2,
        Type::Vec3 => 3,
        Type::Vec4 => 4,
        Type::Mat2 => 4,
        Type::Mat3 => 9,
        Type::Mat4 => 16,
    }
}

/// Size in bytes of one component.
pub fn component_size(component_type: ComponentType) -> usize {
    match component_type {
        ComponentType::I8 | ComponentType::U8 => 1,
        ComponentType::I16 | ComponentType::U16 => 2,
        ComponentType::U32 | ComponentType::F32 => 4,
    }
}

/// Base byte slice and effective stride for an accessor's element stream.
///
/// Returns `None` when the accessor has no buffer view or its metadata does
/// not resolve within the document.
pub fn stream<'a>(
    root: &json::Root,
    buffer_data: &'a [Vec<u8>],
    accessor: &json::Accessor,
) -> Option<(&'a [u8], usize)> {
    let view = root.buffer_views.get(accessor.buffer_view?.value())?;
    let blob = buffer_data.get(view.buffer.value())?;
    let (Valid(GenericComponentType(component_type)), Valid(ty)) =
        (accessor.component_type, accessor.type_)
    else {
        return None;
    };
    let packed = component_size(component_type) * float_width(ty);
    let stride = view.byte_stride.map(|s| s.0 as usize).unwrap_or(packed);
    let start = view.byte_offset.map(|o| o.0).unwrap_or(0) as usize
        + accessor.byte_offset.map(|o| o.0).unwrap_or(0) as usize;
    blob.get(start..).map(|data| (data, stride))
}

/// Reads elements of one accessor as fp32 vectors or u32 indices.
pub struct ElementReader<'a> {
    data: Option<&'a [u8]>,
    stride: usize,
    component_type: ComponentType,
    width: usize,
    normalized: bool,
    count: usize,
}

impl<'a> ElementReader<'a> {
    pub fn new(
        root: &json::Root,
        buffer_data: &'a [Vec<u8>],
        accessor: &json::Accessor,
    ) -> Result<Self> {
        let Valid(GenericComponentType(component_type)) = accessor.component_type else {
            bail!("accessor has an unrecognized component type");
        };
        let Valid(ty) = accessor.type_ else {
            bail!("accessor has an unrecognized element type");
        };
        let width = float_width(ty);
        // Accessors without a buffer view read as zeros.
        let (data, stride) = match stream(root, buffer_data, accessor) {
            Some((data, stride)) => (Some(data), stride),
            None if accessor.buffer_view.is_none() => {
                (None, component_size(component_type) * width)
            }
            None => bail!("accessor does not resolve to buffer data"),
        };
        Ok(Self {
            data,
            stride,
            component_type,
            width,
            normalized: accessor.normalized,
            count: accessor.count.0 as usize,
        })
    }

    /// Number of elements in the accessor.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Read element `index` as fp32 components into `out`, converting and
    /// denormalizing as needed. Fills `min(width, out.len())` components;
    /// the rest of `out` is left untouched.
    pub fn read_f32(&self, index: usize, out: &mut [f32]) {
        let Some(data) = self.data else {
            for v in out.iter_mut() {
                *v = 0.0;
            }
            return;
        };
        let component = component_size(self.component_type);
        let base = index * self.stride;
        for (c, v) in out.iter_mut().take(self.width).enumerate() {
            *v = self.component_f32(data, base + c * component);
        }
    }

    /// Read element `index` as a u32 index value.
    pub fn read_u32(&self, index: usize) -> u32 {
        let Some(data) = self.data else { return 0 };
        let offset = index * self.stride;
        match self.component_type {
            ComponentType::U8 => data[offset] as u32,
            ComponentType::I8 => (data[offset] as i8).max(0) as u32,
            ComponentType::U16 => read_u16(data, offset) as u32,
            ComponentType::I16 => (read_u16(data, offset) as i16).max(0) as u32,
            ComponentType::U32 => read_u32(data, offset),
            ComponentType::F32 => f32::from_bits(read_u32(data, offset)) as u32,
        }
    }

    fn component_f32(&self, data: &[u8], offset: usize) -> f32 {
        match self.component_type {
            ComponentType::F32 => f32::from_bits(read_u32(data, offset)),
            ComponentType::U8 => {
                let v = data[offset] as f32;
                if self.normalized {
                    v / 255.0
                } else {
                    v
                }
            }
            ComponentType::I8 => {
                let v = data[offset] as i8 as f32;
                if self.normalized {
                    (v / 127.0).max(-1.0)
                } else {
                    v
                }
            }
            ComponentType::U16 => {
                let v = read_u16(data, offset) as f32;
                if self.normalized {
                    v / 65535.0
                } else {
                    v
                }
            }
            ComponentType::I16 => {
                let v = read_u16(data, offset) as i16 as f32;
                if self.normalized {
                    (v / 32767.0).max(-1.0)
                } else {
                    v
                }
            }
            ComponentType::U32 => read_u32(data, offset) as f32,
        }
    }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Convenience constructor used by the pipeline stages.
pub fn reader<'a>(
    root: &json::Root,
    buffer_data: &'a [Vec<u8>],
    index: json::Index<json::Accessor>,
) -> Result<ElementReader<'a>> {
    let accessor = root
        .accessors
        .get(index.value())
        .context("accessor index out of range")?;
    ElementReader::new(root, buffer_data, accessor)
}
