//! Vertex and index buffers
//!
//! These are the storage types the reduction core reads from and writes to.
//! Vertex data is kept as raw interleaved bytes, the way it would be uploaded
//! to the GPU; positions are located through a stride and a byte offset.

use crate::error::{Error, Result};
use crate::point::Point3f;
use serde::{Deserialize, Serialize};

const POSITION_SIZE: usize = 3 * std::mem::size_of::<f32>();

/// Width of the elements stored in an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    /// Size of one index in bytes
    pub fn size(self) -> usize {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }

    /// Largest index representable with this width
    pub fn max_index(self) -> u32 {
        match self {
            IndexType::U16 => u16::MAX as u32,
            IndexType::U32 => u32::MAX,
        }
    }

    /// Smallest width able to address `vertex_count` vertices
    pub fn for_vertex_count(vertex_count: usize) -> Self {
        if vertex_count > u16::MAX as usize + 1 {
            IndexType::U32
        } else {
            IndexType::U16
        }
    }
}

/// A triangle-list index buffer with 16- or 32-bit elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexBuffer {
    /// Allocate an empty buffer with room for `count` indices
    pub fn allocate(index_type: IndexType, count: usize) -> Self {
        match index_type {
            IndexType::U16 => IndexBuffer::U16(Vec::with_capacity(count)),
            IndexType::U32 => IndexBuffer::U32(Vec::with_capacity(count)),
        }
    }

    /// Build a buffer of the given width from widened indices
    pub fn from_indices(index_type: IndexType, indices: &[u32]) -> Result<Self> {
        let mut buffer = Self::allocate(index_type, indices.len());
        for &index in indices {
            buffer.push(index)?;
        }
        Ok(buffer)
    }

    pub fn index_type(&self) -> IndexType {
        match self {
            IndexBuffer::U16(_) => IndexType::U16,
            IndexBuffer::U32(_) => IndexType::U32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexBuffer::U16(v) => v.len(),
            IndexBuffer::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of whole triangles in the buffer
    pub fn triangle_count(&self) -> usize {
        self.len() / 3
    }

    pub fn get(&self, position: usize) -> Option<u32> {
        match self {
            IndexBuffer::U16(v) => v.get(position).map(|&i| i as u32),
            IndexBuffer::U32(v) => v.get(position).copied(),
        }
    }

    /// Append an index, failing if it does not fit the buffer's width
    pub fn push(&mut self, index: u32) -> Result<()> {
        match self {
            IndexBuffer::U16(v) => {
                let narrow = u16::try_from(index).map_err(|_| Error::IndexOverflow { index })?;
                v.push(narrow);
            }
            IndexBuffer::U32(v) => v.push(index),
        }
        Ok(())
    }

    /// Iterate over the indices widened to `u32`
    pub fn iter(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            IndexBuffer::U16(v) => Box::new(v.iter().map(|&i| i as u32)),
            IndexBuffer::U32(v) => Box::new(v.iter().copied()),
        }
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.iter().collect()
    }

    /// Raw element bytes in the target's native byte order.
    ///
    /// This is a zero-copy view, laid out the way a GPU upload expects on the
    /// host; it is little-endian only on little-endian targets.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            IndexBuffer::U16(v) => bytemuck::cast_slice(v),
            IndexBuffer::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// Interleaved vertex data with a three-float position element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexBuffer {
    data: Vec<u8>,
    stride: usize,
    position_offset: usize,
}

impl VertexBuffer {
    /// Wrap raw vertex bytes.
    ///
    /// `stride` is the size of one vertex in bytes and `position_offset` the
    /// byte offset of the position element inside a vertex.
    pub fn new(data: Vec<u8>, stride: usize, position_offset: usize) -> Result<Self> {
        if stride == 0 {
            return Err(Error::BufferLayout("Vertex stride must be non-zero".to_string()));
        }
        if position_offset + POSITION_SIZE > stride {
            return Err(Error::BufferLayout(format!(
                "Position element at offset {} does not fit in a {}-byte vertex",
                position_offset, stride
            )));
        }
        if data.len() % stride != 0 {
            return Err(Error::BufferLayout(format!(
                "Buffer length {} is not a multiple of the stride {}",
                data.len(),
                stride
            )));
        }
        Ok(Self {
            data,
            stride,
            position_offset,
        })
    }

    /// Pack a tightly laid out position-only buffer
    pub fn from_positions(positions: &[Point3f]) -> Self {
        let coords: Vec<[f32; 3]> = positions.iter().map(|p| [p.x, p.y, p.z]).collect();
        Self {
            data: bytemuck::cast_slice(&coords).to_vec(),
            stride: POSITION_SIZE,
            position_offset: 0,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.stride
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn position_offset(&self) -> usize {
        self.position_offset
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Read the position of vertex `index`
    pub fn position(&self, index: usize) -> Option<Point3f> {
        let start = index.checked_mul(self.stride)?.checked_add(self.position_offset)?;
        let bytes = self.data.get(start..start + POSITION_SIZE)?;
        let [x, y, z] = bytemuck::pod_read_unaligned::<[f32; 3]>(bytes);
        Some(Point3f::new(x, y, z))
    }
}
