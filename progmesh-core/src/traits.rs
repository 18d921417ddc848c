//! Read-side traits for geometry sources

use crate::buffer::{IndexBuffer, IndexType, VertexBuffer};
use crate::error::{Error, Result};
use crate::point::Point3f;

/// Anything that can hand out a dense, read-only array of vertex positions
pub trait PositionSource {
    /// Number of vertices in the source
    fn vertex_count(&self) -> usize;

    /// Read every vertex position, in vertex order
    fn read_positions(&self) -> Result<Vec<Point3f>>;
}

/// Anything that can hand out a dense array of triangle-list indices
pub trait IndexSource {
    /// Width of the stored indices
    fn index_type(&self) -> IndexType;

    /// Read every index widened to `u32`
    fn read_indices(&self) -> Result<Vec<u32>>;
}

impl PositionSource for VertexBuffer {
    fn vertex_count(&self) -> usize {
        VertexBuffer::vertex_count(self)
    }

    fn read_positions(&self) -> Result<Vec<Point3f>> {
        (0..VertexBuffer::vertex_count(self))
            .map(|i| {
                self.position(i).ok_or_else(|| {
                    Error::BufferLayout(format!("Vertex {} has no readable position", i))
                })
            })
            .collect()
    }
}

impl PositionSource for [Point3f] {
    fn vertex_count(&self) -> usize {
        self.len()
    }

    fn read_positions(&self) -> Result<Vec<Point3f>> {
        Ok(self.to_vec())
    }
}

impl PositionSource for Vec<Point3f> {
    fn vertex_count(&self) -> usize {
        self.len()
    }

    fn read_positions(&self) -> Result<Vec<Point3f>> {
        Ok(self.clone())
    }
}

impl IndexSource for IndexBuffer {
    fn index_type(&self) -> IndexType {
        IndexBuffer::index_type(self)
    }

    fn read_indices(&self) -> Result<Vec<u32>> {
        Ok(self.to_vec())
    }
}
