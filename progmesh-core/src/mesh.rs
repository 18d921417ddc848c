//! Mesh data structures and LOD bookkeeping

use crate::buffer::{IndexBuffer, IndexType, VertexBuffer};
use crate::error::{Error, Result};
use crate::point::Point3f;
use serde::{Deserialize, Serialize};

/// One renderable part of a mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubMesh {
    /// Read vertices from the parent mesh's shared vertex data
    pub use_shared_vertices: bool,
    /// Dedicated vertex data, used when `use_shared_vertices` is false
    pub vertex_data: Option<VertexBuffer>,
    /// Full-detail triangle list
    pub index_buffer: IndexBuffer,
    /// Reduced triangle lists; entry `i` renders LOD level `i + 1`
    pub lod_face_list: Vec<IndexBuffer>,
}

impl SubMesh {
    /// A submesh that indexes into the mesh's shared vertex data
    pub fn with_shared_vertices(index_buffer: IndexBuffer) -> Self {
        Self {
            use_shared_vertices: true,
            vertex_data: None,
            index_buffer,
            lod_face_list: Vec::new(),
        }
    }

    /// A submesh owning its vertex data
    pub fn with_vertex_data(vertex_data: VertexBuffer, index_buffer: IndexBuffer) -> Self {
        Self {
            use_shared_vertices: false,
            vertex_data: Some(vertex_data),
            index_buffer,
            lod_face_list: Vec::new(),
        }
    }

    /// Index buffer rendering the given level; level 0 is full detail
    pub fn lod_index_buffer(&self, level: usize) -> Option<&IndexBuffer> {
        match level {
            0 => Some(&self.index_buffer),
            _ => self.lod_face_list.get(level - 1),
        }
    }

    /// Check if the submesh has any triangles
    pub fn has_triangles(&self) -> bool {
        self.index_buffer.triangle_count() > 0
    }
}

/// Usage value recorded for a generated LOD level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshLodUsage {
    /// Value supplied by the caller when the level was generated, e.g. a distance
    pub user_value: f32,
}

/// A mesh made of submeshes sharing an optional vertex buffer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub shared_vertex_data: Option<VertexBuffer>,
    pub submeshes: Vec<SubMesh>,
    /// One entry per reduced level, in generation order
    pub lod_usages: Vec<MeshLodUsage>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a single-submesh mesh from positions and a triangle list.
    ///
    /// The index width is the smallest one able to address every vertex.
    pub fn from_positions_and_indices(positions: &[Point3f], indices: &[u32]) -> Result<Self> {
        let index_type = IndexType::for_vertex_count(positions.len());
        let index_buffer = IndexBuffer::from_indices(index_type, indices)?;
        Ok(Self {
            shared_vertex_data: Some(VertexBuffer::from_positions(positions)),
            submeshes: vec![SubMesh::with_shared_vertices(index_buffer)],
            lod_usages: Vec::new(),
        })
    }

    /// Add a submesh and return its index
    pub fn add_submesh(&mut self, submesh: SubMesh) -> usize {
        self.submeshes.push(submesh);
        self.submeshes.len() - 1
    }

    /// Number of LOD levels including full detail
    pub fn num_lod_levels(&self) -> usize {
        self.lod_usages.len() + 1
    }

    /// Drop every reduced level, keeping only full detail
    pub fn remove_lod_levels(&mut self) {
        for submesh in &mut self.submeshes {
            submesh.lod_face_list.clear();
        }
        self.lod_usages.clear();
    }

    /// Vertex data a submesh reads from
    pub fn submesh_vertex_data(&self, index: usize) -> Result<&VertexBuffer> {
        let submesh = self
            .submeshes
            .get(index)
            .ok_or_else(|| Error::InvalidData(format!("No submesh at index {}", index)))?;
        resolve_vertex_data(self.shared_vertex_data.as_ref(), submesh)
    }

    /// Check if the mesh has no triangles at all
    pub fn is_empty(&self) -> bool {
        self.submeshes.iter().all(|s| !s.has_triangles())
    }
}

/// Pick the vertex data a submesh indexes into
pub fn resolve_vertex_data<'a>(
    shared: Option<&'a VertexBuffer>,
    submesh: &'a SubMesh,
) -> Result<&'a VertexBuffer> {
    let data = if submesh.use_shared_vertices {
        shared
    } else {
        submesh.vertex_data.as_ref()
    };
    data.ok_or_else(|| {
        Error::InvalidData(if submesh.use_shared_vertices {
            "Submesh uses shared vertices but the mesh has none".to_string()
        } else {
            "Submesh has no vertex data".to_string()
        })
    })
}
