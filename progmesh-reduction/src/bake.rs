//! LOD baking

use crate::graph::BufferGraph;
use progmesh_core::{IndexBuffer, IndexType, Result};

/// Write the live triangles of `graph` into a new index buffer.
///
/// Triangles keep their original order and emit the original vertex indices
/// of their face vertices, so seam copies keep their own attributes.
pub(crate) fn bake_index_buffer(graph: &BufferGraph, index_type: IndexType) -> Result<IndexBuffer> {
    let mut buffer = IndexBuffer::allocate(index_type, graph.live_index_count);
    for tri in graph.triangles.iter().filter(|t| !t.removed) {
        for &fv in &tri.vertices {
            buffer.push(graph.face_vertices[fv].real_index)?;
        }
    }
    debug_assert_eq!(buffer.len(), graph.live_index_count);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{build_single, make_plane_grid, make_seamed_quad};

    #[test]
    fn test_bake_untouched_graph_reproduces_input() {
        let (positions, indices) = make_plane_grid(4);
        let graph = build_single(&positions, &indices);
        let baked = bake_index_buffer(&graph, IndexType::U16).unwrap();
        assert_eq!(baked.to_vec(), indices);
    }

    #[test]
    fn test_bake_keeps_seam_copies() {
        let (positions, indices) = make_seamed_quad();
        let graph = build_single(&positions, &indices);
        let baked = bake_index_buffer(&graph, IndexType::U32).unwrap();
        assert_eq!(baked.index_type(), IndexType::U32);
        assert_eq!(baked.to_vec(), vec![0, 1, 2, 0, 4, 3]);
    }

    #[test]
    fn test_bake_skips_removed_triangles() {
        let (positions, indices) = make_plane_grid(3);
        let mut graph = build_single(&positions, &indices);
        graph.collapse(4, 1);
        let baked = bake_index_buffer(&graph, IndexType::U16).unwrap();
        assert_eq!(baked.len(), 18);
        assert_eq!(
            baked.to_vec(),
            vec![0, 3, 1, 2, 1, 5, 3, 6, 1, 1, 6, 7, 1, 7, 5, 5, 7, 8]
        );
    }
}
