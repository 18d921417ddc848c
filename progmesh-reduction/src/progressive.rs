//! Progressive mesh reduction job
//!
//! A [`ProgressiveMesh`] owns every piece of state of one reduction run: one
//! adjacency graph per position buffer, the worst collapse cost of each
//! vertex across those buffers, and the chosen collapse targets. Jobs share
//! nothing, so independent meshes can be reduced on separate threads.
//!
//! The reduction is a greedy edge collapse: repeatedly pick the vertex whose
//! cheapest collapse is cheapest overall, merge it into its target, and
//! re-cost the vertices around the change. Index buffers are baked between
//! batches of collapses, giving progressively coarser LOD levels.

use crate::bake::bake_index_buffer;
use crate::config::{AbandonPolicy, LodConfig};
use crate::graph::{validate_input, BufferGraph, NEVER_COLLAPSE_COST};
use log::{debug, trace, warn};
use progmesh_core::{Error, IndexBuffer, IndexSource, IndexType, PositionSource, Result};
use serde::{Deserialize, Serialize};

/// A collapse performed by the job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseRecord {
    /// Common vertex merged away
    pub source: usize,
    /// Common vertex it was merged into
    pub target: usize,
    pub removed_triangles: usize,
    /// Vertices removed because the collapse left them without neighbors
    pub orphans: Vec<usize>,
}

/// Result of [`ProgressiveMesh::build`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodBuildReport {
    /// Baked levels, finest first
    pub levels: Vec<IndexBuffer>,
    /// First level at which no valid collapse remained, if any
    pub abandoned_at_level: Option<usize>,
    /// Total collapses performed by the job so far
    pub collapses: usize,
}

/// State of one progressive reduction run
#[derive(Debug, Clone)]
pub struct ProgressiveMesh {
    /// Graph 0 is built from the reference buffer and is the one baked
    graphs: Vec<BufferGraph>,
    worst_costs: Vec<f32>,
    index_type: IndexType,
    collapses: usize,
}

impl ProgressiveMesh {
    /// Prepare a reduction of a single position buffer
    pub fn new<P, I>(positions: &P, indices: &I) -> Result<Self>
    where
        P: PositionSource + ?Sized,
        I: IndexSource + ?Sized,
    {
        Self::with_extra_buffers(positions, &[], indices)
    }

    /// Prepare a reduction that must look right in every supplied buffer.
    ///
    /// `extra` holds alternative positions for the same vertices, such as
    /// animation frames. Costs are the worst over all buffers, and only the
    /// reference buffer's topology is baked.
    pub fn with_extra_buffers<P, I>(reference: &P, extra: &[&P], indices: &I) -> Result<Self>
    where
        P: PositionSource + ?Sized,
        I: IndexSource + ?Sized,
    {
        let mut buffers = Vec::with_capacity(extra.len() + 1);
        buffers.push(reference.read_positions()?);
        for source in extra {
            buffers.push(source.read_positions()?);
        }
        let index_list = indices.read_indices()?;

        let welding = validate_input(&buffers, &index_list)?;
        let graphs: Vec<BufferGraph> = buffers
            .iter()
            .map(|positions| BufferGraph::build(positions, &welding, &index_list))
            .collect();

        let common_count = welding.common_count();
        let mut mesh = Self {
            graphs,
            worst_costs: vec![NEVER_COLLAPSE_COST; common_count],
            index_type: indices.index_type(),
            collapses: 0,
        };
        mesh.compute_all_costs();

        debug!(
            "Prepared progressive mesh: {} vertices welded into {}, {} triangles, {} buffers",
            buffers[0].len(),
            common_count,
            index_list.len() / 3,
            buffers.len()
        );
        Ok(mesh)
    }

    fn reference(&self) -> &BufferGraph {
        &self.graphs[0]
    }

    /// Number of welded vertices, removed ones included
    pub fn common_vertex_count(&self) -> usize {
        self.worst_costs.len()
    }

    pub fn live_vertex_count(&self) -> usize {
        self.reference().live_vertex_count()
    }

    pub fn live_triangle_count(&self) -> usize {
        self.reference().live_triangle_count()
    }

    /// Indices the next bake will emit
    pub fn live_index_count(&self) -> usize {
        self.reference().live_index_count
    }

    pub fn collapse_count(&self) -> usize {
        self.collapses
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    /// Welded vertex an original vertex maps onto
    pub fn common_vertex_of(&self, vertex_index: usize) -> Option<usize> {
        self.reference()
            .face_vertices
            .get(vertex_index)
            .map(|fv| fv.common)
    }

    pub fn is_seam(&self, v: usize) -> bool {
        self.reference().vertices.get(v).is_some_and(|cv| cv.seam)
    }

    pub fn is_removed(&self, v: usize) -> bool {
        self.reference().vertices.get(v).map_or(true, |cv| cv.removed)
    }

    /// Current neighbors of a welded vertex, ascending
    pub fn neighbors(&self, v: usize) -> Vec<usize> {
        self.reference()
            .vertices
            .get(v)
            .map(|cv| cv.neighbors.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Cheapest collapse cost of `v`, worst case over all buffers
    pub fn collapse_cost(&self, v: usize) -> f32 {
        self.worst_costs.get(v).copied().unwrap_or(NEVER_COLLAPSE_COST)
    }

    pub fn collapse_target(&self, v: usize) -> Option<usize> {
        self.reference().vertices.get(v).and_then(|cv| cv.collapse_target)
    }

    /// Cost of the chosen collapse of `v` as seen by a single buffer
    pub fn buffer_collapse_cost(&self, buffer: usize, v: usize) -> Option<f32> {
        self.graphs
            .get(buffer)
            .and_then(|g| g.vertices.get(v))
            .map(|cv| cv.collapse_cost)
    }

    /// Cost of collapsing `src` onto `dest`, worst case over all buffers.
    ///
    /// Returns [`NEVER_COLLAPSE_COST`] when the two are not live neighbors.
    pub fn edge_collapse_cost(&self, src: usize, dest: usize) -> f32 {
        let linked = self
            .reference()
            .vertices
            .get(src)
            .is_some_and(|cv| !cv.removed && cv.neighbors.contains(&dest));
        if !linked {
            return NEVER_COLLAPSE_COST;
        }
        self.graphs
            .iter()
            .map(|g| g.edge_collapse_cost(src, dest))
            .fold(0.0, f32::max)
    }

    fn compute_all_costs(&mut self) {
        for v in 0..self.worst_costs.len() {
            self.compute_cost_at_vertex(v);
        }
    }

    /// Pick the neighbor whose worst-case cost is lowest and cache it
    fn compute_cost_at_vertex(&mut self, v: usize) {
        let best = {
            let vertex = &self.reference().vertices[v];
            if vertex.removed {
                None
            } else {
                let mut best: Option<(usize, f32)> = None;
                for &n in &vertex.neighbors {
                    let cost = self.edge_collapse_cost(v, n);
                    if best.map_or(true, |(_, c)| cost < c) {
                        best = Some((n, cost));
                    }
                }
                best
            }
        };

        let (target, worst) = match best {
            Some((n, cost)) => (Some(n), cost),
            None => (None, NEVER_COLLAPSE_COST),
        };
        self.worst_costs[v] = worst;

        for graph in &mut self.graphs {
            let cost = match target {
                Some(n) => graph.edge_collapse_cost(v, n),
                None => NEVER_COLLAPSE_COST,
            };
            let vertex = &mut graph.vertices[v];
            vertex.collapse_cost = cost;
            vertex.collapse_target = target;
        }
    }

    /// Vertex with the globally cheapest collapse, lowest id on ties
    pub fn next_collapser(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (v, &cost) in self.worst_costs.iter().enumerate() {
            if cost.is_finite() && best.map_or(true, |(_, c)| cost < c) {
                best = Some((v, cost));
            }
        }
        best.map(|(v, _)| v)
    }

    /// Collapse `src` onto its cached target.
    ///
    /// Does nothing and returns `None` when `src` has no finite-cost target,
    /// or when the collapse would delete every remaining triangle; in the
    /// latter case `src` is taken out of the running.
    pub fn collapse(&mut self, src: usize) -> Option<CollapseRecord> {
        let dest = self.collapse_target(src)?;
        if !self.collapse_cost(src).is_finite() {
            return None;
        }

        if self.reference().doomed_triangle_count(src, dest) >= self.live_triangle_count() {
            debug!(
                "Refusing to collapse {} into {}: no triangles would remain",
                src, dest
            );
            self.worst_costs[src] = NEVER_COLLAPSE_COST;
            return None;
        }

        self.worst_costs[src] = NEVER_COLLAPSE_COST;

        let mut outcomes = self
            .graphs
            .iter_mut()
            .map(|graph| graph.collapse(src, dest))
            .collect::<Vec<_>>();
        let outcome = outcomes.swap_remove(0);

        for &v in &outcome.recompute {
            self.compute_cost_at_vertex(v);
        }
        for &v in &outcome.orphans {
            self.worst_costs[v] = NEVER_COLLAPSE_COST;
        }
        self.collapses += 1;

        trace!(
            "Collapsed {} into {}: {} triangles removed, {} orphans",
            src,
            dest,
            outcome.removed_triangles,
            outcome.orphans.len()
        );
        Some(CollapseRecord {
            source: src,
            target: dest,
            removed_triangles: outcome.removed_triangles,
            orphans: outcome.orphans,
        })
    }

    /// Perform the globally cheapest valid collapse.
    ///
    /// Returns `None` once no vertex has a valid collapse left.
    pub fn collapse_next(&mut self) -> Option<CollapseRecord> {
        while let Some(src) = self.next_collapser() {
            if let Some(record) = self.collapse(src) {
                return Some(record);
            }
        }
        None
    }

    /// Snapshot the current state as an index buffer of the source width
    pub fn bake_lod(&self) -> Result<IndexBuffer> {
        bake_index_buffer(self.reference(), self.index_type)
    }

    /// Bake `config.num_levels` progressively coarser levels.
    ///
    /// Each level collapses the vertices its quota asks for, never leaving
    /// fewer than three live vertices, then bakes the result.
    pub fn build(&mut self, config: &LodConfig) -> Result<LodBuildReport> {
        config.validate()?;

        let mut levels = Vec::with_capacity(config.num_levels);
        let mut abandoned_at_level = None;

        for level in 0..config.num_levels {
            if abandoned_at_level.is_none() {
                let live = self.live_vertex_count();
                let requested = config.quota.collapses_for(live, config.reduction_value);
                let quota = requested.min(live.saturating_sub(3));

                for _ in 0..quota {
                    if self.collapse_next().is_none() {
                        abandoned_at_level = Some(level);
                        break;
                    }
                }

                if abandoned_at_level.is_some() {
                    if config.abandon_policy == AbandonPolicy::Fail {
                        return Err(Error::ReductionExhausted {
                            level,
                            collapses: self.collapses,
                        });
                    }
                    warn!(
                        "No valid collapse left at LOD level {} after {} collapses; \
                         remaining levels repeat the last state",
                        level, self.collapses
                    );
                }
            }

            let lod = self.bake_lod()?;
            debug!(
                "Baked LOD level {}: {} triangles, {} live vertices",
                level,
                lod.triangle_count(),
                self.live_vertex_count()
            );
            levels.push(lod);
        }

        Ok(LodBuildReport {
            levels,
            abandoned_at_level,
            collapses: self.collapses,
        })
    }

    /// Check the neighbor and incidence invariants of every buffer graph
    pub fn validate_adjacency(&self) -> Result<()> {
        for (b, graph) in self.graphs.iter().enumerate() {
            graph
                .validate()
                .map_err(|reason| Error::Algorithm(format!("buffer {}: {}", b, reason)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VertexReductionQuota;
    use crate::graph::tests::{make_plane_grid, make_tetrahedron};
    use progmesh_core::{Point3f, VertexBuffer};

    fn index_buffer(indices: &[u32]) -> IndexBuffer {
        IndexBuffer::from_indices(IndexType::U16, indices).unwrap()
    }

    fn make_grid_mesh(size: usize) -> ProgressiveMesh {
        let (positions, indices) = make_plane_grid(size);
        ProgressiveMesh::new(positions.as_slice(), &index_buffer(&indices)).unwrap()
    }

    #[test]
    fn test_initial_costs() {
        let mesh = make_grid_mesh(3);
        assert_eq!(mesh.common_vertex_count(), 9);
        assert_eq!(mesh.live_vertex_count(), 9);
        assert_eq!(mesh.live_triangle_count(), 8);
        // a flat interior is free, a straight border nearly so
        assert_eq!(mesh.collapse_cost(4), 0.0);
        assert_eq!(mesh.collapse_target(4), Some(1));
        let border = mesh.collapse_cost(1);
        assert!(border > 0.0 && border < 0.01, "border cost was {}", border);
        assert_eq!(mesh.collapse_target(1), Some(0));
        assert!((mesh.collapse_cost(0) - 0.501).abs() < 1e-6);
        assert!(mesh.validate_adjacency().is_ok());
    }

    #[test]
    fn test_next_collapser_breaks_ties_by_lowest_index() {
        // every interior vertex of a flat grid costs nothing
        let mesh = make_grid_mesh(5);
        for v in [6, 7, 8, 12, 18] {
            assert_eq!(mesh.collapse_cost(v), 0.0);
        }
        assert_eq!(mesh.next_collapser(), Some(6));
    }

    #[test]
    fn test_interior_collapses_before_straight_border() {
        let mesh = make_grid_mesh(3);
        assert_eq!(mesh.next_collapser(), Some(4));
    }

    #[test]
    fn test_collapse_next_updates_state() {
        let mut mesh = make_grid_mesh(3);
        let record = mesh.collapse_next().unwrap();
        assert_eq!(record.source, 4);
        assert_eq!(record.target, 1);
        assert_eq!(record.removed_triangles, 2);
        assert!(record.orphans.is_empty());
        assert!(mesh.is_removed(4));
        assert_eq!(mesh.collapse_cost(4), NEVER_COLLAPSE_COST);
        assert_eq!(mesh.collapse_target(4), None);
        assert_eq!(mesh.live_vertex_count(), 8);
        assert_eq!(mesh.live_index_count(), 18);
        assert_eq!(mesh.collapse_count(), 1);
        assert!(mesh.validate_adjacency().is_ok());
    }

    #[test]
    fn test_collapse_without_target_is_noop() {
        let positions = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
        ];
        let mut mesh =
            ProgressiveMesh::new(positions.as_slice(), &index_buffer(&[0, 1, 2])).unwrap();
        assert_eq!(mesh.next_collapser(), None);
        assert!(mesh.collapse(0).is_none());
        assert!(mesh.collapse(7).is_none());
        assert_eq!(mesh.live_triangle_count(), 1);
    }

    #[test]
    fn test_build_clamps_to_three_vertices() {
        let (positions, indices) = make_tetrahedron();
        let mut mesh = ProgressiveMesh::new(positions.as_slice(), &index_buffer(&indices)).unwrap();
        let config = LodConfig::with_params(2, VertexReductionQuota::Constant, 10.0);
        let report = mesh.build(&config).unwrap();

        assert_eq!(report.levels.len(), 2);
        assert_eq!(report.collapses, 1);
        assert_eq!(report.abandoned_at_level, None);
        assert_eq!(mesh.live_vertex_count(), 3);
        assert_eq!(report.levels[0].len(), 6);
        assert_eq!(report.levels[0], report.levels[1]);
    }

    /// Two triangles sharing no vertex: every collapse would destroy one
    fn make_disjoint_pair() -> (Vec<Point3f>, Vec<u32>) {
        (
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(5.0, 0.0, 0.0),
                Point3f::new(6.0, 0.0, 0.0),
                Point3f::new(5.0, 1.0, 0.0),
            ],
            vec![0, 1, 2, 3, 4, 5],
        )
    }

    #[test]
    fn test_exhausted_reduction_duplicates_last_level() {
        let (positions, indices) = make_disjoint_pair();
        let mut mesh = ProgressiveMesh::new(positions.as_slice(), &index_buffer(&indices)).unwrap();
        assert_eq!(mesh.next_collapser(), None);

        let config = LodConfig::with_params(3, VertexReductionQuota::Constant, 1.0);
        let report = mesh.build(&config).unwrap();
        assert_eq!(report.abandoned_at_level, Some(0));
        assert_eq!(report.collapses, 0);
        assert_eq!(report.levels.len(), 3);
        for level in &report.levels {
            assert_eq!(level.to_vec(), indices);
        }
    }

    #[test]
    fn test_abandon_policy_fail() {
        let (positions, indices) = make_disjoint_pair();
        let mut mesh = ProgressiveMesh::new(positions.as_slice(), &index_buffer(&indices)).unwrap();
        let config = LodConfig::with_params(2, VertexReductionQuota::Constant, 1.0)
            .with_abandon_policy(AbandonPolicy::Fail);
        assert!(matches!(
            mesh.build(&config),
            Err(Error::ReductionExhausted { level: 0, collapses: 0 })
        ));
    }

    #[test]
    fn test_last_triangles_are_never_collapsed_away() {
        let (positions, indices) = make_tetrahedron();
        let mut mesh = ProgressiveMesh::new(positions.as_slice(), &index_buffer(&indices)).unwrap();
        assert!(mesh.collapse_next().is_some());
        assert_eq!(mesh.live_triangle_count(), 2);

        // any further collapse would delete both remaining triangles
        assert!(mesh.collapse_next().is_none());
        assert_eq!(mesh.live_triangle_count(), 2);
        assert_eq!(mesh.live_vertex_count(), 3);
        assert!(mesh.validate_adjacency().is_ok());
    }

    #[test]
    fn test_proportional_levels() {
        let mut mesh = make_grid_mesh(6);
        let config = LodConfig::with_params(3, VertexReductionQuota::Proportional, 0.25);
        let report = mesh.build(&config).unwrap();
        assert_eq!(report.levels.len(), 3);
        // a quarter of the live vertices goes at every level: 9, 6 and 5
        assert_eq!(report.collapses, 20);
        assert_eq!(report.abandoned_at_level, None);
        for pair in report.levels.windows(2) {
            assert!(pair[1].len() <= pair[0].len());
        }
        assert!(mesh.validate_adjacency().is_ok());
    }

    #[test]
    fn test_index_width_is_preserved() {
        let (positions, indices) = make_plane_grid(4);
        let ib = IndexBuffer::from_indices(IndexType::U32, &indices).unwrap();
        let mut mesh = ProgressiveMesh::new(positions.as_slice(), &ib).unwrap();
        let report = mesh.build(&LodConfig::default()).unwrap();
        assert_eq!(mesh.index_type(), IndexType::U32);
        assert_eq!(report.levels[0].index_type(), IndexType::U32);
    }

    #[test]
    fn test_vertex_buffer_source() {
        let (positions, indices) = make_plane_grid(3);
        let vb = VertexBuffer::from_positions(&positions);
        let mesh = ProgressiveMesh::new(&vb, &index_buffer(&indices)).unwrap();
        assert_eq!(mesh.live_vertex_count(), 9);
    }

    #[test]
    fn test_extra_buffer_raises_costs() {
        let (positions, indices) = make_plane_grid(3);
        let mut bent = positions.clone();
        bent[4].z = 1.0;

        let flat = ProgressiveMesh::new(positions.as_slice(), &index_buffer(&indices)).unwrap();
        let animated = ProgressiveMesh::with_extra_buffers(
            positions.as_slice(),
            &[bent.as_slice()],
            &index_buffer(&indices),
        )
        .unwrap();

        assert_eq!(flat.edge_collapse_cost(4, 1), 0.0);
        assert!(animated.edge_collapse_cost(4, 1) > 0.0);
        assert!(animated.collapse_cost(4) > flat.collapse_cost(4));
        // the flat reference alone would not object to the chosen collapse
        assert_eq!(animated.buffer_collapse_cost(0, 4), Some(0.0));
        assert_eq!(animated.buffer_collapse_cost(1, 4), Some(animated.collapse_cost(4)));
        assert_eq!(animated.buffer_collapse_cost(2, 4), None);
        assert!(animated.validate_adjacency().is_ok());
    }

    #[test]
    fn test_edge_cost_of_unlinked_pair() {
        let mesh = make_grid_mesh(3);
        assert_eq!(mesh.edge_collapse_cost(0, 8), NEVER_COLLAPSE_COST);
        assert_eq!(mesh.edge_collapse_cost(99, 0), NEVER_COLLAPSE_COST);
    }
}
