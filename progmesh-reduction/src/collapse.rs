//! Edge collapse graph surgery

use crate::graph::BufferGraph;
use std::collections::BTreeSet;

/// What a single collapse did to one buffer graph
#[derive(Debug, Clone, Default)]
pub(crate) struct CollapseOutcome {
    /// Vertices whose cost must be re-evaluated
    pub recompute: BTreeSet<usize>,
    pub removed_triangles: usize,
    /// Vertices left without neighbors and removed along the way
    pub orphans: Vec<usize>,
}

impl BufferGraph {
    /// Number of live triangles a collapse of `src` onto `dest` would delete
    pub(crate) fn doomed_triangle_count(&self, src: usize, dest: usize) -> usize {
        self.shared_face_count(src, dest)
    }

    /// Merge `src` into its neighbor `dest`.
    ///
    /// Triangles on the edge are deleted, the other triangles of `src` are
    /// re-pointed at `dest`, and `src` is removed from the graph.
    pub(crate) fn collapse(&mut self, src: usize, dest: usize) -> CollapseOutcome {
        let mut recompute = BTreeSet::new();
        recompute.insert(dest);
        recompute.extend(self.vertices[src].neighbors.iter().copied());
        recompute.extend(self.vertices[dest].neighbors.iter().copied());
        recompute.remove(&src);

        self.vertices[src].to_be_removed = true;

        let faces: Vec<usize> = self.vertices[src].faces.iter().copied().collect();
        let (removals, replacements): (Vec<usize>, Vec<usize>) = faces
            .into_iter()
            .partition(|&t| self.has_common_vertex(t, dest));

        for &t in &removals {
            self.remove_triangle(t);
            self.live_index_count -= 3;
        }

        for &t in &replacements {
            let Some(src_fv) = self.face_vertex_of(t, src) else {
                continue;
            };
            let dest_fv = self.matching_face_vertex(&removals, src_fv, dest);
            self.replace_vertex(t, src_fv, dest_fv);
        }

        self.remove_vertex(src);
        let orphans = self.remove_orphans();

        CollapseOutcome {
            recompute,
            removed_triangles: removals.len(),
            orphans,
        }
    }

    /// Face vertex to substitute for `src_fv` when it moves onto `dest`.
    ///
    /// Prefers a deleted triangle that used the same copy of `src`, so each
    /// seam copy keeps following its own attributes.
    fn matching_face_vertex(&self, removals: &[usize], src_fv: usize, dest: usize) -> usize {
        removals
            .iter()
            .find(|&&t| self.triangles[t].vertices.contains(&src_fv))
            .or_else(|| removals.first())
            .and_then(|&t| self.face_vertex_of(t, dest))
            .unwrap_or(self.vertices[dest].representative)
    }

    fn remove_triangle(&mut self, t: usize) {
        self.triangles[t].removed = true;
        let commons = self.triangle_commons(t);
        for &c in &commons {
            self.vertices[c].faces.remove(&t);
        }
        for i in 0..3 {
            let a = commons[i];
            let b = commons[(i + 1) % 3];
            self.remove_if_non_neighbor(a, b);
            self.remove_if_non_neighbor(b, a);
        }
    }

    fn replace_vertex(&mut self, t: usize, old_fv: usize, new_fv: usize) {
        let old = self.face_vertices[old_fv].common;
        let new = self.face_vertices[new_fv].common;

        for slot in self.triangles[t].vertices.iter_mut() {
            if *slot == old_fv {
                *slot = new_fv;
            }
        }
        self.vertices[old].faces.remove(&t);
        self.vertices[new].faces.insert(t);

        let commons = self.triangle_commons(t);
        for &c in &commons {
            self.remove_if_non_neighbor(old, c);
            self.remove_if_non_neighbor(c, old);
        }
        for &a in &commons {
            for &b in &commons {
                if a != b {
                    self.vertices[a].neighbors.insert(b);
                }
            }
        }

        self.triangles[t].normal = self.compute_normal(t);
    }

    /// Remove every vertex left without neighbors by the current collapse
    fn remove_orphans(&mut self) -> Vec<usize> {
        let mut orphans = Vec::new();
        while let Some(v) = self.isolation_candidates.pop() {
            let vertex = &self.vertices[v];
            if vertex.removed || vertex.to_be_removed || !vertex.neighbors.is_empty() {
                continue;
            }
            self.remove_vertex(v);
            orphans.push(v);
        }
        orphans.sort_unstable();
        orphans
    }
}
