//! Edge collapse cost
//!
//! The cost of moving `src` onto `dest` is a heuristic in `[0, 1]` measuring
//! how much the local surface changes, or [`NEVER_COLLAPSE_COST`] when the
//! collapse would rip a seam, destroy a lone triangle or flip a face.

use crate::graph::{face_normal, BufferGraph, NEVER_COLLAPSE_COST};

/// Cost of pulling a border vertex inwards along an interior edge
pub const BORDER_INWARD_COST: f32 = 1.0;

/// Added to every border kinkiness so a straight border never ties with a
/// flat interior vertex
const BORDER_KINK_BIAS: f32 = 0.002;

impl BufferGraph {
    /// Cost of collapsing `src` onto its neighbor `dest` in this buffer
    pub(crate) fn edge_collapse_cost(&self, src: usize, dest: usize) -> f32 {
        let sides: Vec<usize> = self.vertices[src]
            .faces
            .iter()
            .copied()
            .filter(|&t| self.has_common_vertex(t, dest))
            .collect();

        let mut cost = if self.is_border(src) {
            if sides.len() > 1 {
                BORDER_INWARD_COST
            } else {
                self.border_kinkiness(src, dest)
                    .unwrap_or_else(|| self.curvature(src, &sides))
            }
        } else {
            self.curvature(src, &sides)
        };

        if self.vertices[src].seam && !self.vertices[dest].seam {
            cost = NEVER_COLLAPSE_COST;
        }

        if self.vertices[src].faces.len() == 1 && self.vertices[dest].faces.len() == 1 {
            cost = NEVER_COLLAPSE_COST;
        }

        if cost.is_finite() && self.flips_face(src, dest) {
            cost = NEVER_COLLAPSE_COST;
        }

        cost
    }

    /// Largest, over the faces of `src`, of the smallest normal deviation
    /// from any side triangle of the edge
    fn curvature(&self, src: usize, sides: &[usize]) -> f32 {
        let mut cost = 0.0f32;
        for &f in &self.vertices[src].faces {
            let normal = &self.triangles[f].normal;
            let min_curvature = sides
                .iter()
                .map(|&s| (1.0 - normal.dot(&self.triangles[s].normal)) * 0.5)
                .fold(1.0f32, f32::min);
            cost = cost.max(min_curvature);
        }
        cost.max(0.0)
    }

    /// How much a collapse along a border bends the remaining border.
    ///
    /// Compares the collapsing edge against the other border edges of `src`;
    /// a straight continuation costs almost nothing, a folded-back one costs 1.
    /// Returns `None` when `src` has no other border edge.
    fn border_kinkiness(&self, src: usize, dest: usize) -> Option<f32> {
        let origin = self.vertices[src].position;
        let collapse_edge = (origin - self.vertices[dest].position).try_normalize(0.0)?;

        self.vertices[src]
            .neighbors
            .iter()
            .copied()
            .filter(|&n| n != dest && self.shared_face_count(src, n) == 1)
            .filter_map(|n| (origin - self.vertices[n].position).try_normalize(0.0))
            .map(|other| other.dot(&collapse_edge))
            .reduce(f32::min)
            .map(|dot| ((dot + 1.0 + BORDER_KINK_BIAS) * 0.5).clamp(0.0, 1.0))
    }

    /// Whether moving `src` onto `dest` turns a surviving face by more than 90 degrees
    fn flips_face(&self, src: usize, dest: usize) -> bool {
        self.vertices[src]
            .faces
            .iter()
            .filter(|&&t| !self.has_common_vertex(t, dest))
            .any(|&t| {
                let [p0, p1, p2] = self.triangle_commons(t).map(|c| {
                    let c = if c == src { dest } else { c };
                    self.vertices[c].position
                });
                face_normal(&p0, &p1, &p2).dot(&self.triangles[t].normal) < 0.0
            })
    }
}
