//! Adjacency graph for progressive reduction
//!
//! Every supplied position buffer gets its own [`BufferGraph`]. Vertices that
//! share a position collapse onto one [`CommonVertex`]; the original vertex
//! slots survive as [`FaceVertex`] entries so baked index buffers still point
//! at real attribute rows. All graphs of one job are built from the same
//! welding, so vertex and triangle ids line up across buffers.

use itertools::Itertools;
use progmesh_core::{is_finite_point, Error, Point3f, PositionKey, Result, Vector3f};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

/// Cost marking an edge that must never be collapsed
pub const NEVER_COLLAPSE_COST: f32 = f32::INFINITY;

/// A welded graph node, one per distinct position
#[derive(Debug, Clone)]
pub(crate) struct CommonVertex {
    pub position: Point3f,
    /// First face vertex that mapped onto this node
    pub representative: usize,
    pub neighbors: BTreeSet<usize>,
    pub faces: BTreeSet<usize>,
    pub removed: bool,
    /// Set on a collapse source so isolation does not remove it twice
    pub to_be_removed: bool,
    pub seam: bool,
    pub collapse_cost: f32,
    pub collapse_target: Option<usize>,
}

/// One original vertex slot
#[derive(Debug, Clone, Copy)]
pub(crate) struct FaceVertex {
    pub real_index: u32,
    pub common: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Triangle {
    /// Face vertex ids, in winding order
    pub vertices: [usize; 3],
    pub normal: Vector3f,
    pub removed: bool,
}

/// Welding shared by every buffer graph of a job
#[derive(Debug, Clone)]
pub(crate) struct Welding {
    /// Common vertex id of each original vertex
    pub common_of: Vec<usize>,
    /// First original vertex of each common vertex
    pub representatives: Vec<usize>,
    pub seams: Vec<bool>,
}

impl Welding {
    /// Weld vertices that coincide in every buffer.
    ///
    /// Two vertices touching in one animation frame but apart in another stay
    /// separate, otherwise the other frame's graph would be corrupted. Such
    /// vertices still count as seams when they touch in the reference buffer,
    /// so the reference pose keeps them together.
    pub fn new(buffers: &[Vec<Point3f>]) -> Self {
        let vertex_count = buffers.first().map_or(0, Vec::len);
        let mut lookup: HashMap<Vec<PositionKey>, usize> = HashMap::with_capacity(vertex_count);
        let mut common_of = Vec::with_capacity(vertex_count);
        let mut representatives = Vec::new();
        let mut seams = Vec::new();

        for i in 0..vertex_count {
            let key: Vec<PositionKey> = buffers.iter().map(|b| PositionKey::new(&b[i])).collect();
            match lookup.entry(key) {
                Entry::Occupied(e) => {
                    let common = *e.get();
                    seams[common] = true;
                    common_of.push(common);
                }
                Entry::Vacant(e) => {
                    let common = representatives.len();
                    e.insert(common);
                    representatives.push(i);
                    seams.push(false);
                    common_of.push(common);
                }
            }
        }

        // commons sharing a reference position without being welded
        if let Some(reference) = buffers.first() {
            let mut by_reference: HashMap<PositionKey, Vec<usize>> = HashMap::new();
            for (common, &representative) in representatives.iter().enumerate() {
                by_reference
                    .entry(PositionKey::new(&reference[representative]))
                    .or_default()
                    .push(common);
            }
            for commons in by_reference.values().filter(|c| c.len() > 1) {
                for &common in commons {
                    seams[common] = true;
                }
            }
        }

        Self {
            common_of,
            representatives,
            seams,
        }
    }

    pub fn common_count(&self) -> usize {
        self.representatives.len()
    }
}

/// Check buffer shapes and the triangle list, returning the welding.
pub(crate) fn validate_input(buffers: &[Vec<Point3f>], indices: &[u32]) -> Result<Welding> {
    let reference = buffers
        .first()
        .ok_or_else(|| Error::InvalidData("No position buffer supplied".to_string()))?;
    let vertex_count = reference.len();

    for (b, buffer) in buffers.iter().enumerate() {
        if buffer.len() != vertex_count {
            return Err(Error::InvalidData(format!(
                "Position buffer {} has {} vertices, expected {}",
                b,
                buffer.len(),
                vertex_count
            )));
        }
        if let Some(i) = buffer.iter().position(|p| !is_finite_point(p)) {
            return Err(Error::InvalidData(format!(
                "Vertex {} of position buffer {} is not finite",
                i, b
            )));
        }
    }

    if indices.is_empty() {
        return Err(Error::InvalidData("Index buffer has no triangles".to_string()));
    }
    if indices.len() % 3 != 0 {
        return Err(Error::InvalidData(format!(
            "Index count {} is not a multiple of 3",
            indices.len()
        )));
    }
    if let Some((position, &index)) = indices
        .iter()
        .enumerate()
        .find(|(_, &i)| i as usize >= vertex_count)
    {
        return Err(Error::IndexOutOfRange {
            index,
            position,
            vertex_count,
        });
    }

    let welding = Welding::new(buffers);
    for (triangle, corners) in indices.chunks_exact(3).enumerate() {
        for (&a, &b) in corners.iter().tuple_combinations() {
            if welding.common_of[a as usize] == welding.common_of[b as usize] {
                return Err(Error::DegenerateTriangle { triangle, a, b });
            }
        }
    }

    Ok(welding)
}

/// Adjacency graph over one position buffer
#[derive(Debug, Clone)]
pub(crate) struct BufferGraph {
    pub vertices: Vec<CommonVertex>,
    pub face_vertices: Vec<FaceVertex>,
    pub triangles: Vec<Triangle>,
    /// Indices a bake of the current state would emit
    pub live_index_count: usize,
    /// Vertices whose neighbor set emptied during the current collapse
    pub(crate) isolation_candidates: Vec<usize>,
}

impl BufferGraph {
    /// Build the graph for one buffer. Input must have passed [`validate_input`].
    pub fn build(positions: &[Point3f], welding: &Welding, indices: &[u32]) -> Self {
        let vertices = welding
            .representatives
            .iter()
            .zip(&welding.seams)
            .map(|(&representative, &seam)| CommonVertex {
                position: positions[representative],
                representative,
                neighbors: BTreeSet::new(),
                faces: BTreeSet::new(),
                removed: false,
                to_be_removed: false,
                seam,
                collapse_cost: NEVER_COLLAPSE_COST,
                collapse_target: None,
            })
            .collect();

        let face_vertices = welding
            .common_of
            .iter()
            .enumerate()
            .map(|(i, &common)| FaceVertex {
                real_index: i as u32,
                common,
            })
            .collect();

        let mut graph = Self {
            vertices,
            face_vertices,
            triangles: Vec::with_capacity(indices.len() / 3),
            live_index_count: indices.len(),
            isolation_candidates: Vec::new(),
        };

        for corners in indices.chunks_exact(3) {
            let t = graph.triangles.len();
            let vertices = [corners[0] as usize, corners[1] as usize, corners[2] as usize];
            graph.triangles.push(Triangle {
                vertices,
                normal: Vector3f::zeros(),
                removed: false,
            });
            graph.triangles[t].normal = graph.compute_normal(t);

            let commons = graph.triangle_commons(t);
            for (&a, &b) in commons.iter().tuple_combinations() {
                graph.vertices[a].neighbors.insert(b);
                graph.vertices[b].neighbors.insert(a);
            }
            for &c in &commons {
                graph.vertices[c].faces.insert(t);
            }
        }

        // Positions no triangle references take no part in reduction
        for vertex in &mut graph.vertices {
            if vertex.faces.is_empty() {
                vertex.removed = true;
            }
        }

        graph
    }

    pub fn triangle_commons(&self, t: usize) -> [usize; 3] {
        let [a, b, c] = self.triangles[t].vertices;
        [
            self.face_vertices[a].common,
            self.face_vertices[b].common,
            self.face_vertices[c].common,
        ]
    }

    pub fn has_common_vertex(&self, t: usize, v: usize) -> bool {
        self.triangle_commons(t).contains(&v)
    }

    /// Face vertex of triangle `t` that maps onto common vertex `v`
    pub fn face_vertex_of(&self, t: usize, v: usize) -> Option<usize> {
        self.triangles[t]
            .vertices
            .iter()
            .copied()
            .find(|&fv| self.face_vertices[fv].common == v)
    }

    /// Unit normal of triangle `t` as `(v1 - v0) x (v2 - v1)`
    pub fn compute_normal(&self, t: usize) -> Vector3f {
        let [a, b, c] = self.triangle_commons(t);
        face_normal(
            &self.vertices[a].position,
            &self.vertices[b].position,
            &self.vertices[c].position,
        )
    }

    /// Number of live triangles referencing both `a` and `b`
    pub fn shared_face_count(&self, a: usize, b: usize) -> usize {
        self.vertices[a]
            .faces
            .iter()
            .filter(|&&t| self.has_common_vertex(t, b))
            .count()
    }

    /// A vertex is on a border when one of its edges has a single triangle
    pub fn is_border(&self, v: usize) -> bool {
        self.vertices[v]
            .neighbors
            .iter()
            .any(|&n| self.shared_face_count(v, n) == 1)
    }

    pub fn live_vertex_count(&self) -> usize {
        self.vertices.iter().filter(|v| !v.removed).count()
    }

    pub fn live_triangle_count(&self) -> usize {
        self.live_index_count / 3
    }

    /// Drop `n` from `v`'s neighbors unless a live triangle still joins them
    pub fn remove_if_non_neighbor(&mut self, v: usize, n: usize) {
        if !self.vertices[v].neighbors.contains(&n) {
            return;
        }
        if self.vertices[v]
            .faces
            .iter()
            .any(|&t| self.has_common_vertex(t, n))
        {
            return;
        }
        self.vertices[v].neighbors.remove(&n);
        if self.vertices[v].neighbors.is_empty() {
            self.isolation_candidates.push(v);
        }
    }

    /// Detach vertex `v` from the graph and tombstone it
    pub fn remove_vertex(&mut self, v: usize) {
        let neighbors = std::mem::take(&mut self.vertices[v].neighbors);
        for n in neighbors {
            self.vertices[n].neighbors.remove(&v);
            if self.vertices[n].neighbors.is_empty() {
                self.isolation_candidates.push(n);
            }
        }
        let vertex = &mut self.vertices[v];
        vertex.removed = true;
        vertex.collapse_cost = NEVER_COLLAPSE_COST;
        vertex.collapse_target = None;
    }

    /// Check the neighbor and incidence invariants
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut live_triangles = 0;
        for (t, tri) in self.triangles.iter().enumerate() {
            if tri.removed {
                continue;
            }
            live_triangles += 1;
            let commons = self.triangle_commons(t);
            for (&a, &b) in commons.iter().tuple_combinations() {
                if a == b {
                    return Err(format!("triangle {} repeats vertex {}", t, a));
                }
                let linked = self.vertices[a].neighbors.contains(&b)
                    && self.vertices[b].neighbors.contains(&a);
                if !linked {
                    return Err(format!(
                        "triangle {} joins {} and {} without a neighbor link",
                        t, a, b
                    ));
                }
            }
            for &c in &commons {
                if self.vertices[c].removed {
                    return Err(format!("triangle {} references removed vertex {}", t, c));
                }
                if !self.vertices[c].faces.contains(&t) {
                    return Err(format!("vertex {} is missing incident triangle {}", c, t));
                }
            }
        }

        if live_triangles * 3 != self.live_index_count {
            return Err(format!(
                "live index count {} disagrees with {} live triangles",
                self.live_index_count, live_triangles
            ));
        }

        for (v, vertex) in self.vertices.iter().enumerate() {
            if vertex.removed {
                if !vertex.neighbors.is_empty() || !vertex.faces.is_empty() {
                    return Err(format!("removed vertex {} is still linked", v));
                }
                continue;
            }
            for &t in &vertex.faces {
                if self.triangles[t].removed || !self.has_common_vertex(t, v) {
                    return Err(format!("vertex {} lists stale triangle {}", v, t));
                }
            }
            for &n in &vertex.neighbors {
                if self.vertices[n].removed {
                    return Err(format!("vertex {} lists removed neighbor {}", v, n));
                }
                if !self.vertices[n].neighbors.contains(&v) {
                    return Err(format!("neighbor link {} -> {} is one-sided", v, n));
                }
                if self.shared_face_count(v, n) == 0 {
                    return Err(format!("vertices {} and {} share no live triangle", v, n));
                }
            }
        }

        Ok(())
    }
}

/// Unit normal `(p1 - p0) x (p2 - p1)`, or zero for a zero-area triangle
pub(crate) fn face_normal(p0: &Point3f, p1: &Point3f, p2: &Point3f) -> Vector3f {
    (p1 - p0)
        .cross(&(p2 - p1))
        .try_normalize(0.0)
        .unwrap_or_else(Vector3f::zeros)
}
