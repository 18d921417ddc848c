//! Mesh-level LOD generation
//!
//! Runs one [`ProgressiveMesh`] per submesh and stores the baked levels in the
//! submeshes' LOD face lists. Independent meshes can be processed in parallel
//! with [`MeshLodGenerator::generate_batch`].

use crate::config::{validate_reduction, AbandonPolicy, LodConfig, VertexReductionQuota};
use crate::progressive::{LodBuildReport, ProgressiveMesh};
use log::info;
use progmesh_core::{resolve_vertex_data, Error, IndexBuffer, Mesh, MeshLodUsage, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// What generation did to one submesh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubMeshLodSummary {
    pub collapses: usize,
    /// First level at which reduction ran out of valid collapses
    pub abandoned_at_level: Option<usize>,
    /// Index count of each generated level, finest first
    pub index_counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeshLodReport {
    pub submeshes: Vec<SubMeshLodSummary>,
}

impl MeshLodReport {
    /// Whether any submesh stopped reducing before its last level
    pub fn is_abandoned(&self) -> bool {
        self.submeshes.iter().any(|s| s.abandoned_at_level.is_some())
    }
}

/// Generates progressively reduced index buffers for whole meshes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshLodGenerator {
    pub quota: VertexReductionQuota,
    /// See [`LodConfig::reduction_value`]
    pub reduction_value: f32,
    pub abandon_policy: AbandonPolicy,
}

impl Default for MeshLodGenerator {
    fn default() -> Self {
        let config = LodConfig::default();
        Self {
            quota: config.quota,
            reduction_value: config.reduction_value,
            abandon_policy: config.abandon_policy,
        }
    }
}

impl MeshLodGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(quota: VertexReductionQuota, reduction_value: f32) -> Self {
        Self {
            quota,
            reduction_value,
            ..Self::default()
        }
    }

    pub fn with_abandon_policy(mut self, abandon_policy: AbandonPolicy) -> Self {
        self.abandon_policy = abandon_policy;
        self
    }

    fn config(&self, num_levels: usize) -> LodConfig {
        LodConfig {
            num_levels,
            quota: self.quota,
            reduction_value: self.reduction_value,
            abandon_policy: self.abandon_policy,
        }
    }

    /// Replace the LOD levels of `mesh` with one level per entry of `lod_values`.
    ///
    /// The values are recorded as the usage of each level and must be finite
    /// and strictly ascending. On error the mesh is left untouched.
    pub fn generate(&self, mesh: &mut Mesh, lod_values: &[f32]) -> Result<MeshLodReport> {
        validate_reduction(self.quota, self.reduction_value)?;
        validate_lod_values(lod_values)?;
        let config = self.config(lod_values.len());

        let mut builds = Vec::with_capacity(mesh.submeshes.len());
        for (index, submesh) in mesh.submeshes.iter().enumerate() {
            if !submesh.has_triangles() {
                let index_type = submesh.index_buffer.index_type();
                builds.push(LodBuildReport {
                    levels: vec![IndexBuffer::allocate(index_type, 0); lod_values.len()],
                    abandoned_at_level: None,
                    collapses: 0,
                });
                continue;
            }

            let vertex_data = resolve_vertex_data(mesh.shared_vertex_data.as_ref(), submesh)?;
            let build = ProgressiveMesh::new(vertex_data, &submesh.index_buffer)
                .and_then(|mut job| job.build(&config))
                .map_err(|e| match e {
                    Error::InvalidData(reason) => {
                        Error::InvalidData(format!("submesh {}: {}", index, reason))
                    }
                    other => other,
                })?;
            builds.push(build);
        }

        mesh.remove_lod_levels();
        let mut report = MeshLodReport::default();
        for (submesh, build) in mesh.submeshes.iter_mut().zip(builds) {
            report.submeshes.push(SubMeshLodSummary {
                collapses: build.collapses,
                abandoned_at_level: build.abandoned_at_level,
                index_counts: build.levels.iter().map(IndexBuffer::len).collect(),
            });
            submesh.lod_face_list = build.levels;
        }
        mesh.lod_usages = lod_values
            .iter()
            .map(|&user_value| MeshLodUsage { user_value })
            .collect();

        info!(
            "Generated {} LOD levels for {} submeshes ({} collapses)",
            lod_values.len(),
            report.submeshes.len(),
            report.submeshes.iter().map(|s| s.collapses).sum::<usize>()
        );
        Ok(report)
    }

    /// Generate LOD levels for many meshes in parallel, one job per mesh
    pub fn generate_batch(
        &self,
        meshes: &mut [Mesh],
        lod_values: &[f32],
    ) -> Vec<Result<MeshLodReport>> {
        meshes
            .par_iter_mut()
            .map(|mesh| self.generate(mesh, lod_values))
            .collect()
    }
}

fn validate_lod_values(lod_values: &[f32]) -> Result<()> {
    if let Some(v) = lod_values.iter().find(|v| !v.is_finite()) {
        return Err(Error::InvalidData(format!("LOD value {} is not finite", v)));
    }
    if lod_values.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(Error::InvalidData(
            "LOD values must be strictly ascending".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::make_plane_grid;
    use progmesh_core::{IndexType, Point3f, SubMesh, VertexBuffer};

    fn make_grid_mesh(size: usize) -> Mesh {
        let (positions, indices) = make_plane_grid(size);
        Mesh::from_positions_and_indices(&positions, &indices).unwrap()
    }

    #[test]
    fn test_generate_fills_lod_face_lists() {
        let mut mesh = make_grid_mesh(6);
        let generator = MeshLodGenerator::with_params(VertexReductionQuota::Proportional, 0.25);
        let report = generator.generate(&mut mesh, &[10.0, 20.0, 40.0]).unwrap();

        assert_eq!(mesh.num_lod_levels(), 4);
        assert_eq!(mesh.lod_usages[1].user_value, 20.0);
        let submesh = &mesh.submeshes[0];
        assert_eq!(submesh.lod_face_list.len(), 3);
        assert_eq!(report.submeshes.len(), 1);
        assert_eq!(report.submeshes[0].collapses, 20);
        assert!(!report.is_abandoned());

        let counts = &report.submeshes[0].index_counts;
        assert_eq!(counts.len(), 3);
        assert!(counts[0] < submesh.index_buffer.len());
        for level in 1..=3 {
            assert_eq!(submesh.lod_index_buffer(level).unwrap().len(), counts[level - 1]);
        }
    }

    #[test]
    fn test_generate_replaces_previous_levels() {
        let mut mesh = make_grid_mesh(5);
        let generator = MeshLodGenerator::new();
        generator.generate(&mut mesh, &[1.0, 2.0, 3.0]).unwrap();
        generator.generate(&mut mesh, &[5.0]).unwrap();
        assert_eq!(mesh.num_lod_levels(), 2);
        assert_eq!(mesh.submeshes[0].lod_face_list.len(), 1);
    }

    #[test]
    fn test_invalid_lod_values_leave_mesh_untouched() {
        let mut mesh = make_grid_mesh(4);
        let generator = MeshLodGenerator::new();
        generator.generate(&mut mesh, &[1.0]).unwrap();

        assert!(generator.generate(&mut mesh, &[2.0, 2.0]).is_err());
        assert!(generator.generate(&mut mesh, &[3.0, 1.0]).is_err());
        assert!(generator.generate(&mut mesh, &[f32::INFINITY]).is_err());
        assert_eq!(mesh.num_lod_levels(), 2);
        assert_eq!(mesh.lod_usages[0].user_value, 1.0);
    }

    #[test]
    fn test_invalid_reduction_value() {
        let mut mesh = make_grid_mesh(4);
        let generator = MeshLodGenerator::with_params(VertexReductionQuota::Proportional, 2.0);
        assert!(generator.generate(&mut mesh, &[1.0]).is_err());
    }

    #[test]
    fn test_empty_submesh_gets_empty_levels() {
        let mut mesh = make_grid_mesh(4);
        mesh.add_submesh(SubMesh::with_shared_vertices(IndexBuffer::allocate(IndexType::U32, 0)));

        let report = MeshLodGenerator::new().generate(&mut mesh, &[1.0, 2.0]).unwrap();
        let empty = &mesh.submeshes[1];
        assert_eq!(empty.lod_face_list.len(), 2);
        assert!(empty.lod_face_list.iter().all(|ib| ib.is_empty()));
        assert_eq!(empty.lod_face_list[0].index_type(), IndexType::U32);
        assert_eq!(report.submeshes[1].collapses, 0);
        assert_eq!(report.submeshes[1].index_counts, vec![0, 0]);
    }

    #[test]
    fn test_submeshes_are_reduced_independently() {
        let (positions, indices) = make_plane_grid(4);
        let mut mesh = Mesh::new();
        let ib = IndexBuffer::from_indices(IndexType::U16, &indices).unwrap();
        mesh.add_submesh(SubMesh::with_vertex_data(
            VertexBuffer::from_positions(&positions),
            ib.clone(),
        ));
        let shifted: Vec<Point3f> = positions
            .iter()
            .map(|p| Point3f::new(p.x + 10.0, p.y, p.z))
            .collect();
        mesh.add_submesh(SubMesh::with_vertex_data(VertexBuffer::from_positions(&shifted), ib));

        let report = MeshLodGenerator::new().generate(&mut mesh, &[1.0]).unwrap();
        assert_eq!(report.submeshes[0], report.submeshes[1]);
        assert_eq!(
            mesh.submeshes[0].lod_face_list[0],
            mesh.submeshes[1].lod_face_list[0]
        );
    }

    #[test]
    fn test_missing_vertex_data_is_an_error() {
        let (_, indices) = make_plane_grid(3);
        let mut mesh = Mesh::new();
        mesh.add_submesh(SubMesh::with_shared_vertices(
            IndexBuffer::from_indices(IndexType::U16, &indices).unwrap(),
        ));
        assert!(MeshLodGenerator::new().generate(&mut mesh, &[1.0]).is_err());
    }

    #[test]
    fn test_generate_batch() {
        let mut meshes = vec![make_grid_mesh(4), make_grid_mesh(6), Mesh::new()];
        // a malformed mesh fails on its own
        meshes.push(Mesh::from_positions_and_indices(&[Point3f::origin(); 3], &[0, 1, 2]).unwrap());

        let results = MeshLodGenerator::new().generate_batch(&mut meshes, &[1.0, 2.0]);
        assert_eq!(results.len(), 4);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results[2].as_ref().unwrap().submeshes.is_empty());
        assert!(matches!(results[3], Err(Error::DegenerateTriangle { .. })));
        assert_eq!(meshes[1].num_lod_levels(), 3);
        assert_eq!(meshes[3].num_lod_levels(), 1);
    }
}
