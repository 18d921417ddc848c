//! LOD chain demo
//!
//! Builds a chain of reduced levels for a procedurally generated mesh and
//! prints the triangle count of every level.
//!
//! Usage: lod_chain [sphere|terrain] [levels] [reduction]
//!
//! Set `RUST_LOG=debug` to see the per-level log output.

use anyhow::{bail, Context, Result};
use log::info;
use progmesh_core::{Mesh, Point3f};
use progmesh_reduction::{MeshLodGenerator, VertexReductionQuota};
use std::env;

fn uv_sphere(stacks: usize, slices: usize) -> (Vec<Point3f>, Vec<u32>) {
    let mut vertices = vec![Point3f::new(0.0, 0.0, 1.0)];
    for i in 1..stacks {
        let theta = std::f32::consts::PI * i as f32 / stacks as f32;
        let first = vertices.len();
        for j in 0..slices {
            let phi = 2.0 * std::f32::consts::PI * j as f32 / slices as f32;
            vertices.push(Point3f::new(
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            ));
        }
        // texture seam
        vertices.push(vertices[first]);
    }
    vertices.push(Point3f::new(0.0, 0.0, -1.0));
    let bottom = (vertices.len() - 1) as u32;

    let row = |i: usize, j: usize| (1 + (i - 1) * (slices + 1) + j) as u32;
    let mut indices = Vec::new();
    for j in 0..slices {
        indices.extend_from_slice(&[0, row(1, j), row(1, j + 1)]);
    }
    for i in 1..(stacks - 1) {
        for j in 0..slices {
            let (a, b) = (row(i, j), row(i, j + 1));
            let (c, d) = (row(i + 1, j), row(i + 1, j + 1));
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }
    for j in 0..slices {
        indices.extend_from_slice(&[row(stacks - 1, j), bottom, row(stacks - 1, j + 1)]);
    }
    (vertices, indices)
}

fn terrain(size: usize) -> (Vec<Point3f>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 * 0.35;
            let fy = y as f32 * 0.25;
            vertices.push(Point3f::new(x as f32, y as f32, fx.sin() * fy.cos() * 1.5));
        }
    }
    let mut indices = Vec::with_capacity((size - 1) * (size - 1) * 6);
    for y in 0..(size - 1) {
        for x in 0..(size - 1) {
            let tl = (y * size + x) as u32;
            let tr = tl + 1;
            let bl = ((y + 1) * size + x) as u32;
            let br = bl + 1;
            indices.extend_from_slice(&[tl, bl, tr, tr, bl, br]);
        }
    }
    (vertices, indices)
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let shape = args.get(1).map(String::as_str).unwrap_or("sphere");
    let levels: usize = match args.get(2) {
        Some(arg) => arg.parse().with_context(|| format!("invalid level count '{}'", arg))?,
        None => 5,
    };
    let reduction: f32 = match args.get(3) {
        Some(arg) => arg.parse().with_context(|| format!("invalid reduction '{}'", arg))?,
        None => 0.3,
    };

    let (positions, indices) = match shape {
        "sphere" => uv_sphere(24, 32),
        "terrain" => terrain(48),
        other => bail!("unknown shape '{}', expected 'sphere' or 'terrain'", other),
    };
    let mut mesh = Mesh::from_positions_and_indices(&positions, &indices)
        .context("failed to build the source mesh")?;

    let lod_values: Vec<f32> = (1..=levels).map(|i| i as f32 * 10.0).collect();
    let generator = MeshLodGenerator::with_params(VertexReductionQuota::Proportional, reduction);
    info!("Generating {} levels for the {} mesh", levels, shape);
    let report = generator
        .generate(&mut mesh, &lod_values)
        .context("LOD generation failed")?;

    let submesh = &mesh.submeshes[0];
    println!("{} mesh: {} vertices", shape, positions.len());
    for level in 0..mesh.num_lod_levels() {
        let Some(lod) = submesh.lod_index_buffer(level) else {
            continue;
        };
        let usage = match level {
            0 => "full detail".to_string(),
            _ => format!("from {}", mesh.lod_usages[level - 1].user_value),
        };
        println!("  level {}: {:>6} triangles ({})", level, lod.triangle_count(), usage);
    }

    if let Some(level) = report.submeshes[0].abandoned_at_level {
        println!("  reduction ran out of valid collapses at level {}", level + 1);
    }
    println!("  {} collapses in total", report.submeshes[0].collapses);

    Ok(())
}
