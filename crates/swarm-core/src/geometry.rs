//! N-dimensional hypercube layout and its projection into cursor space.

use anyhow::ensure;

/// All `2^n` sign vectors of `{-1,+1}^n`, axis 0 slowest-varying.
pub fn generate_vertices(dimensions: usize) -> Vec<Vec<f64>> {
    fn recurse(axis: usize, coords: &mut Vec<f64>, out: &mut Vec<Vec<f64>>) {
        if axis == coords.len() {
            out.push(coords.clone());
            return;
        }
        coords[axis] = -1.0;
        recurse(axis + 1, coords, out);
        coords[axis] = 1.0;
        recurse(axis + 1, coords, out);
    }

    let mut vertices = Vec::with_capacity(1usize << dimensions);
    let mut coords = vec![-1.0; dimensions];
    recurse(0, &mut coords, &mut vertices);
    vertices
}

/// Unordered index pairs of vertices differing in exactly one axis (by 2).
/// Quadratic scan; fine for the dimension counts a swarm uses (<= 64 vertices
/// at n = 6).
pub fn generate_edges(vertices: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let mut edges = Vec::new();
    for i in 0..vertices.len() {
        for j in (i + 1)..vertices.len() {
            let diff: f64 = vertices[i]
                .iter()
                .zip(&vertices[j])
                .map(|(a, b)| (a - b).abs())
                .sum();
            if diff == 2.0 {
                edges.push((i, j));
            }
        }
    }
    edges
}

/// Per-axis-pair rotation angles in degrees. Only the upper triangle
/// (`i < j`) is meaningful; it starts at zero and advances every tick.
#[derive(Debug, Clone)]
pub struct AngleMatrix {
    angles: Vec<Vec<f64>>,
}

impl AngleMatrix {
    pub fn zeroed(dimensions: usize) -> Self {
        Self {
            angles: vec![vec![0.0; dimensions]; dimensions],
        }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.angles[i][j]
    }

    /// Adds `step_degrees` to every plane's angle.
    pub fn advance(&mut self, step_degrees: f64) {
        let n = self.angles.len();
        for i in 0..n {
            for j in (i + 1)..n {
                self.angles[i][j] += step_degrees;
            }
        }
    }
}

/// Rotates `point` in every axis-pair plane by the matrix angle, in
/// increasing `(i, j)` order (plane rotations do not commute; the order is
/// part of the contract), then maps the first two coordinates to screen
/// space. The x axis is scaled by half on purpose: the party viewport is
/// wider than tall and the original layout bakes that in.
pub fn rotate_and_project(
    point: &[f64],
    angles: &AngleMatrix,
    scale: f64,
    center: (f64, f64),
) -> (f64, f64) {
    let mut rotated = point.to_vec();
    let n = rotated.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let radians = angles.get(i, j).to_radians();
            let (sin, cos) = radians.sin_cos();
            let (pi, pj) = (rotated[i], rotated[j]);
            rotated[i] = pi * cos - pj * sin;
            rotated[j] = pi * sin + pj * cos;
        }
    }
    let px = rotated.first().copied().unwrap_or(0.0);
    let py = rotated.get(1).copied().unwrap_or(0.0);
    (px * scale / 2.0 + center.0, py * scale + center.1)
}

/// Immutable vertex/edge structure assigning swarm slots to points on the
/// cube: one slot per vertex, then `resolution - 2` interpolated slots per
/// edge.
#[derive(Debug, Clone)]
pub struct HypercubeLayout {
    pub vertices: Vec<Vec<f64>>,
    pub edges: Vec<(usize, usize)>,
}

impl HypercubeLayout {
    /// Fails fast on degenerate dimensions; this is a startup precondition
    /// checked before any connection opens.
    pub fn new(dimensions: usize) -> anyhow::Result<Self> {
        ensure!(dimensions >= 1, "hypercube needs at least one dimension");
        ensure!(
            dimensions <= 10,
            "hypercube with {dimensions} dimensions is too large to animate"
        );
        let vertices = generate_vertices(dimensions);
        let edges = generate_edges(&vertices);
        Ok(Self { vertices, edges })
    }

    pub fn edge_points(resolution: usize) -> usize {
        resolution.saturating_sub(2)
    }

    pub fn slot_count(&self, resolution: usize) -> usize {
        self.vertices.len() + self.edges.len() * Self::edge_points(resolution)
    }

    /// The fixed N-dimensional point for a swarm slot. Slots below the vertex
    /// count pin to a vertex; the rest interpolate along an edge at
    /// `t = (offset + 1) / (edge_points + 1)`.
    pub fn slot_position(&self, slot: usize, resolution: usize) -> Option<Vec<f64>> {
        if slot < self.vertices.len() {
            return Some(self.vertices[slot].clone());
        }
        let edge_points = Self::edge_points(resolution);
        if edge_points == 0 {
            return None;
        }
        let index = slot - self.vertices.len();
        let (a, b) = *self.edges.get(index / edge_points)?;
        let offset = index % edge_points;
        let t = (offset + 1) as f64 / (edge_points + 1) as f64;
        Some(
            self.vertices[a]
                .iter()
                .zip(&self.vertices[b])
                .map(|(v0, v1)| v0 * (1.0 - t) + v1 * t)
                .collect(),
        )
    }
}
