//! Flood grid assembly and depth post-processing.
//!
//! A square grid of `r x r` cells is flattened row-major (`i * r + j`) and
//! discretized with the five-point Laplacian: 4 on the diagonal, -1 for each
//! in-grid neighbour.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{LinalgError, LinalgResult};
use crate::sparse::CsrMatrix;

pub const DEFAULT_GRID_RESOLUTION: usize = 50;
pub const DEFAULT_SOURCE_VALUE: f64 = 0.1;
pub const DEFAULT_CONVERSION_FACTOR: f64 = 0.1;
pub const DEFAULT_FLOOD_THRESHOLD: f64 = 0.05;

/// Inputs for building a flood system and interpreting its solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodParameters {
    /// Cells per side.
    #[serde(default = "default_grid_resolution")]
    pub grid_resolution: usize,

    /// Uniform source term placed in every entry of `b`.
    #[serde(default = "default_source_value")]
    pub source_value: f64,

    /// Scales a solution value into a water depth in metres.
    #[serde(default = "default_conversion_factor")]
    pub conversion_factor: f64,

    /// Depth above which a cell counts as flooded.
    #[serde(default = "default_flood_threshold")]
    pub flood_threshold: f64,
}

fn default_grid_resolution() -> usize {
    DEFAULT_GRID_RESOLUTION
}

fn default_source_value() -> f64 {
    DEFAULT_SOURCE_VALUE
}

fn default_conversion_factor() -> f64 {
    DEFAULT_CONVERSION_FACTOR
}

fn default_flood_threshold() -> f64 {
    DEFAULT_FLOOD_THRESHOLD
}

impl Default for FloodParameters {
    fn default() -> Self {
        Self {
            grid_resolution: DEFAULT_GRID_RESOLUTION,
            source_value: DEFAULT_SOURCE_VALUE,
            conversion_factor: DEFAULT_CONVERSION_FACTOR,
            flood_threshold: DEFAULT_FLOOD_THRESHOLD,
        }
    }
}

impl FloodParameters {
    pub fn validate(&self) -> LinalgResult<()> {
        if self.grid_resolution == 0 {
            return Err(LinalgError::InvalidGrid(
                "grid resolution must be at least 1".into(),
            ));
        }
        if !self.source_value.is_finite() {
            return Err(LinalgError::InvalidGrid("source value must be finite".into()));
        }
        if !(self.conversion_factor.is_finite() && self.flood_threshold.is_finite()) {
            return Err(LinalgError::InvalidGrid(
                "conversion factor and flood threshold must be finite".into(),
            ));
        }
        Ok(())
    }

    /// Depth statistics for a solution of this grid's system.
    pub fn depth_summary(&self, solution: &[f64]) -> FloodSummary {
        FloodSummary::from_solution(solution, self)
    }
}

/// Five-point Laplacian on an `r x r` grid with Dirichlet boundary.
pub fn laplacian_2d(grid_resolution: usize) -> LinalgResult<CsrMatrix> {
    if grid_resolution == 0 {
        return Err(LinalgError::InvalidGrid(
            "grid resolution must be at least 1".into(),
        ));
    }
    let r = grid_resolution;
    let n = r
        .checked_mul(r)
        .ok_or_else(|| LinalgError::InvalidGrid(format!("grid resolution {r} overflows")))?;

    let mut triplets = Vec::with_capacity(5 * n);
    for i in 0..r {
        for j in 0..r {
            let idx = i * r + j;
            triplets.push((idx, idx, 4.0));
            if i > 0 {
                triplets.push((idx, idx - r, -1.0));
            }
            if i + 1 < r {
                triplets.push((idx, idx + r, -1.0));
            }
            if j > 0 {
                triplets.push((idx, idx - 1, -1.0));
            }
            if j + 1 < r {
                triplets.push((idx, idx + 1, -1.0));
            }
        }
    }
    CsrMatrix::from_triplets(n, n, triplets)
}

/// Right-hand side with every entry equal to `value`.
pub fn uniform_source(n: usize, value: f64) -> Array1<f64> {
    Array1::from_elem(n, value)
}

/// Per-cell water depth: `max(0, x_i * conversion_factor)`.
pub fn depth_map(solution: &[f64], params: &FloodParameters) -> Vec<f64> {
    solution
        .iter()
        .map(|x| (x * params.conversion_factor).max(0.0))
        .collect()
}

/// Aggregate view of a depth map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodSummary {
    pub max_depth: f64,
    pub mean_depth: f64,
    pub flooded_cells: usize,
    pub total_cells: usize,
}

impl FloodSummary {
    pub fn from_solution(solution: &[f64], params: &FloodParameters) -> Self {
        let depths = depth_map(solution, params);
        let total_cells = depths.len();
        let max_depth = depths.iter().copied().fold(0.0, f64::max);
        let mean_depth = if total_cells == 0 {
            0.0
        } else {
            depths.iter().sum::<f64>() / total_cells as f64
        };
        let flooded_cells = depths
            .iter()
            .filter(|&&d| d > params.flood_threshold)
            .count();
        Self {
            max_depth,
            mean_depth,
            flooded_cells,
            total_cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laplacian_structure() {
        let m = laplacian_2d(3).unwrap();
        assert_eq!(m.shape(), (9, 9));
        // corners have 2 neighbours, edges 3, centre 4
        assert_eq!(m.row(0).count(), 3);
        assert_eq!(m.row(1).count(), 4);
        assert_eq!(m.row(4).count(), 5);
        assert_eq!(m.get(4, 4), 4.0);
        assert_eq!(m.get(4, 1), -1.0);
        assert_eq!(m.get(2, 3), 0.0);
        assert!(m.is_symmetric(0.0));
    }

    #[test]
    fn zero_resolution_rejected() {
        assert!(matches!(laplacian_2d(0), Err(LinalgError::InvalidGrid(_))));
    }

    #[test]
    fn single_cell_grid() {
        let m = laplacian_2d(1).unwrap();
        assert_eq!(m.to_dense()[[0, 0]], 4.0);
    }

    #[test]
    fn summary_clips_negative_depths() {
        let params = FloodParameters::default();
        let summary = FloodSummary::from_solution(&[1.0, -2.0, 0.2], &params);
        assert!((summary.max_depth - 0.1).abs() < 1e-15);
        assert_eq!(summary.flooded_cells, 1);
        assert_eq!(summary.total_cells, 3);
        assert!((summary.mean_depth - 0.12 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn validate_rejects_empty_grid() {
        let params = FloodParameters {
            grid_resolution: 0,
            ..FloodParameters::default()
        };
        assert!(params.validate().is_err());
        assert!(FloodParameters::default().validate().is_ok());
    }

    #[test]
    fn parameters_fill_defaults_from_partial_json() {
        let params: FloodParameters = serde_json::from_str(r#"{"grid_resolution": 8}"#).unwrap();
        assert_eq!(params.grid_resolution, 8);
        assert_eq!(params.flood_threshold, DEFAULT_FLOOD_THRESHOLD);
    }
}
