//! Decoder parameters loaded from a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::color::ColorTable;
use crate::error::{WsiError, WsiResult};
use crate::types::{FilterType, GridGeometry, OutputGridSpec, OutputProjection};

/// Parameters shared by every file of one decoding run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Physical values of colors 1..=15.
    pub value_table: Vec<f64>,
    pub data_scale: f64,
    pub data_bias: f64,
    /// Resample onto `grid`; otherwise pass the native grid through.
    #[serde(default = "default_resample")]
    pub resample: bool,
    #[serde(default = "default_projection")]
    pub projection: OutputProjection,
    pub grid: GridGeometry,
    #[serde(default = "default_filter")]
    pub filter: FilterType,
    #[serde(default)]
    pub coverage_threshold: f64,
}

fn default_resample() -> bool {
    true
}

fn default_projection() -> OutputProjection {
    OutputProjection::LatLon
}

fn default_filter() -> FilterType {
    FilterType::Max
}

impl Params {
    /// Loads and validates a JSON parameter file.
    pub fn from_file(path: impl AsRef<Path>) -> WsiResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses and validates JSON parameter text.
    pub fn from_json(text: &str) -> WsiResult<Self> {
        let params: Params = serde_json::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// Checks the values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns `WsiError::Config` for an empty grid, zero grid spacing or
    /// data scale, or a coverage threshold outside `[0, 1]`.
    pub fn validate(&self) -> WsiResult<()> {
        let grid = &self.grid;
        if grid.nx == 0 || grid.ny == 0 {
            return Err(WsiError::Config(format!(
                "grid must have at least one cell, got {} x {}",
                grid.nx, grid.ny
            )));
        }
        if grid.delta_x == 0.0 || grid.delta_y == 0.0 {
            return Err(WsiError::Config("grid spacing must be non-zero".to_string()));
        }
        if self.data_scale == 0.0 {
            return Err(WsiError::Config("data_scale must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.coverage_threshold) {
            return Err(WsiError::Config(format!(
                "coverage_threshold must be within [0, 1], got {}",
                self.coverage_threshold
            )));
        }
        Ok(())
    }

    /// The calibration table for these parameters.
    pub fn color_table(&self) -> WsiResult<ColorTable> {
        ColorTable::new(&self.value_table, self.data_scale, self.data_bias)
    }

    pub fn output_spec(&self) -> OutputGridSpec {
        OutputGridSpec {
            resample: self.resample,
            projection: self.projection,
            geometry: self.grid,
            filter: self.filter,
            coverage_threshold: self.coverage_threshold,
            data_scale: self.data_scale,
            data_bias: self.data_bias,
        }
    }
}
