//! Destinations for decoded grids.
//!
//! A [`GridSink`] receives each [`DecodedGrid`] in archive order. The
//! [`RawGridSink`] writes the grid bytes and a JSON description side by
//! side, named after the data time.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::WsiResult;
use crate::types::DecodedGrid;

/// A consumer of decoded grids.
///
/// # Example
///
/// ```ignore
/// use wsim::{DecodedGrid, GridSink, WsiResult};
///
/// struct CountingSink(usize);
///
/// impl GridSink for CountingSink {
///     type Output = usize;
///
///     fn write(&mut self, grid: &DecodedGrid) -> WsiResult<Self::Output> {
///         self.0 += 1;
///         Ok(self.0)
///     }
/// }
/// ```
pub trait GridSink {
    /// What a successful write returns.
    type Output;

    fn write(&mut self, grid: &DecodedGrid) -> WsiResult<Self::Output>;
}

/// Writes `<YYYYMMDD_HHMMSS>.grid` (row-major bytes, southern row first)
/// and `<YYYYMMDD_HHMMSS>.json` into a directory.
#[derive(Debug, Clone)]
pub struct RawGridSink {
    output_dir: PathBuf,
}

impl RawGridSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl GridSink for RawGridSink {
    /// Path of the written grid file.
    type Output = PathBuf;

    fn write(&mut self, grid: &DecodedGrid) -> WsiResult<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let stem = grid.data_time.format("%Y%m%d_%H%M%S").to_string();
        let grid_path = self.output_dir.join(format!("{}.grid", stem));
        let meta_path = self.output_dir.join(format!("{}.json", stem));

        fs::write(&grid_path, &grid.data)?;
        fs::write(&meta_path, serde_json::to_string_pretty(grid)?)?;

        info!("Wrote {}", grid_path.display());
        Ok(grid_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn grid() -> DecodedGrid {
        DecodedGrid {
            data: vec![0, 1, 2, 3, 4, 5],
            nx: 3,
            ny: 2,
            min_x: -100.0,
            min_y: 40.0,
            delta_x: 0.5,
            delta_y: 0.25,
            origin_lat: 40.0,
            origin_lon: -100.0,
            data_time: Utc.with_ymd_and_hms(2004, 1, 15, 18, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_raw_sink_writes_grid_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RawGridSink::new(dir.path().join("out"));
        assert_eq!(sink.output_dir(), dir.path().join("out"));

        let path = sink.write(&grid()).unwrap();
        assert_eq!(path, dir.path().join("out").join("20040115_183000.grid"));
        assert_eq!(fs::read(&path).unwrap(), vec![0, 1, 2, 3, 4, 5]);

        let meta: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("out").join("20040115_183000.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(meta["nx"], 3);
        assert_eq!(meta["ny"], 2);
        assert_eq!(meta["delta_y"], 0.25);
        assert_eq!(meta["data_time"], "2004-01-15T18:30:00Z");
        assert!(meta.get("data").is_none());
    }

    #[test]
    fn test_custom_sink() {
        struct Collect(Vec<usize>);

        impl GridSink for Collect {
            type Output = ();

            fn write(&mut self, grid: &DecodedGrid) -> WsiResult<()> {
                self.0.push(grid.data.len());
                Ok(())
            }
        }

        let mut sink = Collect(Vec::new());
        sink.write(&grid()).unwrap();
        assert_eq!(sink.0, vec![6]);
    }
}
