//! WSI data types and structures.
//!
//! This module defines the header populated while parsing a file, the two
//! navigation variants, the native image buffer, and the description of the
//! output grid requested by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the fixed ASCII label segment.
pub const IMAGE_LABEL_LEN: usize = 80;

/// Header information accumulated while parsing one file.
#[derive(Debug, Clone, Default)]
pub struct WsiHeader {
    /// Data time derived from the label and header text.
    pub data_time: Option<DateTime<Utc>>,
    /// Raw navigation code byte (`'C'` or `'L'` when valid).
    pub nav_code: Option<char>,
    /// Parsed navigation, `None` if missing or the nav code was unknown.
    pub navigation: Option<Navigation>,
    /// Number of lines in the native image.
    pub image_lines: u32,
    /// Number of pixels per line in the native image.
    pub image_pixels: u32,
    /// The 80 character product label.
    pub image_label: String,
    /// The broadcast image header text.
    pub image_header: String,
    /// Optional mark byte (0x80..=0x82), 0 if absent.
    pub mark: u8,
    /// Start of image / resolution byte following the header text.
    pub resolution_byte: u8,
}

impl WsiHeader {
    /// Returns true once a positive image size has been read.
    pub fn has_valid_size(&self) -> bool {
        self.image_lines > 0 && self.image_pixels > 0
    }
}

/// Navigation of the native image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Navigation {
    /// Nav code `'C'`.
    CylindricalEquidistant(CylindricalNav),
    /// Nav code `'L'`.
    LambertConformal(LambertNav),
}

impl Navigation {
    /// The nav code letter for this variant.
    pub fn code(&self) -> char {
        match self {
            Navigation::CylindricalEquidistant(_) => 'C',
            Navigation::LambertConformal(_) => 'L',
        }
    }
}

/// Cylindrical equidistant navigation, all values in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CylindricalNav {
    pub center_lon: f64,
    /// Northern most parallel of the image.
    pub top_lat: f64,
    /// Longitude from the image center to the edge meridians, never negative.
    pub diff_lon: f64,
    pub deg_per_line: f64,
    pub deg_per_element: f64,
}

impl CylindricalNav {
    /// Longitude of the western edge of the image.
    pub fn west_lon(&self) -> f64 {
        self.center_lon - self.diff_lon
    }

    /// Latitude of the southern edge of an image with `image_lines` lines.
    pub fn south_lat(&self, image_lines: usize) -> f64 {
        self.top_lat - image_lines as f64 * self.deg_per_line
    }
}

/// Lambert conformal navigation. Angles in degrees, distances in km.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LambertNav {
    pub parallel_1: f64,
    pub parallel_2: f64,
    /// Latitude of the projection center (not the image center).
    pub proj_center_lat: f64,
    /// Longitude of the projection center (not the image center).
    pub proj_center_lon: f64,
    pub upper_left_x: f64,
    pub upper_left_y: f64,
    pub pixel_res_x: f64,
    pub pixel_res_y: f64,
}

/// The decoded image in its native projection.
///
/// Rows are stored south-up: row 0 holds the last transmitted line.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeImage {
    lines: usize,
    pixels: usize,
    data: Vec<u8>,
}

impl NativeImage {
    /// Creates a zero-filled image.
    pub fn new(lines: usize, pixels: usize) -> Self {
        Self {
            lines,
            pixels,
            data: vec![0; lines * pixels],
        }
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn pixels(&self) -> usize {
        self.pixels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Storage row for a transmitted line number.
    ///
    /// Lines arrive north first, storage is south-up, so line `L` lands on
    /// row `lines - 1 - L`. Returns `None` for lines outside the image.
    pub fn row_for_line(&self, line: usize) -> Option<usize> {
        (line < self.lines).then(|| self.lines - 1 - line)
    }

    /// Buffer index of `(col, row)`, `None` if out of range.
    pub fn index(&self, col: usize, row: usize) -> Option<usize> {
        (col < self.pixels && row < self.lines).then(|| row * self.pixels + col)
    }

    /// Value at `(col, row)`, `None` if out of range.
    pub fn get(&self, col: usize, row: usize) -> Option<u8> {
        self.index(col, row).map(|i| self.data[i])
    }

    /// One storage row.
    pub fn row(&self, row: usize) -> Option<&[u8]> {
        (row < self.lines).then(|| &self.data[row * self.pixels..(row + 1) * self.pixels])
    }

    /// Writes `value` into `len` pixels of transmitted `line` starting at
    /// `start_col`. Pixels outside the image are dropped.
    pub fn fill_run(&mut self, line: usize, start_col: usize, len: usize, value: u8) {
        let Some(row) = self.row_for_line(line) else {
            return;
        };
        if start_col >= self.pixels {
            return;
        }
        let end_col = start_col.saturating_add(len).min(self.pixels);
        let base = row * self.pixels;
        self.data[base + start_col..base + end_col].fill(value);
    }
}

/// Projection of the output grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputProjection {
    /// Grid axes are longitude (x) and latitude (y) in degrees.
    LatLon,
    /// Azimuthal equidistant "flat earth" grid in km around an origin.
    Flat { origin_lat: f64, origin_lon: f64 },
}

/// Aggregation used by the statistical resampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Maximum native value.
    Max,
    /// Mean of the dBZ-coded byte values.
    MeanDbz,
    /// Mean in linear reflectivity (Z), converted back to dBZ.
    MeanZ,
}

/// Origin, spacing and size of a regular grid. Cell `(ix, iy)` is centered
/// at `(min_x + ix * delta_x, min_y + iy * delta_y)`; row 0 is the south.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub nx: usize,
    pub ny: usize,
    pub min_x: f64,
    pub min_y: f64,
    pub delta_x: f64,
    pub delta_y: f64,
}

impl GridGeometry {
    pub fn npoints(&self) -> usize {
        self.nx * self.ny
    }

    /// Center of cell `(ix, iy)` in grid units.
    pub fn cell_center(&self, ix: usize, iy: usize) -> (f64, f64) {
        (
            self.min_x + ix as f64 * self.delta_x,
            self.min_y + iy as f64 * self.delta_y,
        )
    }
}

/// The caller's description of the output grid. Immutable for the life of a
/// [`crate::WsiFile`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputGridSpec {
    /// When false the native cylindrical grid is passed through unchanged.
    pub resample: bool,
    pub projection: OutputProjection,
    /// Requested geometry; ignored when `resample` is false.
    pub geometry: GridGeometry,
    pub filter: FilterType,
    /// Minimum fraction of non-zero native samples for a statistical cell.
    pub coverage_threshold: f64,
    pub data_scale: f64,
    pub data_bias: f64,
}

/// The output of decoding one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedGrid {
    /// Row-major bytes, row 0 is the southernmost row.
    #[serde(skip)]
    pub data: Vec<u8>,
    pub nx: usize,
    pub ny: usize,
    pub min_x: f64,
    pub min_y: f64,
    pub delta_x: f64,
    pub delta_y: f64,
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub data_time: DateTime<Utc>,
}

impl DecodedGrid {
    /// The effective geometry the data was produced on.
    pub fn geometry(&self) -> GridGeometry {
        GridGeometry {
            nx: self.nx,
            ny: self.ny,
            min_x: self.min_x,
            min_y: self.min_y,
            delta_x: self.delta_x,
            delta_y: self.delta_y,
        }
    }
}
