//! Mapping of the native image onto the output grid.
//!
//! | resample | native nav | output projection | algorithm                    |
//! |----------|------------|-------------------|------------------------------|
//! | false    | C          | (ignored)         | pass-through of native grid  |
//! | true     | C          | flat              | nearest neighbor             |
//! | true     | C          | lat/lon           | statistical (max/mean)       |
//! | true     | L          | either            | nearest neighbor             |
//!
//! Lookup tables depend only on the output geometry, the native image size
//! and the navigation. They are built on first use and kept until one of
//! those changes.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{WsiError, WsiResult};
use crate::navigation::NavigationModel;
use crate::projection::FlatEarth;
use crate::types::{
    CylindricalNav, FilterType, GridGeometry, NativeImage, Navigation, OutputGridSpec,
    OutputProjection,
};

/// Resampled data together with the geometry it was produced on.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledGrid {
    pub data: Vec<u8>,
    /// Effective geometry; for pass-through this is the native grid.
    pub geometry: GridGeometry,
}

/// What the cached tables were built for.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheKey {
    output: GridGeometry,
    lines: usize,
    pixels: usize,
    navigation: Navigation,
}

#[derive(Debug)]
enum Tables {
    /// Native buffer index for each output cell.
    Nearest(Vec<Option<usize>>),
    /// Output column for each native column, and linear Z for each byte.
    Statistical {
        nav: CylindricalNav,
        x_index: Vec<Option<usize>>,
        z_table: [f64; 256],
    },
}

/// Resampler for one fixed output configuration.
///
/// Cloning is cheap and clones share already built tables.
#[derive(Debug, Clone)]
pub struct GridResampler {
    spec: OutputGridSpec,
    cache: Option<(CacheKey, Arc<Tables>)>,
}

impl GridResampler {
    pub fn new(spec: OutputGridSpec) -> Self {
        Self { spec, cache: None }
    }

    pub fn spec(&self) -> &OutputGridSpec {
        &self.spec
    }

    /// Produces the output grid for a decoded image.
    ///
    /// # Errors
    ///
    /// Returns `WsiError::NavigationUnavailable` without a usable
    /// navigation and `WsiError::UnsupportedCombination` for pass-through
    /// of Lambert conformal data.
    pub fn resample(
        &mut self,
        image: &NativeImage,
        navigation: Option<&Navigation>,
    ) -> WsiResult<ResampledGrid> {
        let navigation = *navigation.ok_or(WsiError::NavigationUnavailable)?;
        let model = NavigationModel::new(&navigation)?;

        if !self.spec.resample {
            return match model {
                NavigationModel::Cylindrical(nav) => Ok(pass_through(image, &nav)),
                NavigationModel::Lambert { .. } => Err(WsiError::UnsupportedCombination(
                    "pass-through requires cylindrical equidistant navigation, got lambert conformal"
                        .to_string(),
                )),
            };
        }

        let key = CacheKey {
            output: self.spec.geometry,
            lines: image.lines(),
            pixels: image.pixels(),
            navigation,
        };
        let tables = self.tables(key, image, &model);

        let data = match tables.as_ref() {
            Tables::Statistical {
                nav,
                x_index,
                z_table,
            } => self.statistical(image, nav, x_index, z_table),
            Tables::Nearest(index_grid) => nearest(image, index_grid),
        };

        Ok(ResampledGrid {
            data,
            geometry: self.spec.geometry,
        })
    }

    /// Returns tables for `key`, rebuilding them if the key changed.
    fn tables(&mut self, key: CacheKey, image: &NativeImage, model: &NavigationModel) -> Arc<Tables> {
        if let Some((cached_key, tables)) = &self.cache {
            if *cached_key == key {
                return Arc::clone(tables);
            }
            info!("Native grid or navigation changed, rebuilding resample tables");
        }

        debug!(
            "Building resample tables for {} x {} output grid",
            self.spec.geometry.nx, self.spec.geometry.ny
        );
        let tables = Arc::new(match (model, self.spec.projection) {
            (NavigationModel::Cylindrical(nav), OutputProjection::LatLon) => Tables::Statistical {
                nav: *nav,
                x_index: x_index_table(nav, image.pixels(), &self.spec.geometry),
                z_table: z_table(self.spec.data_scale, self.spec.data_bias),
            },
            _ => Tables::Nearest(index_grid(&self.spec, model, image)),
        });
        self.cache = Some((key, Arc::clone(&tables)));
        tables
    }

    /// Accumulates native pixels into output cells and reduces them with
    /// the configured filter.
    fn statistical(
        &self,
        image: &NativeImage,
        nav: &CylindricalNav,
        x_index: &[Option<usize>],
        z_table: &[f64; 256],
    ) -> Vec<u8> {
        let geometry = &self.spec.geometry;
        let filter = self.spec.filter;
        let mut cells = vec![CellStats::default(); geometry.npoints()];

        let south = nav.south_lat(image.lines());
        for row in 0..image.lines() {
            let lat = south + (row as f64 + 0.5) * nav.deg_per_line;
            let Some(iy) = grid_index((lat - geometry.min_y) / geometry.delta_y, geometry.ny)
            else {
                continue;
            };
            let Some(line) = image.row(row) else {
                continue;
            };

            let start = iy * geometry.nx;
            for (&value, ix) in line.iter().zip(x_index) {
                if let Some(ix) = ix {
                    cells[start + ix].add(value, filter, z_table);
                }
            }
        }

        cells
            .iter()
            .map(|cell| {
                cell.value(
                    filter,
                    self.spec.coverage_threshold,
                    self.spec.data_scale,
                    self.spec.data_bias,
                )
            })
            .collect()
    }
}

/// The native grid copied verbatim, with its geometry.
fn pass_through(image: &NativeImage, nav: &CylindricalNav) -> ResampledGrid {
    let model = NavigationModel::Cylindrical(*nav);
    let (min_x, min_y) = model.pixel_to_lonlat(0.0, 0.0, image.lines());

    ResampledGrid {
        data: image.data().to_vec(),
        geometry: GridGeometry {
            nx: image.pixels(),
            ny: image.lines(),
            min_x,
            min_y,
            delta_x: nav.deg_per_element,
            delta_y: nav.deg_per_line,
        },
    }
}

fn nearest(image: &NativeImage, index_grid: &[Option<usize>]) -> Vec<u8> {
    let data = image.data();
    index_grid
        .iter()
        .map(|index| index.and_then(|i| data.get(i).copied()).unwrap_or(0))
        .collect()
}

/// Native buffer index of the pixel under each output cell center.
fn index_grid(spec: &OutputGridSpec, model: &NavigationModel, image: &NativeImage) -> Vec<Option<usize>> {
    let geometry = &spec.geometry;
    let flat = match spec.projection {
        OutputProjection::Flat {
            origin_lat,
            origin_lon,
        } => Some(FlatEarth::new(origin_lat, origin_lon)),
        OutputProjection::LatLon => None,
    };

    let mut index_grid = Vec::with_capacity(geometry.npoints());
    for iy in 0..geometry.ny {
        for ix in 0..geometry.nx {
            let (x, y) = geometry.cell_center(ix, iy);
            let (lat, lon) = match &flat {
                Some(flat) => flat.xy_to_latlon(x, y),
                None => (y, x),
            };
            index_grid.push(model.nearest_index(lon, lat, image));
        }
    }
    index_grid
}

/// Output column for each native column, from pixel center longitudes.
fn x_index_table(nav: &CylindricalNav, pixels: usize, geometry: &GridGeometry) -> Vec<Option<usize>> {
    (0..pixels)
        .map(|ilon| {
            let lon = nav.west_lon() + (ilon as f64 + 0.5) * nav.deg_per_element;
            grid_index((lon - geometry.min_x) / geometry.delta_x, geometry.nx)
        })
        .collect()
}

/// Linear reflectivity for each dBZ-coded byte.
pub fn z_table(scale: f64, bias: f64) -> [f64; 256] {
    let mut table = [0.0; 256];
    for (byte, z) in table.iter_mut().enumerate() {
        *z = 10f64.powf((byte as f64 * scale + bias) / 10.0);
    }
    table
}

/// Nearest cell for a fractional grid position, `None` if outside `0..n`.
fn grid_index(position: f64, n: usize) -> Option<usize> {
    let index = (position + 0.5).floor();
    (index >= 0.0 && index < n as f64).then(|| index as usize)
}

fn clamp_byte(value: f64) -> u8 {
    (value + 0.5).floor().clamp(0.0, 255.0) as u8
}

/// Byte value of a mean linear reflectivity.
pub fn z_to_byte(mean_z: f64, scale: f64, bias: f64) -> u8 {
    clamp_byte((10.0 * mean_z.log10() - bias) / scale)
}

/// Accumulated statistics for one output cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CellStats {
    /// Non-zero native pixels mapped to the cell.
    pub hits: u32,
    /// All native pixels mapped to the cell.
    pub possible: u32,
    pub max: u8,
    /// Sum of bytes (mean dBZ) or of linear Z (mean Z).
    pub sum: f64,
}

impl CellStats {
    pub fn add(&mut self, value: u8, filter: FilterType, z_table: &[f64; 256]) {
        if value > 0 {
            match filter {
                FilterType::Max => self.max = self.max.max(value),
                FilterType::MeanDbz => self.sum += value as f64,
                FilterType::MeanZ => self.sum += z_table[value as usize],
            }
            self.hits += 1;
        }
        self.possible += 1;
    }

    /// Reduced output byte; 0 for empty cells or coverage below `threshold`.
    pub fn value(&self, filter: FilterType, threshold: f64, scale: f64, bias: f64) -> u8 {
        if self.possible == 0 || self.hits == 0 {
            return 0;
        }
        let coverage = self.hits as f64 / self.possible as f64;
        if coverage < threshold {
            return 0;
        }

        let hits = self.hits as f64;
        match filter {
            FilterType::Max => self.max,
            FilterType::MeanDbz => clamp_byte(self.sum / hits),
            FilterType::MeanZ => z_to_byte(self.sum / hits, scale, bias),
        }
    }
}
