//! Native grid navigation.
//!
//! Pixel coordinates here are storage coordinates of [`NativeImage`]:
//! `col` grows east, `row` grows north from the southernmost line, and
//! integer values sit on pixel centers.

use crate::error::{WsiError, WsiResult};
use crate::projection::LambertConformal;
use crate::types::{CylindricalNav, LambertNav, NativeImage, Navigation};

/// A navigation ready for coordinate transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavigationModel {
    Cylindrical(CylindricalNav),
    Lambert {
        nav: LambertNav,
        projection: LambertConformal,
    },
}

impl NavigationModel {
    /// Builds the transforms for a parsed navigation.
    ///
    /// # Errors
    ///
    /// Returns `WsiError::NavigationUnavailable` if the Lambert parameters
    /// do not define a valid cone.
    pub fn new(navigation: &Navigation) -> WsiResult<Self> {
        match *navigation {
            Navigation::CylindricalEquidistant(nav) => Ok(Self::Cylindrical(nav)),
            Navigation::LambertConformal(nav) => {
                let projection = lambert_projection(&nav).ok_or(WsiError::NavigationUnavailable)?;
                Ok(Self::Lambert { nav, projection })
            }
        }
    }

    /// Longitude and latitude of a native pixel.
    pub fn pixel_to_lonlat(&self, col: f64, row: f64, image_lines: usize) -> (f64, f64) {
        match self {
            Self::Cylindrical(nav) => (
                nav.west_lon() + (col + 0.5) * nav.deg_per_element,
                nav.south_lat(image_lines) + (row + 0.5) * nav.deg_per_line,
            ),
            Self::Lambert { nav, projection } => {
                let x = nav.upper_left_x + col * nav.pixel_res_x;
                let y = lambert_bottom_y(nav, image_lines) + row * nav.pixel_res_y;
                let (lat, lon) = projection.xy_to_latlon(x, y);
                (lon, lat)
            }
        }
    }

    /// Fractional native pixel position of a longitude and latitude.
    pub fn lonlat_to_pixel(&self, lon: f64, lat: f64, image_lines: usize) -> (f64, f64) {
        match self {
            Self::Cylindrical(nav) => (
                (lon - nav.west_lon()) / nav.deg_per_element - 0.5,
                (lat - nav.south_lat(image_lines)) / nav.deg_per_line - 0.5,
            ),
            Self::Lambert { nav, projection } => {
                let (x, y) = projection.latlon_to_xy(lat, lon);
                (
                    (x - nav.upper_left_x) / nav.pixel_res_x,
                    (y - lambert_bottom_y(nav, image_lines)) / nav.pixel_res_y,
                )
            }
        }
    }

    /// Buffer index of the native pixel nearest to a longitude and latitude,
    /// `None` if it falls outside the image.
    pub fn nearest_index(&self, lon: f64, lat: f64, image: &NativeImage) -> Option<usize> {
        let (col, row) = self.lonlat_to_pixel(lon, lat, image.lines());
        let col = (col + 0.5).floor();
        let row = (row + 0.5).floor();
        if !(col >= 0.0 && row >= 0.0) {
            return None;
        }
        image.index(col as usize, row as usize)
    }
}

/// The Lambert projection described by a navigation segment.
pub fn lambert_projection(nav: &LambertNav) -> Option<LambertConformal> {
    LambertConformal::new(
        nav.proj_center_lat,
        nav.proj_center_lon,
        nav.parallel_1,
        nav.parallel_2,
    )
}

/// Projected y of the bottom row's pixel centers.
fn lambert_bottom_y(nav: &LambertNav, image_lines: usize) -> f64 {
    nav.upper_left_y - image_lines.saturating_sub(1) as f64 * nav.pixel_res_y
}
