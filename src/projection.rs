//! Spherical map projections used by the navigation models and output grids.
//!
//! All projections work in degrees for geographic coordinates and in
//! kilometers for projected coordinates.

use std::f64::consts::PI;

/// Earth radius in km.
pub const EARTH_RADIUS_KM: f64 = 6378.137;

const DEG_TO_RAD: f64 = PI / 180.0;
const RAD_TO_DEG: f64 = 180.0 / PI;

/// Wraps a longitude difference in radians into `[-PI, PI]`.
fn wrap_radians(mut angle: f64) -> f64 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Lambert conformal conic projection with one or two standard parallels.
///
/// Projected coordinates are km east/north of the projection origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertConformal {
    /// Central meridian in radians
    lon0: f64,
    /// Cone constant
    n: f64,
    /// Scaled F constant (earth radius included)
    rf: f64,
    /// Rho at the origin latitude
    rho0: f64,
}

impl LambertConformal {
    /// Creates the projection. All arguments are in degrees.
    ///
    /// Returns `None` when the parameters do not define a cone, e.g. a
    /// standard parallel at a pole or parallels symmetric about the equator.
    pub fn new(origin_lat: f64, origin_lon: f64, lat1: f64, lat2: f64) -> Option<Self> {
        let lat0 = origin_lat * DEG_TO_RAD;
        let lat1 = lat1 * DEG_TO_RAD;
        let lat2 = lat2 * DEG_TO_RAD;

        let t = |lat: f64| (PI / 4.0 + lat / 2.0).tan();

        let n = if (lat1 - lat2).abs() < 1e-10 {
            // Tangent cone
            lat1.sin()
        } else {
            (lat1.cos() / lat2.cos()).ln() / (t(lat2) / t(lat1)).ln()
        };
        if !n.is_finite() || n.abs() < 1e-10 {
            return None;
        }

        let f = lat1.cos() * t(lat1).powf(n) / n;
        let rf = EARTH_RADIUS_KM * f;
        let rho0 = rf / t(lat0).powf(n);
        if !rf.is_finite() || !rho0.is_finite() {
            return None;
        }

        Some(Self {
            lon0: origin_lon * DEG_TO_RAD,
            n,
            rf,
            rho0,
        })
    }

    /// Projects `(lat, lon)` in degrees to `(x, y)` in km.
    pub fn latlon_to_xy(&self, lat: f64, lon: f64) -> (f64, f64) {
        let lat = lat * DEG_TO_RAD;
        let dlon = wrap_radians(lon * DEG_TO_RAD - self.lon0);

        let rho = self.rf / (PI / 4.0 + lat / 2.0).tan().powf(self.n);
        let theta = self.n * dlon;

        (rho * theta.sin(), self.rho0 - rho * theta.cos())
    }

    /// Inverse of [`Self::latlon_to_xy`], returns `(lat, lon)` in degrees.
    pub fn xy_to_latlon(&self, x: f64, y: f64) -> (f64, f64) {
        let sign = self.n.signum();
        let dy = self.rho0 - y;
        let rho = sign * (x * x + dy * dy).sqrt();
        let theta = (sign * x).atan2(sign * dy);

        let lat = if rho == 0.0 {
            sign * PI / 2.0
        } else {
            2.0 * (self.rf / rho).powf(1.0 / self.n).atan() - PI / 2.0
        };
        let lon = self.lon0 + theta / self.n;

        (lat * RAD_TO_DEG, wrap_radians(lon) * RAD_TO_DEG)
    }
}

/// Azimuthal equidistant ("flat earth") projection about an origin.
///
/// Distance from the origin is preserved along great circles; `x` points
/// east and `y` north at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatEarth {
    origin_lat: f64,
    origin_lon: f64,
    lat0: f64,
    lon0: f64,
}

impl FlatEarth {
    /// Creates the projection about `(origin_lat, origin_lon)` in degrees.
    pub fn new(origin_lat: f64, origin_lon: f64) -> Self {
        Self {
            origin_lat,
            origin_lon,
            lat0: origin_lat * DEG_TO_RAD,
            lon0: origin_lon * DEG_TO_RAD,
        }
    }

    /// Projects `(lat, lon)` in degrees to `(x, y)` in km.
    pub fn latlon_to_xy(&self, lat: f64, lon: f64) -> (f64, f64) {
        let lat = lat * DEG_TO_RAD;
        let dlon = wrap_radians(lon * DEG_TO_RAD - self.lon0);

        let cos_c = (self.lat0.sin() * lat.sin() + self.lat0.cos() * lat.cos() * dlon.cos())
            .clamp(-1.0, 1.0);
        let c = cos_c.acos();
        let k = if c.abs() < 1e-12 { 1.0 } else { c / c.sin() };

        let x = EARTH_RADIUS_KM * k * lat.cos() * dlon.sin();
        let y = EARTH_RADIUS_KM
            * k
            * (self.lat0.cos() * lat.sin() - self.lat0.sin() * lat.cos() * dlon.cos());
        (x, y)
    }

    /// Inverse of [`Self::latlon_to_xy`], returns `(lat, lon)` in degrees.
    pub fn xy_to_latlon(&self, x: f64, y: f64) -> (f64, f64) {
        let r = x.hypot(y);
        if r < 1e-9 {
            return (self.origin_lat, self.origin_lon);
        }

        let c = r / EARTH_RADIUS_KM;
        let (sin_c, cos_c) = c.sin_cos();

        let lat = (cos_c * self.lat0.sin() + y * sin_c * self.lat0.cos() / r)
            .clamp(-1.0, 1.0)
            .asin();
        let lon = self.lon0
            + (x * sin_c).atan2(r * self.lat0.cos() * cos_c - y * self.lat0.sin() * sin_c);

        (lat * RAD_TO_DEG, wrap_radians(lon) * RAD_TO_DEG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} vs {} (tol {})", a, b, tol);
    }

    #[test]
    fn test_lambert_origin_maps_to_zero() {
        let lc = LambertConformal::new(40.0, -100.0, 33.0, 45.0).unwrap();
        let (x, y) = lc.latlon_to_xy(40.0, -100.0);
        assert_close(x, 0.0, 1e-6);
        assert_close(y, 0.0, 1e-6);
    }

    #[test]
    fn test_lambert_round_trip() {
        let lc = LambertConformal::new(38.0, -98.0, 33.0, 45.0).unwrap();
        for &(lat, lon) in &[(25.0, -120.0), (48.5, -70.0), (38.0, -98.0), (30.0, -90.0)] {
            let (x, y) = lc.latlon_to_xy(lat, lon);
            let (lat2, lon2) = lc.xy_to_latlon(x, y);
            assert_close(lat2, lat, 1e-8);
            assert_close(lon2, lon, 1e-8);
        }
    }

    #[test]
    fn test_lambert_tangent_cone() {
        let lc = LambertConformal::new(25.0, -95.0, 25.0, 25.0).unwrap();
        let (x, y) = lc.latlon_to_xy(35.0, -85.0);
        let (lat, lon) = lc.xy_to_latlon(x, y);
        assert_close(lat, 35.0, 1e-8);
        assert_close(lon, -85.0, 1e-8);
        assert!(x > 0.0 && y > 0.0);
    }

    #[test]
    fn test_lambert_rejects_degenerate_cone() {
        assert!(LambertConformal::new(0.0, 0.0, 30.0, -30.0).is_none());
        assert!(LambertConformal::new(0.0, 0.0, 0.0, 0.0).is_none());
    }

    #[test]
    fn test_flat_origin_and_axes() {
        let flat = FlatEarth::new(40.0, -105.0);
        assert_eq!(flat.xy_to_latlon(0.0, 0.0), (40.0, -105.0));

        // 1 degree of latitude along the meridian
        let (x, y) = flat.latlon_to_xy(41.0, -105.0);
        assert_close(x, 0.0, 1e-9);
        assert_close(y, EARTH_RADIUS_KM * DEG_TO_RAD, 1e-6);

        let (x, _) = flat.latlon_to_xy(40.0, -104.0);
        assert!(x > 0.0);
    }

    #[test]
    fn test_flat_round_trip() {
        let flat = FlatEarth::new(35.0, -97.0);
        for &(x, y) in &[(100.0, 0.0), (-250.0, 310.0), (0.0, -480.0), (12.5, 7.25)] {
            let (lat, lon) = flat.xy_to_latlon(x, y);
            let (x2, y2) = flat.latlon_to_xy(lat, lon);
            assert_close(x2, x, 1e-6);
            assert_close(y2, y, 1e-6);
        }
    }
}
