//! Geographic <-> metric coordinate conversion.
//!
//! Every length, area and buffer in this crate is computed on planar UTM
//! coordinates (metres). Geographic WGS84 longitude/latitude is only used at
//! the edges: input records and geometries handed back for display.
//!
//! The transverse Mercator equations are the Krüger series to third order in
//! the third flattening, accurate to well under a millimetre inside a zone.

use geo::{Coord, MapCoords};

use crate::models::types::{AnalysisError, Result};

/// A reversible mapping between WGS84 lon/lat and a planar metric system
pub trait Projection: Send + Sync {
    /// Lon/lat (degrees) to easting/northing (metres)
    fn project(&self, geographic: Coord) -> Coord;

    /// Easting/northing (metres) to lon/lat (degrees)
    fn unproject(&self, metric: Coord) -> Coord;

    fn to_metric<G>(&self, geometry: &G) -> G
    where
        G: MapCoords<f64, f64, Output = G>,
        Self: Sized,
    {
        geometry.map_coords(|c| self.project(c))
    }

    fn to_geographic<G>(&self, geometry: &G) -> G
    where
        G: MapCoords<f64, f64, Output = G>,
        Self: Sized,
    {
        geometry.map_coords(|c| self.unproject(c))
    }
}

// WGS84 ellipsoid
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;

const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Universal Transverse Mercator zone on WGS84
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Utm {
    zone: u8,
    north: bool,
    central_meridian: f64,
    // Series coefficients, derived once from the ellipsoid
    rectifying_radius: f64,
    eccentricity: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl Utm {
    /// UTM zone 48N (EPSG:32648), the zone covering Singapore
    pub fn singapore() -> Self {
        Self::zone_unchecked(48, true)
    }

    /// UTM zone `zone` (1..=60) in the given hemisphere
    pub fn new(zone: u8, north: bool) -> Result<Self> {
        if !(1..=60).contains(&zone) {
            return Err(AnalysisError::InvalidParameter {
                name: "UTM zone",
                value: f64::from(zone),
                reason: "must be within 1..=60",
            });
        }
        Ok(Self::zone_unchecked(zone, north))
    }

    fn zone_unchecked(zone: u8, north: bool) -> Self {
        let n = FLATTENING / (2.0 - FLATTENING);
        let n2 = n * n;
        let n3 = n2 * n;

        Self {
            zone,
            north,
            central_meridian: (f64::from(zone) * 6.0 - 183.0).to_radians(),
            rectifying_radius: SEMI_MAJOR_AXIS / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0),
            eccentricity: (FLATTENING * (2.0 - FLATTENING)).sqrt(),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
        }
    }

    pub fn zone(&self) -> u8 {
        self.zone
    }

    pub fn is_north(&self) -> bool {
        self.north
    }

    /// EPSG code of this zone (326xx north, 327xx south)
    pub fn epsg(&self) -> u32 {
        let base = if self.north { 32600 } else { 32700 };
        base + u32::from(self.zone)
    }

    fn false_northing(&self) -> f64 {
        if self.north {
            0.0
        } else {
            FALSE_NORTHING_SOUTH
        }
    }
}

impl Default for Utm {
    fn default() -> Self {
        Self::singapore()
    }
}

impl Projection for Utm {
    fn project(&self, geographic: Coord) -> Coord {
        let lat = geographic.y.to_radians();
        let dlon = geographic.x.to_radians() - self.central_meridian;
        let e = self.eccentricity;

        // Conformal latitude
        let sin_lat = lat.sin();
        let t = (sin_lat.atanh() - e * (e * sin_lat).atanh()).sinh();
        let xi_prime = t.atan2(dlon.cos());
        let eta_prime = (dlon.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi += alpha * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += alpha * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        let scale = SCALE_FACTOR * self.rectifying_radius;
        Coord {
            x: FALSE_EASTING + scale * eta,
            y: self.false_northing() + scale * xi,
        }
    }

    fn unproject(&self, metric: Coord) -> Coord {
        let scale = SCALE_FACTOR * self.rectifying_radius;
        let xi = (metric.y - self.false_northing()) / scale;
        let eta = (metric.x - FALSE_EASTING) / scale;

        let mut xi_prime = xi;
        let mut eta_prime = eta;
        for (j, beta) in self.beta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi_prime -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_prime.sin() / eta_prime.cosh()).asin();
        let mut lat = chi;
        for (j, delta) in self.delta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            lat += delta * (k * chi).sin();
        }
        let lon = self.central_meridian + eta_prime.sinh().atan2(xi_prime.cos());

        Coord {
            x: lon.to_degrees(),
            y: lat.to_degrees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use geo::{line_string, point, Point};

    #[test]
    fn test_central_meridian_on_equator() {
        let utm = Utm::singapore();
        let origin = utm.project(Coord { x: 105.0, y: 0.0 });
        assert_abs_diff_eq!(origin.x, 500_000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(origin.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_known_singapore_coordinate() {
        // Raffles Place MRT in EPSG:32648
        let utm = Utm::singapore();
        let metric = utm.project(Coord { x: 103.851_463, y: 1.283_933 });
        assert_abs_diff_eq!(metric.x, 372_219.853, epsilon = 0.01);
        assert_abs_diff_eq!(metric.y, 141_942.112, epsilon = 0.01);
    }

    #[test]
    fn test_round_trip_is_sub_metre() {
        let utm = Utm::singapore();
        let route = line_string![
            (x: 103.6839, y: 1.3404),
            (x: 103.8198, y: 1.3521),
            (x: 103.9915, y: 1.3644),
            (x: 103.7649, y: 1.4491),
        ];

        let back = utm.to_geographic(&utm.to_metric(&route));
        for (a, b) in route.coords().zip(back.coords()) {
            // 1e-8 degrees is about a millimetre
            assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-8);
            assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_metric_distance_matches_geodesic_scale() {
        // 0.01 degree of latitude near the equator is about 1105.7 m on the
        // ellipsoid, times the 0.9996 scale factor near the central meridian
        let utm = Utm::singapore();
        let a: Point = utm.to_metric(&point!(x: 103.8, y: 1.30));
        let b: Point = utm.to_metric(&point!(x: 103.8, y: 1.31));
        let d = (b.y() - a.y()).hypot(b.x() - a.x());
        assert!((d - 1105.7).abs() < 2.0, "got {d}");
    }

    #[test]
    fn test_epsg_codes() {
        assert_eq!(Utm::singapore().epsg(), 32648);
        assert_eq!(Utm::new(56, false).unwrap().epsg(), 32756);
    }

    #[test]
    fn test_zone_out_of_range_is_rejected() {
        for zone in [0, 61, 255] {
            assert!(matches!(
                Utm::new(zone, true),
                Err(AnalysisError::InvalidParameter { name: "UTM zone", .. })
            ));
        }
        assert_eq!(Utm::new(48, true).unwrap(), Utm::singapore());
    }
}
