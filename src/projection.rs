//! Transverse-Mercator planar projection used for chord projection and interpolation.
//!
//! Points are mapped into a transverse-Mercator plane on the WGS84 ellipsoid
//! (Krüger series to third order in the third flattening, accurate to about
//! a millimeter within 3000 km of the central meridian). The default zone is
//! UTM 48N, centred on 105°E, which covers the offset datums' region well
//! enough for the short chords this crate interpolates along. Geometry
//! outside that region uses the UTM zone it falls in.
//!
//! Planar geometry (point-to-segment projection, fractional positions along
//! polylines) goes through `geo`.

use geo::{Coord, Line, LineInterpolatePoint, LineLocatePoint, LineString, Point};

use crate::coords::is_in_coverage_region;
use crate::Coordinate;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;

/// Transverse-Mercator projection with a fixed central meridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarProjection {
    central_meridian: f64,
    false_northing: f64,
}

impl Default for PlanarProjection {
    fn default() -> Self {
        Self::utm_north(48)
    }
}

impl PlanarProjection {
    /// Northern-hemisphere UTM zone (1-60).
    pub fn utm_north(zone: u8) -> Self {
        Self {
            central_meridian: (zone as f64) * 6.0 - 183.0,
            false_northing: 0.0,
        }
    }

    /// Projection for geometry around `coord`: zone 48 inside the coverage
    /// region, otherwise the UTM zone containing `coord`.
    pub fn local_to(coord: &Coordinate) -> Self {
        if is_in_coverage_region(coord.lng, coord.lat) {
            Self::default()
        } else {
            let zone = (((coord.lng + 180.0) / 6.0).floor() as i64).clamp(0, 59) + 1;
            Self::utm_north(zone as u8)
        }
    }

    pub fn central_meridian(&self) -> f64 {
        self.central_meridian
    }

    /// Geographic -> planar (easting, northing) in meters.
    pub fn forward(&self, coord: &Coordinate) -> Coord<f64> {
        let s = Series::wgs84();
        let phi = coord.lat.to_radians();
        let lambda = (coord.lng - self.central_meridian).to_radians();

        let e = s.eccentricity;
        let t = (phi.sin().atanh() - e * (e * phi.sin()).atanh()).sinh();
        let xi_p = (t / lambda.cos()).atan();
        let eta_p = (lambda.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut easting = eta_p;
        let mut northing = xi_p;
        for (j, alpha) in s.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            easting += alpha * (k * xi_p).cos() * (k * eta_p).sinh();
            northing += alpha * (k * xi_p).sin() * (k * eta_p).cosh();
        }

        Coord {
            x: UTM_FALSE_EASTING + UTM_K0 * s.rectifying_radius * easting,
            y: self.false_northing + UTM_K0 * s.rectifying_radius * northing,
        }
    }

    /// Planar (easting, northing) -> geographic.
    pub fn inverse(&self, planar: Coord<f64>) -> Coordinate {
        let s = Series::wgs84();
        let xi = (planar.y - self.false_northing) / (UTM_K0 * s.rectifying_radius);
        let eta = (planar.x - UTM_FALSE_EASTING) / (UTM_K0 * s.rectifying_radius);

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, beta) in s.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_p -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_p -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let mut phi = chi;
        for (j, delta) in s.delta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            phi += delta * (k * chi).sin();
        }
        let lambda = eta_p.sinh().atan2(xi_p.cos());

        Coordinate::new(self.central_meridian + lambda.to_degrees(), phi.to_degrees())
    }

    /// Closest point to `p` on the segment `a`-`b`, measured in the plane.
    ///
    /// Projections falling before `a` or after `b` clamp to the endpoint; a
    /// zero-length segment returns `a`.
    pub fn project_onto_segment(&self, a: &Coordinate, b: &Coordinate, p: &Coordinate) -> Coordinate {
        let line = Line::new(self.forward(a), self.forward(b));
        let fraction = line
            .line_locate_point(&Point::from(self.forward(p)))
            .filter(|f| f.is_finite())
            .unwrap_or(0.0);
        self.point_at_fraction(&line, fraction)
    }

    /// Points at the given fractions of the straight planar chord `a`-`b`.
    pub fn interpolate_chord(&self, a: &Coordinate, b: &Coordinate, fractions: &[f64]) -> Vec<Coordinate> {
        let line = Line::new(self.forward(a), self.forward(b));
        fractions
            .iter()
            .map(|&f| self.point_at_fraction(&line, f))
            .collect()
    }

    /// Fraction of total planar length at which each vertex of `path` projects
    /// onto the path itself.
    ///
    /// Returns one value per vertex. Degenerate paths (fewer than two distinct
    /// vertices) yield zeros.
    pub fn vertex_fractions(&self, path: &[Coordinate]) -> Vec<f64> {
        let planar: Vec<Coord<f64>> = path.iter().map(|c| self.forward(c)).collect();
        let line = LineString::new(planar.clone());
        planar
            .into_iter()
            .map(|c| {
                line.line_locate_point(&Point::from(c))
                    .filter(|f| f.is_finite())
                    .unwrap_or(0.0)
            })
            .collect()
    }

    fn point_at_fraction(&self, line: &Line<f64>, fraction: f64) -> Coordinate {
        let planar = line
            .line_interpolate_point(fraction)
            .map(|p| p.0)
            .unwrap_or(line.start);
        self.inverse(planar)
    }
}

/// Krüger series coefficients for one ellipsoid.
struct Series {
    eccentricity: f64,
    rectifying_radius: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl Series {
    fn wgs84() -> Self {
        let f = WGS84_F;
        let n = f / (2.0 - f);
        let n2 = n * n;
        let n3 = n2 * n;

        Self {
            eccentricity: (f * (2.0 - f)).sqrt(),
            rectifying_radius: WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0),
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::haversine_distance;

    #[test]
    fn test_central_meridian_easting() {
        let proj = PlanarProjection::default();
        assert_eq!(proj.central_meridian(), 105.0);
        let planar = proj.forward(&Coordinate::new(105.0, 30.0));
        assert!((planar.x - 500_000.0).abs() < 1e-6);
        // Meridian arc to 30°N scaled by k0
        assert!((planar.y - 3_318_785.35).abs() < 1.0, "northing = {}", planar.y);
    }

    #[test]
    fn test_local_zone() {
        let chengdu = PlanarProjection::local_to(&Coordinate::new(104.06, 30.67));
        assert_eq!(chengdu.central_meridian(), 105.0);
        let beijing = PlanarProjection::local_to(&Coordinate::new(116.40, 39.90));
        assert_eq!(beijing.central_meridian(), 105.0);
        let greenwich = PlanarProjection::local_to(&Coordinate::new(0.0, 0.0));
        assert_eq!(greenwich.central_meridian(), 3.0);
        let dateline = PlanarProjection::local_to(&Coordinate::new(180.0, 10.0));
        assert_eq!(dateline.central_meridian(), 177.0);
    }

    #[test]
    fn test_forward_inverse_round_trip() {
        let proj = PlanarProjection::default();
        for coord in [
            Coordinate::new(104.06, 30.67),
            Coordinate::new(116.40, 39.90),
            Coordinate::new(121.47, 31.23),
        ] {
            let back = proj.inverse(proj.forward(&coord));
            assert!(haversine_distance(&coord, &back) < 0.01);
        }
    }

    #[test]
    fn test_project_onto_segment() {
        let proj = PlanarProjection::default();
        let a = Coordinate::new(104.00, 30.00);
        let b = Coordinate::new(104.02, 30.00);
        let p = Coordinate::new(104.01, 30.001);
        let projected = proj.project_onto_segment(&a, &b, &p);
        assert!((projected.lng - 104.01).abs() < 1e-4);
        assert!((projected.lat - 30.0).abs() < 1e-4);

        // Before the segment start clamps to a
        let before = proj.project_onto_segment(&a, &b, &Coordinate::new(103.99, 30.0));
        assert!(haversine_distance(&before, &a) < 0.01);

        // Degenerate segment returns a
        let degenerate = proj.project_onto_segment(&a, &a, &p);
        assert!(haversine_distance(&degenerate, &a) < 0.01);
    }

    #[test]
    fn test_interpolate_chord_midpoint() {
        let proj = PlanarProjection::default();
        let a = Coordinate::new(104.00, 30.00);
        let b = Coordinate::new(104.00, 30.02);
        let points = proj.interpolate_chord(&a, &b, &[0.0, 0.5, 1.0]);
        assert_eq!(points.len(), 3);
        let half = haversine_distance(&a, &b) / 2.0;
        assert!((haversine_distance(&a, &points[1]) - half).abs() < 1.0);
        assert!(haversine_distance(&points[2], &b) < 0.01);
    }

    #[test]
    fn test_vertex_fractions() {
        let proj = PlanarProjection::default();
        let path = vec![
            Coordinate::new(104.00, 30.00),
            Coordinate::new(104.01, 30.00),
            Coordinate::new(104.02, 30.00),
        ];
        let fractions = proj.vertex_fractions(&path);
        assert!(fractions[0].abs() < 1e-9);
        assert!((fractions[1] - 0.5).abs() < 1e-3);
        assert!((fractions[2] - 1.0).abs() < 1e-9);
    }
}
