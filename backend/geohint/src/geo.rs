//! Geodesy helpers: candidate sampling, great-circle distance, scoring and
//! connector geometry.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for every distance in the game (km).
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Southern edge of the sampling band. Polar regions almost never have coverage.
pub const SAMPLE_MIN_LAT: f64 = -60.0;
/// Northern edge of the sampling band.
pub const SAMPLE_MAX_LAT: f64 = 75.0;

/// Distance at which a guess stops earning points (km).
pub const ZERO_SCORE_DISTANCE_KM: f64 = 10_000.0;

/// A point on the globe in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether the point lies in lat [-90, 90], lng [-180, 180].
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    /// Same point with the antimeridian written as +180, so longitudes stay
    /// in (-180, 180].
    pub fn canonical(self) -> Self {
        if self.lng == -180.0 {
            Self { lng: 180.0, ..self }
        } else {
            self
        }
    }

    fn to_unit_vector(self) -> [f64; 3] {
        let (lat, lng) = (self.lat.to_radians(), self.lng.to_radians());
        [lat.cos() * lng.cos(), lat.cos() * lng.sin(), lat.sin()]
    }

    fn from_unit_vector(v: [f64; 3]) -> Self {
        let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        let lat = (v[2] / norm).clamp(-1.0, 1.0).asin().to_degrees();
        let mut lng = v[1].atan2(v[0]).to_degrees();
        if lng <= -180.0 {
            lng += 360.0;
        }
        Self { lat, lng }
    }
}

/// Draw a candidate location: latitude uniform in [-60, 75], longitude
/// uniform in (-180, 180].
///
/// Deliberately not uniform on the sphere.
pub fn sample_point<R: Rng + ?Sized>(rng: &mut R) -> GeoPoint {
    let lat = rng.gen_range(SAMPLE_MIN_LAT..=SAMPLE_MAX_LAT);
    // gen() is in [0, 1), so this lands in (-180, 180].
    let lng = 180.0 - rng.gen::<f64>() * 360.0;
    GeoPoint { lat, lng }
}

/// Haversine distance between two points in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());
    EARTH_RADIUS_KM * c
}

/// Map a guess distance to a percentage: 100 at 0 km, falling linearly to
/// 0 at 10 000 km and beyond.
pub fn score_for_distance(distance_km: f64) -> u8 {
    if !distance_km.is_finite() {
        return 0;
    }
    let raw = ((1.0 - distance_km.max(0.0) / ZERO_SCORE_DISTANCE_KM) * 100.0).round();
    raw.clamp(0.0, 100.0) as u8
}

/// Points along the shorter great-circle arc from `a` to `b`, endpoints
/// included. `segments` is clamped to at least 1.
pub fn geodesic_path(a: GeoPoint, b: GeoPoint, segments: usize) -> Vec<GeoPoint> {
    let segments = segments.max(1);
    let va = a.to_unit_vector();
    let vb = b.to_unit_vector();
    let omega = dot(va, vb).clamp(-1.0, 1.0).acos();

    if omega < 1e-12 {
        return vec![a, b];
    }

    if std::f64::consts::PI - omega < 1e-9 {
        // Antipodes: every meridian-like arc is shortest; route through a
        // point a quarter turn away from `a`.
        let mid = perpendicular(va);
        let half = (segments / 2).max(1);
        let rest = segments.saturating_sub(half).max(1);
        let mut path = slerp_path(va, mid, half);
        path.pop();
        path.extend(slerp_path(mid, vb, rest));
        if let Some(first) = path.first_mut() {
            *first = a;
        }
        if let Some(last) = path.last_mut() {
            *last = b;
        }
        return path;
    }

    let mut path = slerp_path(va, vb, segments);
    // Keep the caller's exact endpoints.
    path[0] = a;
    path[segments] = b;
    path
}

fn slerp_path(va: [f64; 3], vb: [f64; 3], segments: usize) -> Vec<GeoPoint> {
    let segments = segments.max(1);
    let omega = dot(va, vb).clamp(-1.0, 1.0).acos();
    let sin_omega = omega.sin();

    (0..=segments)
        .map(|i| {
            let t = i as f64 / segments as f64;
            let (wa, wb) = if sin_omega.abs() < 1e-12 {
                (1.0 - t, t)
            } else {
                (
                    ((1.0 - t) * omega).sin() / sin_omega,
                    (t * omega).sin() / sin_omega,
                )
            };
            GeoPoint::from_unit_vector([
                wa * va[0] + wb * vb[0],
                wa * va[1] + wb * vb[1],
                wa * va[2] + wb * vb[2],
            ])
        })
        .collect()
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn perpendicular(v: [f64; 3]) -> [f64; 3] {
    // Cross with the pole unless `v` is (nearly) the pole itself.
    let axis = if v[2].abs() < 0.9 {
        [0.0, 0.0, 1.0]
    } else {
        [1.0, 0.0, 0.0]
    };
    let c = [
        v[1] * axis[2] - v[2] * axis[1],
        v[2] * axis[0] - v[0] * axis[2],
        v[0] * axis[1] - v[1] * axis[0],
    ];
    let n = dot(c, c).sqrt();
    [c[0] / n, c[1] / n, c[2] / n]
}
