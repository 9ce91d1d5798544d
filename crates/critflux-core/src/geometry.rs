//! Small vector helpers for sphere meshes.

use std::f64::consts::PI;

/// A point in 3D space. Lattice nodes use `z = 0`.
pub type Vec3 = [f64; 3];

pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Scale to unit length. The zero vector is returned unchanged.
pub fn normalize(v: Vec3) -> Vec3 {
    let len = dot(v, v).sqrt();
    if len == 0.0 {
        return v;
    }
    [v[0] / len, v[1] / len, v[2] / len]
}

/// Midpoint of two points, projected back onto the unit sphere.
pub fn sphere_midpoint(a: Vec3, b: Vec3) -> Vec3 {
    normalize([(a[0] + b[0]) * 0.5, (a[1] + b[1]) * 0.5, (a[2] + b[2]) * 0.5])
}

/// Longitude and latitude (radians) of a unit vector.
///
/// Longitude is in `(-π, π]`, latitude in `[-π/2, π/2]`.
pub fn lon_lat(v: Vec3) -> (f64, f64) {
    (v[1].atan2(v[0]), v[2].clamp(-1.0, 1.0).asin())
}

/// Shortest signed offset `a - b` on a circle of the given period.
pub fn wrapped_delta(a: f64, b: f64, period: f64) -> f64 {
    let d = a - b;
    d - period * (d / period).round()
}

/// Map a longitude in radians onto `[0, 1)`.
pub fn lon_fraction(lon: f64) -> f64 {
    (lon + PI) / (2.0 * PI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_yields_unit_length() {
        let v = normalize([3.0, 4.0, 12.0]);
        assert!((dot(v, v) - 1.0).abs() < 1e-12);
        assert_eq!(normalize([0.0, 0.0, 0.0]), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn lon_lat_of_axes() {
        let (lon, lat) = lon_lat([0.0, 0.0, 1.0]);
        assert!((lat - PI / 2.0).abs() < 1e-12);
        assert_eq!(lon, 0.0);

        let (lon, lat) = lon_lat([0.0, 1.0, 0.0]);
        assert!((lon - PI / 2.0).abs() < 1e-12);
        assert!(lat.abs() < 1e-12);
    }

    #[test]
    fn wrapped_delta_takes_the_short_way_round() {
        assert!((wrapped_delta(9.0, 1.0, 10.0) - (-2.0)).abs() < 1e-12);
        assert!((wrapped_delta(1.0, 9.0, 10.0) - 2.0).abs() < 1e-12);
        assert!((wrapped_delta(3.0, 1.0, 10.0) - 2.0).abs() < 1e-12);
    }
}
