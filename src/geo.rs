//! Geographic points and their Cartesian embedding.
//!
//! Latitude/longitude is projected onto a sphere of radius [`EARTH_RADIUS_KM`]
//! so that plain Euclidean distance can drive nearest-neighbour search.
//! In the embedding, (0, 179) and (0, -179) are ~222 km apart instead of
//! 358 degrees, and every meridian meets at the poles.

use ndarray::Array2;

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geotagged point. The id is only unique within one loaded set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[inline]
    pub fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self { id, lat, lon }
    }

    #[inline]
    pub fn to_cartesian(&self) -> Cartesian {
        Cartesian::from_geo(self)
    }
}

/// A point of the embedding, carrying the id of the `GeoPoint` it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cartesian {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Cartesian {
    pub fn from_geo(p: &GeoPoint) -> Self {
        let [x, y, z] = to_cartesian(p.lat, p.lon);
        Self { id: p.id, x, y, z }
    }

    pub fn to_geo(&self) -> GeoPoint {
        let (lat, lon) = to_geographic(&self.key());
        GeoPoint::new(self.id, lat, lon)
    }

    #[inline]
    pub fn key(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    pub fn distance(&self, other: &Cartesian) -> f64 {
        distance3(&self.key(), &other.key())
    }
}

/// Project degrees of latitude/longitude onto the sphere.
///
/// No range check: values outside [-90, 90] x [-180, 180] give a point on the
/// sphere that does not round-trip.
pub fn to_cartesian(lat: f64, lon: f64) -> [f64; 3] {
    let lat = lat.to_radians();
    let lon = lon.to_radians();
    [
        EARTH_RADIUS_KM * lat.cos() * lon.cos(),
        EARTH_RADIUS_KM * lat.cos() * lon.sin(),
        EARTH_RADIUS_KM * lat.sin(),
    ]
}

/// Inverse of [`to_cartesian`], in degrees.
pub fn to_geographic(c: &[f64; 3]) -> (f64, f64) {
    let [x, y, z] = *c;
    let lon = y.atan2(x).to_degrees();
    let lat = z.atan2((x * x + y * y).sqrt()).to_degrees();
    (lat, lon)
}

/// Euclidean distance between two 3D points
#[inline]
pub fn distance3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    squared_distance3(a, b).sqrt()
}

#[inline]
pub(crate) fn squared_distance3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

/// Bit pattern of a coordinate, usable as a hash key. `-0.0` and `0.0` map
/// to the same key.
#[inline]
pub(crate) fn location_key(c: &[f64; 3]) -> [u64; 3] {
    [
        (c[0] + 0.0).to_bits(),
        (c[1] + 0.0).to_bits(),
        (c[2] + 0.0).to_bits(),
    ]
}

/// A loaded set of points together with their embedding (one row per point).
#[derive(Debug, Clone)]
pub struct PointSet {
    points: Vec<GeoPoint>,
    coords: Array2<f64>,
}

impl PointSet {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        let mut coords = Array2::<f64>::zeros((points.len(), 3));
        for (i, p) in points.iter().enumerate() {
            let [x, y, z] = to_cartesian(p.lat, p.lon);
            coords[[i, 0]] = x;
            coords[[i, 1]] = y;
            coords[[i, 2]] = z;
        }
        Self { points, coords }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    #[inline]
    pub fn point(&self, i: usize) -> &GeoPoint {
        &self.points[i]
    }

    /// The n x 3 embedding matrix.
    pub fn coords(&self) -> &Array2<f64> {
        &self.coords
    }

    #[inline]
    pub fn coord(&self, i: usize) -> [f64; 3] {
        let row = self.coords.row(i);
        [row[0], row[1], row[2]]
    }

    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        distance3(&self.coord(i), &self.coord(j))
    }

    /// Number of distinct embedded locations.
    pub fn distinct_locations(&self) -> usize {
        let mut seen = std::collections::HashSet::with_capacity(self.len());
        (0..self.len())
            .filter(|&i| seen.insert(location_key(&self.coord(i))))
            .count()
    }
}
