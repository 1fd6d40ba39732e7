//! CratonMap: tectonic polygons used to flag stable continental interiors
//! (spec.md §3, §4.6).

use serde::{Deserialize, Serialize};

/// A named polygon of ordered lat/lon vertices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CratonPolygon {
    pub name: String,
    /// `(latitude, longitude)` vertices in degrees, in order.
    pub vertices: Vec<(f64, f64)>,
}

impl CratonPolygon {
    /// Ray-casting point-in-polygon test. The polygon is treated as a
    /// simple closed ring; the caller need not repeat the first vertex.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (lat_i, lon_i) = self.vertices[i];
            let (lat_j, lon_j) = self.vertices[j];
            let straddles = (lat_i > lat) != (lat_j > lat);
            if straddles {
                let lon_cross = lon_j + (lat - lat_j) / (lat_i - lat_j) * (lon_i - lon_j);
                if lon < lon_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// Set of craton polygons; a point inside any of them is tectonically
/// stable (`is_tectonic = false` in `Stepper::set_environment`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CratonMap {
    pub polygons: Vec<CratonPolygon>,
}

impl CratonMap {
    pub fn new(polygons: Vec<CratonPolygon>) -> Self {
        Self { polygons }
    }

    /// `true` if `(lat, lon)` falls inside any registered craton polygon.
    pub fn inside_any_craton(&self, lat: f64, lon: f64) -> bool {
        self.polygons.iter().any(|p| p.contains(lat, lon))
    }
}
