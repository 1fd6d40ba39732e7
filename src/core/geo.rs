//! Geographic/geocentric coordinate conversions on the reference ellipsoid.
//!
//! Grounded on the shape of a small pure-function coordinate module (see
//! `busstoptaktik-geodesy`'s minimal provider in the reference pack): no
//! state, no I/O, everything a plain `f64 -> f64` transform so `Hypocenter`
//! can treat this as a leaf dependency.

/// WGS84 flattening.
pub const FLATTENING: f64 = 1.0 / 298.257223563;

/// `(1 - f)^2`, the factor relating geographic and geocentric latitude
/// tangents.
fn one_minus_f_squared() -> f64 {
    (1.0 - FLATTENING).powi(2)
}

/// Convert geographic (surface-normal) latitude, in degrees, to geocentric
/// latitude, in degrees.
pub fn geographic_to_geocentric_lat(lat_deg: f64) -> f64 {
    if lat_deg.abs() >= 90.0 {
        return lat_deg;
    }
    let lat_rad = lat_deg.to_radians();
    (one_minus_f_squared() * lat_rad.tan()).atan().to_degrees()
}

/// Convert geocentric latitude, in degrees, to geographic latitude, in
/// degrees. Exact inverse of [`geographic_to_geocentric_lat`].
pub fn geocentric_to_geographic_lat(geocentric_lat_deg: f64) -> f64 {
    if geocentric_lat_deg.abs() >= 90.0 {
        return geocentric_lat_deg;
    }
    let lat_rad = geocentric_lat_deg.to_radians();
    (lat_rad.tan() / one_minus_f_squared()).atan().to_degrees()
}

/// Geocentric colatitude (`90 - geocentric latitude`), in degrees, for a
/// geographic latitude in degrees.
pub fn colatitude_from_latitude(lat_deg: f64) -> f64 {
    90.0 - geographic_to_geocentric_lat(lat_deg)
}

/// Geographic latitude, in degrees, recovered from a geocentric colatitude
/// in degrees.
pub fn latitude_from_colatitude(colatitude_deg: f64) -> f64 {
    geocentric_to_geographic_lat(90.0 - colatitude_deg)
}

/// Normalize a longitude in degrees to `(-180, 180]`.
pub fn normalize_longitude(lon_deg: f64) -> f64 {
    let mut lon = lon_deg % 360.0;
    if lon <= -180.0 {
        lon += 360.0;
    } else if lon > 180.0 {
        lon -= 360.0;
    }
    lon
}

/// Cached trigonometric values of colatitude and longitude, recomputed
/// after every hypocenter mutation per spec.md §3's Hypocenter invariant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrigCache {
    pub sin_colat: f64,
    pub cos_colat: f64,
    pub sin_lon: f64,
    pub cos_lon: f64,
}

impl TrigCache {
    pub fn new(colatitude_deg: f64, longitude_deg: f64) -> Self {
        let colat_rad = colatitude_deg.to_radians();
        let lon_rad = longitude_deg.to_radians();
        Self {
            sin_colat: colat_rad.sin(),
            cos_colat: colat_rad.cos(),
            sin_lon: lon_rad.sin(),
            cos_lon: lon_rad.cos(),
        }
    }
}

/// Great-circle epicentral distance, in degrees, between a source and a
/// station given as (colatitude, longitude) pairs in degrees.
pub fn epicentral_distance_deg(
    source_colat_deg: f64,
    source_lon_deg: f64,
    station_colat_deg: f64,
    station_lon_deg: f64,
) -> f64 {
    let (sc, slo) = (source_colat_deg.to_radians(), source_lon_deg.to_radians());
    let (tc, tlo) = (station_colat_deg.to_radians(), station_lon_deg.to_radians());
    let cos_delta =
        sc.cos() * tc.cos() + sc.sin() * tc.sin() * (tlo - slo).cos();
    cos_delta.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Azimuth, in degrees from north, from the source to the station, given as
/// (colatitude, longitude) pairs in degrees.
pub fn azimuth_deg(
    source_colat_deg: f64,
    source_lon_deg: f64,
    station_colat_deg: f64,
    station_lon_deg: f64,
) -> f64 {
    let (sc, slo) = (source_colat_deg.to_radians(), source_lon_deg.to_radians());
    let (tc, tlo) = (station_colat_deg.to_radians(), station_lon_deg.to_radians());
    let dlon = tlo - slo;
    let y = dlon.sin() * tc.sin();
    let x = sc.cos() * tc.sin() * dlon.cos() - sc.sin() * tc.cos();
    let az = y.atan2(x).to_degrees();
    normalize_longitude(az).rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lats() -> Vec<f64> {
        vec![-89.9, -45.0, -10.0, 0.0, 10.0, 45.0, 67.3, 89.9]
    }

    #[test]
    fn geographic_geocentric_round_trip() {
        for lat in lats() {
            let colat = colatitude_from_latitude(lat);
            let back = latitude_from_colatitude(colat);
            assert!(
                (back - lat).abs() < 1e-9,
                "lat {} round-tripped to {}",
                lat,
                back
            );
        }
    }

    #[test]
    fn trig_cache_pythagorean_identity() {
        for lat in lats() {
            for lon in [-179.9, -90.0, 0.0, 45.5, 179.9] {
                let colat = colatitude_from_latitude(lat);
                let cache = TrigCache::new(colat, lon);
                let colat_sum = cache.sin_colat.powi(2) + cache.cos_colat.powi(2);
                let lon_sum = cache.sin_lon.powi(2) + cache.cos_lon.powi(2);
                assert!((colat_sum - 1.0).abs() < 1e-15);
                assert!((lon_sum - 1.0).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn normalize_longitude_range() {
        assert!((normalize_longitude(180.0) - 180.0).abs() < 1e-12);
        assert!((normalize_longitude(-180.0) - 180.0).abs() < 1e-12);
        assert!((normalize_longitude(270.0) - (-90.0)).abs() < 1e-12);
        assert!((normalize_longitude(-270.0) - 90.0).abs() < 1e-12);
    }

    #[test]
    fn zero_distance_for_identical_points() {
        let colat = colatitude_from_latitude(35.0);
        let d = epicentral_distance_deg(colat, -100.0, colat, -100.0);
        assert!(d < 1e-9);
    }

    #[test]
    fn quarter_great_circle_distance() {
        // North pole to equator is 90 degrees of arc.
        let d = epicentral_distance_deg(0.0, 0.0, 90.0, 0.0);
        assert!((d - 90.0).abs() < 1e-9);
    }
}
