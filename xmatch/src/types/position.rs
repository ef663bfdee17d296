use serde::{Deserialize, Serialize};

/// Number of arcseconds in one degree.
pub const ARCSEC_PER_DEGREE: f64 = 3600.0;

/// A sky position in degrees.
///
/// Longitude is the right ascension (or any other azimuthal coordinate), latitude the
/// declination. No normalization is applied; the trigonometric operations below are valid for
/// any finite input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub longitude: f64,
    pub latitude: f64,
}

impl Position {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Returns the embedding of this position on the unit sphere.
    pub fn to_unit_vector(&self) -> [f64; 3] {
        let (sin_lon, cos_lon) = self.longitude.to_radians().sin_cos();
        let (sin_lat, cos_lat) = self.latitude.to_radians().sin_cos();

        [cos_lat * cos_lon, cos_lat * sin_lon, sin_lat]
    }

    /// Returns the great-circle separation to `other`, in degrees.
    ///
    /// Uses the Vincenty formula, which stays accurate both for tiny separations (where the
    /// spherical law of cosines loses precision) and for nearly antipodal points.
    pub fn separation_deg(&self, other: &Position) -> f64 {
        let delta_lon = (other.longitude - self.longitude).to_radians();
        let (sin_lat1, cos_lat1) = self.latitude.to_radians().sin_cos();
        let (sin_lat2, cos_lat2) = other.latitude.to_radians().sin_cos();
        let (sin_delta, cos_delta) = delta_lon.sin_cos();

        let term1 = cos_lat2 * sin_delta;
        let term2 = cos_lat1 * sin_lat2 - sin_lat1 * cos_lat2 * cos_delta;
        let numerator = term1.hypot(term2);
        let denominator = sin_lat1 * sin_lat2 + cos_lat1 * cos_lat2 * cos_delta;

        numerator.atan2(denominator).to_degrees()
    }

    /// Returns the great-circle separation to `other`, in arcseconds.
    pub fn separation_arcsec(&self, other: &Position) -> f64 {
        self.separation_deg(other) * ARCSEC_PER_DEGREE
    }

    /// Returns the arithmetic midpoint of both coordinate pairs.
    ///
    /// This is the plain average of longitudes and latitudes, so the midpoint of two identical
    /// positions is that position exactly.
    pub fn midpoint(&self, other: &Position) -> Position {
        Position {
            longitude: 0.5 * (self.longitude + other.longitude),
            latitude: 0.5 * (self.latitude + other.latitude),
        }
    }
}

/// Converts an angular separation in arcseconds into the squared chord length between two
/// unit vectors separated by that angle.
///
/// Chord length is monotone in the angle over `[0, 180]` degrees, which lets spatial indexes
/// search with euclidean distances while thresholds stay angular.
pub fn arcsec_to_chord_squared(arcsec: f64) -> f64 {
    let half_angle = (arcsec / ARCSEC_PER_DEGREE).to_radians().min(std::f64::consts::PI) / 2.0;
    let chord = 2.0 * half_angle.sin();

    chord * chord
}
