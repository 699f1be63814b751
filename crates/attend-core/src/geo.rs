//! Great-circle distance and office geofences.

use serde::{Deserialize, Serialize};

use crate::models::Coordinates;

/// Mean Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance between two points in meters (haversine), rounded to centimeters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    (EARTH_RADIUS_M * c * 100.0).round() / 100.0
}

/// A circular allowed area around an office
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Geofence {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
}

impl Geofence {
    /// Distance in meters from the geofence center
    pub fn distance_m(&self, position: &Coordinates) -> f64 {
        haversine_m(
            self.latitude,
            self.longitude,
            position.latitude,
            position.longitude,
        )
    }

    /// Whether the position falls on or inside the radius
    pub fn contains(&self, position: &Coordinates) -> bool {
        self.distance_m(position) <= self.radius_m
    }
}
