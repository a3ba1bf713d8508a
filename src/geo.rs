use serde::{Deserialize, Serialize};

/// A fixed-precision coordinate in decimal degrees. Routes are ordered
/// sequences of these, length ≥ 1.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}
