use std::collections::{HashMap, HashSet};

use anyhow::Result;

use crate::geo::GeoPoint;
use crate::pricing::ResolvedPrice;

/// Read-side contract the trip cost pipeline consumes. The default
/// implementation lives in `toll_db` and runs the proximity matching
/// in-process, but anything that honors the same semantics works, e.g. a
/// spatial-capable store or an in-memory fake in tests.
///
/// The pipeline performs no writes through this trait, and both lookups are
/// expected to be single bounded-latency operations.
pub trait TollRegistry {
    /// Ids of all tolls within `threshold_meters` of the route polyline
    /// (point-to-polyline distance, not point-to-vertex).
    fn nearby_toll_ids(&self, route: &[GeoPoint], threshold_meters: f64) -> Result<HashSet<i64>>;

    /// Price rows for the given tolls and exactly the given vehicle class, as
    /// a single batched lookup. Tolls with no row for the class are simply
    /// absent from the result. Rows are ordered by (toll id, price id).
    fn prices_for(&self, toll_ids: &[i64], vehicle_class: &str) -> Result<Vec<ResolvedPrice>>;

    /// Name and location for the given tolls.
    fn toll_metadata(&self, toll_ids: &[i64]) -> Result<HashMap<i64, (String, GeoPoint)>>;
}
