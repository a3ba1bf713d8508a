pub mod test_utils;

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use test_utils::{amount, draft_toll, scratch_db};
use tollway_core::geo::GeoPoint;
use tollway_core::pricing::ResolvedPrice;
use tollway_core::registry::TollRegistry;
use tollway_core::trip_cost::{compute_trip_cost, TripCostError, TripCostRequest};

// decodes to [(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)]
const ENCODED_PATH: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

fn request(polyline: &str, vehicle_type: &str) -> TripCostRequest {
    TripCostRequest {
        polyline: polyline.to_string(),
        vehicle_type: vehicle_type.to_string(),
    }
}

/// In-memory registry stand-in, per the explicit-handle design: the pipeline
/// takes a registry reference, so tests can substitute this for the database.
#[derive(Default)]
struct FakeRegistry {
    nearby: HashSet<i64>,
    prices_by_class: HashMap<String, Vec<ResolvedPrice>>,
    metadata: HashMap<i64, (String, GeoPoint)>,
    unavailable: bool,
}

impl TollRegistry for FakeRegistry {
    fn nearby_toll_ids(&self, _route: &[GeoPoint], _threshold_meters: f64) -> Result<HashSet<i64>> {
        if self.unavailable {
            bail!("connection refused");
        }
        Ok(self.nearby.clone())
    }

    fn prices_for(&self, toll_ids: &[i64], vehicle_class: &str) -> Result<Vec<ResolvedPrice>> {
        if self.unavailable {
            bail!("connection refused");
        }
        Ok(self
            .prices_by_class
            .get(vehicle_class)
            .map(|prices| {
                prices
                    .iter()
                    .filter(|price| toll_ids.contains(&price.toll_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn toll_metadata(&self, toll_ids: &[i64]) -> Result<HashMap<i64, (String, GeoPoint)>> {
        Ok(self
            .metadata
            .iter()
            .filter(|(id, _)| toll_ids.contains(id))
            .map(|(id, meta)| (*id, meta.clone()))
            .collect())
    }
}

fn toll_meta(name: &str, latitude: f64, longitude: f64) -> (String, GeoPoint) {
    (
        name.to_string(),
        GeoPoint {
            latitude,
            longitude,
        },
    )
}

fn resolved(toll_id: i64, price_id: i64, price: &str) -> ResolvedPrice {
    ResolvedPrice {
        toll_id,
        price_id,
        amount: amount(price),
        currency: "USD".to_string(),
    }
}

#[test]
fn sums_matched_prices_in_toll_id_order() {
    let mut registry = FakeRegistry::default();
    registry.nearby = HashSet::from([2, 1]);
    registry.prices_by_class.insert(
        "car".to_string(),
        vec![resolved(1, 10, "2.50"), resolved(2, 11, "1.75")],
    );
    registry.metadata.insert(1, toll_meta("A", 38.5, -120.2));
    registry.metadata.insert(2, toll_meta("B", 40.7, -120.95));

    let result = compute_trip_cost(&registry, &request(ENCODED_PATH, "car")).unwrap();
    assert_eq!(result.cost, amount("4.25"));
    let ids: Vec<i64> = result.tolls.iter().map(|toll| toll.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(result.tolls[0].name, "A");
    assert_eq!(result.tolls[0].amount, amount("2.50"));

    // identical call, identical itemized order
    let again = compute_trip_cost(&registry, &request(ENCODED_PATH, "car")).unwrap();
    assert_eq!(again, result);
}

#[test]
fn toll_without_class_price_is_excluded_not_an_error() {
    let mut registry = FakeRegistry::default();
    registry.nearby = HashSet::from([1]);
    registry
        .prices_by_class
        .insert("car".to_string(), vec![resolved(1, 10, "2.50")]);
    registry.metadata.insert(1, toll_meta("A", 38.5, -120.2));

    let with_price = compute_trip_cost(&registry, &request(ENCODED_PATH, "car")).unwrap();
    assert_eq!(with_price.cost, amount("2.5"));
    assert_eq!(with_price.tolls.len(), 1);

    let without_price = compute_trip_cost(&registry, &request(ENCODED_PATH, "truck")).unwrap();
    assert_eq!(without_price.cost, Decimal::ZERO);
    assert_eq!(without_price.tolls, vec![]);
}

#[test]
fn duplicate_class_rows_resolve_to_lowest_price_id() {
    let mut registry = FakeRegistry::default();
    registry.nearby = HashSet::from([1]);
    registry.prices_by_class.insert(
        "car".to_string(),
        vec![resolved(1, 12, "9.99"), resolved(1, 10, "2.50")],
    );
    registry.metadata.insert(1, toll_meta("A", 38.5, -120.2));

    let result = compute_trip_cost(&registry, &request(ENCODED_PATH, "car")).unwrap();
    assert_eq!(result.tolls.len(), 1);
    assert_eq!(result.cost, amount("2.50"));
}

#[test]
fn malformed_polyline_is_a_decode_error() {
    let registry = FakeRegistry::default();
    let result = compute_trip_cost(&registry, &request("_p~iF", "car"));
    assert!(matches!(result, Err(TripCostError::Decode(_))));
}

#[test]
fn registry_failure_propagates_without_retry() {
    let registry = FakeRegistry {
        unavailable: true,
        ..Default::default()
    };
    let result = compute_trip_cost(&registry, &request(ENCODED_PATH, "car"));
    assert!(matches!(result, Err(TripCostError::Registry(_))));
}

#[test]
fn end_to_end_against_the_database() {
    let (_dir, mut db) = scratch_db("trip_cost_end_to_end");
    db.create_toll(draft_toll(
        "Sierra Gate",
        38.5,
        -120.2,
        &[("car", "2.50", "USD")],
    ))
    .unwrap();
    // nowhere near the route
    db.create_toll(draft_toll("Elsewhere", 0.0, 0.0, &[("car", "9.00", "USD")]))
        .unwrap();

    let result = compute_trip_cost(&db, &request(ENCODED_PATH, "car")).unwrap();
    assert_eq!(result.cost, amount("2.5"));
    assert_eq!(result.tolls.len(), 1);
    assert_eq!(result.tolls[0].name, "Sierra Gate");
    assert_eq!(result.tolls[0].latitude, 38.5);
    assert_eq!(result.tolls[0].currency, "USD");

    let result = compute_trip_cost(&db, &request(ENCODED_PATH, "truck")).unwrap();
    assert_eq!(result.cost, Decimal::ZERO);
    assert_eq!(result.tolls, vec![]);
}
