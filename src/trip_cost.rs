use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::polyline::{self, DecodeError};
use crate::pricing::{self, PricedToll};
use crate::proximity::TOLL_MATCH_THRESHOLD;
use crate::registry::TollRegistry;

/* The whole pipeline for one request: decode the path, match tolls against
it, resolve prices for the vehicle class, sum them up. Pure and idempotent,
nothing is persisted between requests. */

#[derive(Debug)]
pub struct TripCostRequest {
    pub polyline: String,
    pub vehicle_type: String,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct TripCost {
    pub cost: Decimal,
    pub tolls: Vec<PricedToll>,
}

#[derive(Debug, Error)]
pub enum TripCostError {
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("toll registry unavailable: {0}")]
    Registry(#[source] anyhow::Error),
}

fn validate(request: &TripCostRequest) -> Result<(), TripCostError> {
    let mut details = Vec::new();
    if request.polyline.is_empty() {
        details.push("Polyline cannot be empty".to_string());
    }
    if request.vehicle_type.is_empty() {
        details.push("Vehicle type cannot be empty".to_string());
    }
    if details.is_empty() {
        Ok(())
    } else {
        Err(TripCostError::Validation(details))
    }
}

pub fn compute_trip_cost(
    registry: &dyn TollRegistry,
    request: &TripCostRequest,
) -> Result<TripCost, TripCostError> {
    validate(request)?;
    // a non-empty polyline decodes to at least one point, so the route is
    // never empty past this line
    let route = polyline::decode(&request.polyline)?;

    let matched = registry
        .nearby_toll_ids(&route, TOLL_MATCH_THRESHOLD)
        .map_err(TripCostError::Registry)?;
    if matched.is_empty() {
        // no toll near the route, a valid outcome
        return Ok(TripCost {
            cost: Decimal::ZERO,
            tolls: Vec::new(),
        });
    }
    // ascending toll id keeps the itemized list reproducible across calls
    let mut toll_ids: Vec<i64> = matched.into_iter().collect();
    toll_ids.sort_unstable();

    let prices = registry
        .prices_for(&toll_ids, &request.vehicle_type)
        .map_err(TripCostError::Registry)?;
    let prices = pricing::dedupe_prices(prices);

    let priced_ids: Vec<i64> = prices.iter().map(|price| price.toll_id).collect();
    let metadata = registry
        .toll_metadata(&priced_ids)
        .map_err(TripCostError::Registry)?;

    let tolls = pricing::build_priced_tolls(prices, &metadata);
    let cost = pricing::aggregate(&tolls);
    debug!(
        "trip cost: {} toll(s) matched, {} priced, total = {}",
        toll_ids.len(),
        tolls.len(),
        cost
    );
    Ok(TripCost { cost, tolls })
}
