use std::collections::HashMap;

use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// One row from the registry's batched price lookup: the price that applies to
/// a matched toll for the requested vehicle class.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPrice {
    pub toll_id: i64,
    pub price_id: i64,
    pub amount: Decimal,
    pub currency: String,
}

/// A matched toll with its resolved price, as returned to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricedToll {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub amount: Decimal,
    pub currency: String,
}

/// At most one price per toll. Storage forbids duplicate (toll, class) rows
/// via a unique index, but the resolver does not rely on that being enforced:
/// when duplicates do show up, the row with the lowest price id wins, so the
/// outcome stays deterministic.
pub fn dedupe_prices(prices: Vec<ResolvedPrice>) -> Vec<ResolvedPrice> {
    prices
        .into_iter()
        .sorted_by_key(|price| (price.toll_id, price.price_id))
        .dedup_by(|a, b| a.toll_id == b.toll_id)
        .collect()
}

/// Joins resolved prices with toll metadata, preserving the order of `prices`.
/// A price whose toll has disappeared from the registry between the two
/// lookups is dropped rather than reported with made-up metadata.
pub fn build_priced_tolls(
    prices: Vec<ResolvedPrice>,
    metadata: &HashMap<i64, (String, GeoPoint)>,
) -> Vec<PricedToll> {
    prices
        .into_iter()
        .filter_map(|price| {
            let (name, location) = metadata.get(&price.toll_id)?;
            Some(PricedToll {
                id: price.toll_id,
                name: name.clone(),
                latitude: location.latitude,
                longitude: location.longitude,
                amount: price.amount,
                currency: price.currency,
            })
        })
        .collect()
}

/// Total cost of the itemized tolls. Decimal arithmetic end-to-end, binary
/// floating point would drift across many summed prices.
pub fn aggregate(tolls: &[PricedToll]) -> Decimal {
    tolls.iter().map(|toll| toll.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(toll_id: i64, price_id: i64, amount: &str) -> ResolvedPrice {
        ResolvedPrice {
            toll_id,
            price_id,
            amount: amount.parse().unwrap(),
            currency: "USD".to_string(),
        }
    }

    #[test]
    fn dedupe_keeps_lowest_price_id() {
        let deduped = dedupe_prices(vec![
            price(2, 7, "4.00"),
            price(1, 9, "9.99"),
            price(1, 3, "2.50"),
            price(2, 8, "5.00"),
        ]);
        assert_eq!(deduped, vec![price(1, 3, "2.50"), price(2, 7, "4.00")]);
    }

    #[test]
    fn aggregate_is_exact_and_order_independent() {
        let tolls: Vec<PricedToll> = ["0.10", "0.20", "0.30"]
            .iter()
            .enumerate()
            .map(|(i, amount)| PricedToll {
                id: i as i64,
                name: format!("toll {i}"),
                latitude: 0.0,
                longitude: 0.0,
                amount: amount.parse().unwrap(),
                currency: "USD".to_string(),
            })
            .collect();
        let total = aggregate(&tolls);
        assert_eq!(total, "0.60".parse().unwrap());

        let reversed: Vec<PricedToll> = tolls.into_iter().rev().collect();
        assert_eq!(aggregate(&reversed), total);
    }

    #[test]
    fn aggregate_empty_is_zero() {
        assert_eq!(aggregate(&[]), Decimal::ZERO);
    }
}
