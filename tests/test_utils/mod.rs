use std::str::FromStr;

use rust_decimal::Decimal;
use tempdir::TempDir;
use tollway_core::toll_db::{NewPrice, NewToll, TollDb};

pub fn amount(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn scratch_db(name: &str) -> (TempDir, TollDb) {
    let dir = TempDir::new(name).unwrap();
    let db = TollDb::open(dir.path().to_str().unwrap()).unwrap();
    (dir, db)
}

pub fn draft_toll(
    name: &str,
    latitude: f64,
    longitude: f64,
    prices: &[(&str, &str, &str)],
) -> NewToll {
    NewToll {
        name: name.to_string(),
        latitude,
        longitude,
        prices: prices
            .iter()
            .map(|(vehicle_type, price, currency)| NewPrice {
                vehicle_type: vehicle_type.to_string(),
                amount: amount(price),
                currency: currency.to_string(),
            })
            .collect(),
    }
}
