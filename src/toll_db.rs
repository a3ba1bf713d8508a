use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use itertools::Itertools;
use rusqlite::{Connection, OptionalExtension, ToSql, Transaction};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::geo::GeoPoint;
use crate::pricing::ResolvedPrice;
use crate::proximity;
use crate::registry::TollRegistry;
use crate::utils;

/* The toll registry database. Plain relational data: `toll` holds the fixed
toll points (unique by location) and `price` holds one row per
(toll, vehicle class) pair. Amounts are stored as decimal strings, they never
go through binary floating point. */

#[allow(clippy::type_complexity)]
fn open_db_and_run_migration(
    support_dir: &str,
    file_name: &str,
    migrations: &[&dyn Fn(&Transaction) -> Result<()>],
) -> Result<Connection> {
    debug!("open and run migration for {}", file_name);
    let mut conn = rusqlite::Connection::open(Path::new(support_dir).join(file_name))?;
    let tx = conn.transaction()?;

    let version = utils::db::init_metadata_and_get_version(&tx)? as usize;
    let target_version = migrations.len();
    debug!(
        "current version = {}, target_version = {}",
        version, target_version
    );
    match version.cmp(&target_version) {
        Ordering::Equal => (),
        Ordering::Less => {
            for i in (version)..target_version {
                info!("running migration for version: {}", i + 1);
                let f = migrations.get(i).unwrap();
                f(&tx)?;
            }
            utils::db::set_version_in_metadata(&tx, target_version as i32)?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                target_version
            );
        }
    }
    tx.commit()?;
    Ok(conn)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub id: i64,
    pub vehicle_type: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TollRecord {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub prices: Vec<PriceRecord>,
}

#[derive(Clone, Debug)]
pub struct NewPrice {
    pub vehicle_type: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Clone, Debug)]
pub struct NewToll {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub prices: Vec<NewPrice>,
}

/// Partial update. `None` leaves the field untouched; `prices: Some(..)`
/// replaces all price rows of the toll.
#[derive(Clone, Debug, Default)]
pub struct TollUpdate {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub prices: Option<Vec<NewPrice>>,
}

pub struct TollDb {
    conn: Connection,
}

impl TollDb {
    pub fn open(support_dir: &str) -> Result<TollDb> {
        let conn = open_db_and_run_migration(
            support_dir,
            "tollway.db",
            &[&|tx| {
                let sql = "
                CREATE TABLE toll (
                    id        INTEGER PRIMARY KEY AUTOINCREMENT,
                    name      TEXT NOT NULL,
                    latitude  REAL NOT NULL,
                    longitude REAL NOT NULL
                );
                CREATE UNIQUE INDEX unique_latitude_longitude ON toll (latitude, longitude);
                CREATE TABLE price (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    toll_id      INTEGER NOT NULL,
                    vehicle_type TEXT NOT NULL,
                    amount       TEXT NOT NULL,
                    currency     TEXT NOT NULL,
                    FOREIGN KEY (toll_id) REFERENCES toll (id)
                );
                CREATE UNIQUE INDEX unique_toll_vehicle_type ON price (toll_id, vehicle_type);
                ";
                for s in sql_split::split(sql) {
                    tx.execute(&s, ())?;
                }
                Ok(())
            }],
        )?;
        Ok(TollDb { conn })
    }

    pub fn create_toll(&mut self, new_toll: NewToll) -> Result<TollRecord> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO toll (name, latitude, longitude) VALUES (?1, ?2, ?3);",
            (&new_toll.name, new_toll.latitude, new_toll.longitude),
        )?;
        let toll_id = tx.last_insert_rowid();
        insert_prices(&tx, toll_id, &new_toll.prices)?;
        tx.commit()?;
        info!("created toll: id={}, name={}", toll_id, new_toll.name);
        Ok(self
            .get_toll(toll_id)?
            .expect("toll just inserted must exist"))
    }

    pub fn get_toll(&self, id: i64) -> Result<Option<TollRecord>> {
        let toll = self
            .conn
            .query_row(
                "SELECT id, name, latitude, longitude FROM toll WHERE id = ?1;",
                (id,),
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                    ))
                },
            )
            .optional()?;
        match toll {
            None => Ok(None),
            Some((id, name, latitude, longitude)) => {
                let mut prices_by_toll = self.prices_by_toll(&[id])?;
                Ok(Some(TollRecord {
                    id,
                    name,
                    latitude,
                    longitude,
                    prices: prices_by_toll.remove(&id).unwrap_or_default(),
                }))
            }
        }
    }

    pub fn list_tolls(&self) -> Result<Vec<TollRecord>> {
        let mut query = self
            .conn
            .prepare("SELECT id, name, latitude, longitude FROM toll ORDER BY id;")?;
        let tolls = query
            .query_map((), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let ids: Vec<i64> = tolls.iter().map(|(id, _, _, _)| *id).collect();
        let mut prices_by_toll = self.prices_by_toll(&ids)?;
        Ok(tolls
            .into_iter()
            .map(|(id, name, latitude, longitude)| TollRecord {
                id,
                name,
                latitude,
                longitude,
                prices: prices_by_toll.remove(&id).unwrap_or_default(),
            })
            .collect())
    }

    pub fn update_toll(&mut self, id: i64, update: TollUpdate) -> Result<Option<TollRecord>> {
        let tx = self.conn.transaction()?;
        let exists: Option<i64> = tx
            .query_row("SELECT id FROM toll WHERE id = ?1;", (id,), |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }
        if let Some(name) = &update.name {
            tx.execute("UPDATE toll SET name = ?1 WHERE id = ?2;", (name, id))?;
        }
        if let Some(latitude) = update.latitude {
            tx.execute(
                "UPDATE toll SET latitude = ?1 WHERE id = ?2;",
                (latitude, id),
            )?;
        }
        if let Some(longitude) = update.longitude {
            tx.execute(
                "UPDATE toll SET longitude = ?1 WHERE id = ?2;",
                (longitude, id),
            )?;
        }
        if let Some(prices) = &update.prices {
            tx.execute("DELETE FROM price WHERE toll_id = ?1;", (id,))?;
            insert_prices(&tx, id, prices)?;
        }
        tx.commit()?;
        info!("updated toll: id={}", id);
        self.get_toll(id)
    }

    // one batched query for any number of tolls
    fn prices_by_toll(&self, toll_ids: &[i64]) -> Result<HashMap<i64, Vec<PriceRecord>>> {
        if toll_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = toll_ids.iter().map(|_| "?").join(",");
        let sql = format!(
            "SELECT toll_id, id, vehicle_type, amount, currency FROM price \
             WHERE toll_id IN ({placeholders}) ORDER BY toll_id, id;"
        );
        let params: Vec<&dyn ToSql> = toll_ids.iter().map(|id| id as &dyn ToSql).collect();
        let mut query = self.conn.prepare(&sql)?;
        let rows = query
            .query_map(params.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut result: HashMap<i64, Vec<PriceRecord>> = HashMap::new();
        for (toll_id, id, vehicle_type, amount, currency) in rows {
            result.entry(toll_id).or_default().push(PriceRecord {
                id,
                vehicle_type,
                amount: Decimal::from_str(&amount)?,
                currency,
            });
        }
        Ok(result)
    }

    fn all_toll_points(&self) -> Result<Vec<(i64, GeoPoint)>> {
        let mut query = self
            .conn
            .prepare("SELECT id, latitude, longitude FROM toll;")?;
        let points = query
            .query_map((), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    GeoPoint {
                        latitude: row.get(1)?,
                        longitude: row.get(2)?,
                    },
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(points)
    }
}

fn insert_prices(tx: &Transaction, toll_id: i64, prices: &[NewPrice]) -> Result<()> {
    for price in prices {
        tx.execute(
            "INSERT INTO price (toll_id, vehicle_type, amount, currency) VALUES (?1, ?2, ?3, ?4);",
            (
                toll_id,
                &price.vehicle_type,
                price.amount.to_string(),
                &price.currency,
            ),
        )?;
    }
    Ok(())
}

impl TollRegistry for TollDb {
    // SQLite has no spatial predicate, so the point-to-polyline matching runs
    // in-process against the full toll table.
    fn nearby_toll_ids(&self, route: &[GeoPoint], threshold_meters: f64) -> Result<HashSet<i64>> {
        let tolls = self.all_toll_points()?;
        Ok(proximity::match_tolls(route, &tolls, threshold_meters))
    }

    fn prices_for(&self, toll_ids: &[i64], vehicle_class: &str) -> Result<Vec<ResolvedPrice>> {
        if toll_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = toll_ids.iter().map(|_| "?").join(",");
        let sql = format!(
            "SELECT toll_id, id, amount, currency FROM price \
             WHERE toll_id IN ({placeholders}) AND vehicle_type = ? \
             ORDER BY toll_id, id;"
        );
        let vehicle_class = vehicle_class.to_string();
        let mut params: Vec<&dyn ToSql> = toll_ids.iter().map(|id| id as &dyn ToSql).collect();
        params.push(&vehicle_class);
        let mut query = self.conn.prepare(&sql)?;
        let rows = query
            .query_map(params.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(toll_id, price_id, amount, currency)| {
                Ok(ResolvedPrice {
                    toll_id,
                    price_id,
                    amount: Decimal::from_str(&amount)?,
                    currency,
                })
            })
            .collect()
    }

    fn toll_metadata(&self, toll_ids: &[i64]) -> Result<HashMap<i64, (String, GeoPoint)>> {
        if toll_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = toll_ids.iter().map(|_| "?").join(",");
        let sql =
            format!("SELECT id, name, latitude, longitude FROM toll WHERE id IN ({placeholders});");
        let params: Vec<&dyn ToSql> = toll_ids.iter().map(|id| id as &dyn ToSql).collect();
        let mut query = self.conn.prepare(&sql)?;
        let rows = query
            .query_map(params.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    (
                        row.get::<_, String>(1)?,
                        GeoPoint {
                            latitude: row.get(2)?,
                            longitude: row.get(3)?,
                        },
                    ),
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().collect())
    }
}
