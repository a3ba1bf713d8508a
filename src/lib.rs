#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod geo;
pub mod polyline;
pub mod pricing;
pub mod proximity;
pub mod registry;
pub mod server;
pub mod storage;
pub mod toll_db;
pub mod trip_cost;
mod utils;
