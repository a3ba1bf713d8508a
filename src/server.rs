use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpResponse, HttpServer};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::storage::Storage;
use crate::toll_db::{NewPrice, NewToll, TollUpdate};
use crate::trip_cost::{self, TripCostError, TripCostRequest};

/// Upper bound for one request's worth of registry work (candidate fetch plus
/// batched price fetch). Hitting it is a recoverable failure, the request
/// fails with 503 and nothing retries.
const REGISTRY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripCostBody {
    polyline: Option<String>,
    vehicle_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceBody {
    vehicle_type: Option<String>,
    amount: Option<Decimal>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddTollBody {
    name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    prices: Option<Vec<PriceBody>>,
}

#[derive(Debug, Deserialize)]
struct UpdateTollBody {
    name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    prices: Option<Vec<PriceBody>>,
}

fn validation_error(details: Vec<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "error": "Validation error",
        "details": details,
    }))
}

fn internal_error(err: anyhow::Error) -> HttpResponse {
    error!("internal error: {:?}", err);
    HttpResponse::InternalServerError().json(json!({ "error": "Internal server error" }))
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn validate_price(body: PriceBody, details: &mut Vec<String>) -> Option<NewPrice> {
    let vehicle_type = match body.vehicle_type {
        None => {
            details.push("Vehicle type is required".to_string());
            None
        }
        Some(v) if v.is_empty() => {
            details.push("Vehicle type cannot be empty".to_string());
            None
        }
        Some(v) => Some(v),
    };
    if body.amount.is_none() {
        details.push("Amount is required".to_string());
    }
    let currency = match body.currency {
        None => {
            details.push("Currency is required".to_string());
            None
        }
        Some(c) if c.is_empty() => {
            details.push("Currency cannot be empty".to_string());
            None
        }
        Some(c) => Some(c),
    };
    Some(NewPrice {
        vehicle_type: vehicle_type?,
        amount: body.amount?,
        currency: currency?,
    })
}

fn validate_new_toll(body: AddTollBody) -> Result<NewToll, Vec<String>> {
    let mut details = Vec::new();
    match &body.name {
        None => details.push("Name is required".to_string()),
        Some(name) if name.is_empty() => details.push("Name cannot be empty".to_string()),
        Some(_) => (),
    }
    if body.latitude.is_none() {
        details.push("Latitude is required".to_string());
    }
    if body.longitude.is_none() {
        details.push("Longitude is required".to_string());
    }
    let prices = match body.prices {
        None => {
            details.push("Prices are required".to_string());
            Vec::new()
        }
        Some(prices) => prices
            .into_iter()
            .filter_map(|price| validate_price(price, &mut details))
            .collect(),
    };
    match (body.name, body.latitude, body.longitude, details.is_empty()) {
        (Some(name), Some(latitude), Some(longitude), true) => Ok(NewToll {
            name,
            latitude,
            longitude,
            prices,
        }),
        _ => Err(details),
    }
}

fn validate_toll_update(body: UpdateTollBody) -> Result<TollUpdate, Vec<String>> {
    let mut details = Vec::new();
    let prices = body.prices.map(|prices| {
        prices
            .into_iter()
            .filter_map(|price| validate_price(price, &mut details))
            .collect()
    });
    if details.is_empty() {
        Ok(TollUpdate {
            name: body.name,
            latitude: body.latitude,
            longitude: body.longitude,
            prices,
        })
    } else {
        Err(details)
    }
}

async fn list_tolls(storage: web::Data<Storage>) -> HttpResponse {
    let result = web::block(move || storage.with_db(|db| db.list_tolls())).await;
    match result {
        Ok(Ok(tolls)) => HttpResponse::Ok().json(tolls),
        Ok(Err(err)) => internal_error(err),
        Err(err) => internal_error(anyhow!("blocking task failed: {}", err)),
    }
}

async fn get_toll(storage: web::Data<Storage>, id: web::Path<i64>) -> HttpResponse {
    let id = id.into_inner();
    let result = web::block(move || storage.with_db(|db| db.get_toll(id))).await;
    match result {
        Ok(Ok(Some(toll))) => HttpResponse::Ok().json(toll),
        Ok(Ok(None)) => HttpResponse::NotFound().json(json!({ "error": "Toll not found" })),
        Ok(Err(err)) => internal_error(err),
        Err(err) => internal_error(anyhow!("blocking task failed: {}", err)),
    }
}

async fn add_toll(storage: web::Data<Storage>, body: web::Json<AddTollBody>) -> HttpResponse {
    let new_toll = match validate_new_toll(body.into_inner()) {
        Ok(new_toll) => new_toll,
        Err(details) => return validation_error(details),
    };
    let result = web::block(move || storage.with_db(|db| db.create_toll(new_toll))).await;
    match result {
        Ok(Ok(toll)) => HttpResponse::Created().json(json!({
            "message": "Toll added successfully",
            "toll": toll,
        })),
        Ok(Err(err)) if is_unique_violation(&err) => HttpResponse::Conflict().json(json!({
            "error": "A toll already exists at this location",
        })),
        Ok(Err(err)) => internal_error(err),
        Err(err) => internal_error(anyhow!("blocking task failed: {}", err)),
    }
}

async fn update_toll(
    storage: web::Data<Storage>,
    id: web::Path<i64>,
    body: web::Json<UpdateTollBody>,
) -> HttpResponse {
    let id = id.into_inner();
    let update = match validate_toll_update(body.into_inner()) {
        Ok(update) => update,
        Err(details) => return validation_error(details),
    };
    let result = web::block(move || storage.with_db(|db| db.update_toll(id, update))).await;
    match result {
        Ok(Ok(Some(toll))) => HttpResponse::Ok().json(json!({
            "message": "Toll updated successfully",
            "toll": toll,
        })),
        Ok(Ok(None)) => HttpResponse::NotFound().json(json!({ "error": "Toll not found" })),
        Ok(Err(err)) if is_unique_violation(&err) => HttpResponse::Conflict().json(json!({
            "error": "A toll already exists at this location",
        })),
        Ok(Err(err)) => internal_error(err),
        Err(err) => internal_error(anyhow!("blocking task failed: {}", err)),
    }
}

async fn get_trip_cost(storage: web::Data<Storage>, body: web::Json<TripCostBody>) -> HttpResponse {
    let body = body.into_inner();
    let mut details = Vec::new();
    if body.polyline.is_none() {
        details.push("Polyline is required".to_string());
    }
    if body.vehicle_type.is_none() {
        details.push("Vehicle type is required".to_string());
    }
    let request = match (body.polyline, body.vehicle_type) {
        (Some(polyline), Some(vehicle_type)) => TripCostRequest {
            polyline,
            vehicle_type,
        },
        _ => return validation_error(details),
    };

    let result = tokio::time::timeout(
        REGISTRY_TIMEOUT,
        web::block(move || storage.with_db(|db| trip_cost::compute_trip_cost(db, &request))),
    )
    .await;
    let result = match result {
        Err(_) => {
            warn!("trip cost request timed out after {:?}", REGISTRY_TIMEOUT);
            return HttpResponse::ServiceUnavailable()
                .json(json!({ "error": "Toll registry unavailable" }));
        }
        Ok(Err(err)) => return internal_error(anyhow!("blocking task failed: {}", err)),
        Ok(Ok(result)) => result,
    };
    match result {
        Ok(trip_cost) => HttpResponse::Ok().json(trip_cost),
        Err(TripCostError::Validation(details)) => validation_error(details),
        Err(err @ TripCostError::Decode(_)) => validation_error(vec![err.to_string()]),
        Err(TripCostError::Registry(err)) => {
            error!("registry failure: {:?}", err);
            HttpResponse::ServiceUnavailable().json(json!({ "error": "Toll registry unavailable" }))
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tolls")
            .route("", web::get().to(list_tolls))
            .route("", web::post().to(add_toll))
            .route("/price", web::post().to(get_trip_cost))
            .route("/{id}", web::get().to(get_toll))
            .route("/{id}", web::patch().to(update_toll)),
    );
}

pub async fn run(storage: Arc<Storage>, host: &str, port: u16) -> std::io::Result<()> {
    let data = web::Data::from(storage);
    info!("starting server on {}:{}", host, port);
    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind((host, port))?
        .run()
        .await
}
