//! Tax calculation and zone/rate administration.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use pawprint_core::{Address, StoreId, TaxRateId, TaxZoneId};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::{TaxRateRepository, TaxZoneRepository};
use crate::error::{AppError, Result};
use crate::middleware::StoreContext;
use crate::models::{NewTaxRate, NewTaxZone, TaxRate, TaxZone, UpdateTaxRate, UpdateTaxZone};
use crate::state::AppState;
use crate::tax::{calculate_tax, LineItem, TaxBreakdown};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/calculate", post(calculate))
        .route("/zones", get(list_zones).post(create_zone))
        .route(
            "/zones/{zone_id}",
            get(get_zone).put(update_zone).delete(delete_zone),
        )
        .route("/zones/{zone_id}/rates", get(list_rates).post(create_rate))
        .route(
            "/zones/{zone_id}/rates/{rate_id}",
            axum::routing::patch(update_rate).delete(delete_rate),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalculateTaxRequest {
    line_items: Vec<LineItem>,
    #[serde(default)]
    shipping_amount: Decimal,
    address: Address,
}

/// Compute tax for a prospective checkout. A destination no zone matches is
/// a legitimate zero-tax response, not an error.
async fn calculate(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
    Json(request): Json<CalculateTaxRequest>,
) -> Result<Json<TaxBreakdown>> {
    let zones = TaxZoneRepository::new(state.pool())
        .zones_with_rates(store_id)
        .await?;

    Ok(Json(calculate_tax(
        &request.line_items,
        request.shipping_amount,
        &request.address,
        &zones,
    )))
}

async fn list_zones(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
) -> Result<Json<Vec<TaxZone>>> {
    let zones = TaxZoneRepository::new(state.pool()).list(store_id).await?;
    Ok(Json(zones))
}

async fn create_zone(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
    Json(input): Json<NewTaxZone>,
) -> Result<(StatusCode, Json<TaxZone>)> {
    input.validate()?;
    let zone = TaxZoneRepository::new(state.pool())
        .create(store_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

async fn get_zone(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
    Path(zone_id): Path<TaxZoneId>,
) -> Result<Json<TaxZone>> {
    let zone = TaxZoneRepository::new(state.pool())
        .get(store_id, zone_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tax zone {zone_id}")))?;
    Ok(Json(zone))
}

async fn update_zone(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
    Path(zone_id): Path<TaxZoneId>,
    Json(input): Json<UpdateTaxZone>,
) -> Result<Json<TaxZone>> {
    input.validate()?;
    let zone = TaxZoneRepository::new(state.pool())
        .update(store_id, zone_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tax zone {zone_id}")))?;
    Ok(Json(zone))
}

async fn delete_zone(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
    Path(zone_id): Path<TaxZoneId>,
) -> Result<StatusCode> {
    let deleted = TaxZoneRepository::new(state.pool())
        .delete(store_id, zone_id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound(format!("tax zone {zone_id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Resolve a zone within the caller's store or 404.
async fn require_zone(state: &AppState, store_id: StoreId, zone_id: TaxZoneId) -> Result<TaxZone> {
    TaxZoneRepository::new(state.pool())
        .get(store_id, zone_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tax zone {zone_id}")))
}

async fn list_rates(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
    Path(zone_id): Path<TaxZoneId>,
) -> Result<Json<Vec<TaxRate>>> {
    let zone = require_zone(&state, store_id, zone_id).await?;
    let rates = TaxRateRepository::new(state.pool())
        .list_for_zone(zone.id)
        .await?;
    Ok(Json(rates))
}

async fn create_rate(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
    Path(zone_id): Path<TaxZoneId>,
    Json(input): Json<NewTaxRate>,
) -> Result<(StatusCode, Json<TaxRate>)> {
    input.validate()?;
    let zone = require_zone(&state, store_id, zone_id).await?;
    let rate = TaxRateRepository::new(state.pool())
        .create(zone.id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(rate)))
}

async fn update_rate(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
    Path((zone_id, rate_id)): Path<(TaxZoneId, TaxRateId)>,
    Json(input): Json<UpdateTaxRate>,
) -> Result<Json<TaxRate>> {
    input.validate()?;
    let zone = require_zone(&state, store_id, zone_id).await?;
    let rate = TaxRateRepository::new(state.pool())
        .update(zone.id, rate_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tax rate {rate_id}")))?;
    Ok(Json(rate))
}

async fn delete_rate(
    State(state): State<AppState>,
    StoreContext(store_id): StoreContext,
    Path((zone_id, rate_id)): Path<(TaxZoneId, TaxRateId)>,
) -> Result<StatusCode> {
    let zone = require_zone(&state, store_id, zone_id).await?;
    let deleted = TaxRateRepository::new(state.pool())
        .delete(zone.id, rate_id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound(format!("tax rate {rate_id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
