use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{Booth, BoothDesign, BoothId, BoothStatus, PaymentMethod, BOOTH_CATEGORIES};
use crate::registry::{BoothFilter, RegistryError, RegistryStats};
use crate::services::Advisory;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/booths", get(list_booths))
        .route("/booths/{id}/designs", get(booth_designs))
        .route("/categories", get(list_categories))
        .route("/payment-methods", get(payment_methods))
        .route("/advisories", get(advisories))
}

/// Параметры списка. Множественные значения - через запятую: `status=available,reserved`.
#[derive(Debug, Default, Deserialize)]
pub struct BoothsQuery {
    pub status: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub size: Option<String>,
    pub category: Option<u8>,
    pub q: Option<String>,
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default().split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl TryFrom<BoothsQuery> for BoothFilter {
    type Error = AppError;

    fn try_from(query: BoothsQuery) -> Result<Self, AppError> {
        let statuses = split_list(query.status.as_deref())
            .map(|s| match s.to_ascii_lowercase().as_str() {
                "available" => Ok(BoothStatus::Available),
                "booked" => Ok(BoothStatus::Booked),
                "reserved" => Ok(BoothStatus::Reserved),
                _ => Err(AppError::BadRequest(format!("Unknown booth status: {s}"))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
            if min > max {
                return Err(AppError::BadRequest("min_price must not exceed max_price".into()));
            }
        }
        Ok(BoothFilter {
            statuses,
            min_price: query.min_price,
            max_price: query.max_price,
            sizes: split_list(query.size.as_deref()).map(str::to_string).collect(),
            category: query.category,
            query: query.q,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct BoothsResponse {
    pub booths: Vec<Booth>,
    pub stats: RegistryStats,
}

pub async fn list_booths(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BoothsQuery>,
) -> Result<Json<BoothsResponse>, AppError> {
    let filter = BoothFilter::try_from(params)?;
    let registry = state.registry.read();
    let booths = registry.filter(&filter).cloned().collect();
    Ok(Json(BoothsResponse { booths, stats: registry.stats() }))
}

pub async fn booth_designs(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<Vec<BoothDesign>>, AppError> {
    let id = BoothId::parse(&raw).ok_or_else(|| AppError::BadRequest(format!("Invalid booth id: {raw}")))?;
    let registry = state.registry.read();
    if registry.get(&id).is_none() {
        return Err(RegistryError::NotFound(id).into());
    }
    Ok(Json(registry.designs_for(&id)))
}

pub async fn list_categories() -> Json<Value> {
    Json(json!({ "categories": BOOTH_CATEGORIES }))
}

pub async fn payment_methods(State(state): State<Arc<AppState>>) -> Json<Vec<PaymentMethod>> {
    Json(state.payment_methods.list())
}

pub async fn advisories(State(state): State<Arc<AppState>>) -> Json<Vec<Advisory>> {
    Json(state.advisories.list())
}
