//! REST API endpoint handlers
//!
//! Handlers stay thin: decode, call a service, encode. Errors become
//! `{"error": ...}` bodies through `AppError`'s `IntoResponse`.

use crate::api::types::{AddStockRequest, HealthResponse, HistoryQuery};
use crate::db::sqlite::TrackedStock;
use crate::error::AppError;
use crate::services::{
    AddStockResult, DeleteResult, DeleteSymbolResult, HistoryResult, HistoryService, PriceResult,
    QuotesService, SymbolGroup, WatchlistService,
};
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Json, Path, Query, State,
    },
    http::StatusCode,
};
use std::sync::Arc;
use tracing::{info, warn};

type ApiResult<T> = Result<T, AppError>;

/// Health check endpoint - GET /health or GET /
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// GET /api/stocks
pub async fn list_stocks(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<SymbolGroup>>> {
    let groups = WatchlistService::list_enriched(&state).await?;
    Ok(Json(groups))
}

/// POST /api/stocks
pub async fn add_stock(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddStockRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AddStockResult>)> {
    let Json(request) = payload.map_err(|e| {
        warn!("Rejected add-stock body: {}", e);
        AppError::Validation(format!("Invalid data: {}", e.body_text()))
    })?;

    let result = WatchlistService::add_stock(&state, request)?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/stocks/:id
pub async fn get_stock(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<TrackedStock>> {
    let Path(id) = id.map_err(|_| AppError::NotFound("Stock not found".to_string()))?;
    Ok(Json(WatchlistService::get_stock(&state, id)?))
}

/// DELETE /api/stocks/:id
pub async fn delete_stock(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<DeleteResult>> {
    let Path(id) = id.map_err(|_| AppError::NotFound("Stock not found".to_string()))?;
    Ok(Json(WatchlistService::delete_stock(&state, id)?))
}

/// DELETE /api/symbols/:symbol
pub async fn delete_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<DeleteSymbolResult>> {
    Ok(Json(WatchlistService::delete_symbol(&state, &symbol)?))
}

/// GET /api/history/:symbol?period=
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResult>> {
    let result = HistoryService::get_history(&state, &symbol, query.period.as_deref()).await?;
    info!(
        "History for {} ({}): {} points",
        result.symbol,
        result.period.label(),
        result.data.len()
    );
    Ok(Json(result))
}

/// GET /api/price/:symbol
pub async fn get_price(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<PriceResult>> {
    Ok(Json(QuotesService::get_price(&state, &symbol).await?))
}
