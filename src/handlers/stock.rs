// src/handlers/stock.rs
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use crate::dtos::stock::{CreateStockRequest, StockMutationResponse, StockSearchParams, UpdateStockRequest};
use crate::dtos::MessageResponse;
use crate::error::AppError;
use crate::extract::{AppJson, AppQuery};
use crate::middleware::auth::AuthContext;
use crate::models::stock::StockItem;
use crate::state::AppState;
use crate::store::{NewStock, StockPatch, StockQuery};

// GET /stock - All stock lines by product name
#[instrument(skip(state))]
pub async fn list_stock(
    State(state): State<AppState>,
) -> Result<Json<Vec<StockItem>>, AppError> {
    let items = state.ledger.list_stock(&StockQuery::default()).await?;
    Ok(Json(items))
}

// GET /stock/search?q=&filter=&sort=
#[instrument(skip(state, params))]
pub async fn search_stock(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<StockSearchParams>,
) -> Result<Json<Vec<StockItem>>, AppError> {
    let query = StockQuery::try_from(params)?;
    let items = state.ledger.list_stock(&query).await?;
    Ok(Json(items))
}

// GET /stock/{id}
#[instrument(skip(state))]
pub async fn get_stock(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StockItem>, AppError> {
    Ok(Json(state.ledger.get_stock(id).await?))
}

// POST /stock - Add to an existing line or open a new one (admin)
#[instrument(skip(state, auth, payload), fields(user = %auth.username))]
pub async fn add_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(payload): AppJson<CreateStockRequest>,
) -> Result<(StatusCode, Json<StockMutationResponse>), AppError> {
    auth.require_admin()?;
    let draft = NewStock::try_from(payload)?.validate()?;
    let upsert = state.ledger.upsert_stock(draft).await?;

    let message = if upsert.created {
        "Stock added successfully"
    } else {
        "Stock updated successfully"
    };
    Ok((
        StatusCode::CREATED,
        Json(StockMutationResponse {
            message,
            stock: upsert.item,
        }),
    ))
}

// PUT /stock/{id} - Partial update (admin)
#[instrument(skip(state, auth, payload), fields(user = %auth.username))]
pub async fn update_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<UpdateStockRequest>,
) -> Result<Json<StockMutationResponse>, AppError> {
    auth.require_admin()?;
    let patch = StockPatch::from(payload).validate()?;
    let item = state.ledger.adjust_stock(id, patch).await?;
    Ok(Json(StockMutationResponse {
        message: "Stock updated successfully",
        stock: item,
    }))
}

// DELETE /stock/{id} (admin)
#[instrument(skip(state, auth), fields(user = %auth.username))]
pub async fn delete_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    auth.require_admin()?;
    state.ledger.delete_stock(id).await?;
    Ok(Json(MessageResponse {
        message: "Stock deleted successfully",
    }))
}
