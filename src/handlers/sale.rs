use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use tracing::{info, instrument};

use crate::analytics::window_start;
use crate::dtos::sale::{
    CreateSaleRequest, CreateSaleResponse, MarkPaidRequest, PaymentResponse, SaleListParams,
};
use crate::dtos::MessageResponse;
use crate::error::AppError;
use crate::extract::{AppJson, AppQuery};
use crate::middleware::auth::AuthContext;
use crate::models::sale::Sale;
use crate::state::AppState;
use crate::store::{NewSale, SaleQuery};

#[instrument(skip(state, params))]
pub async fn list_sales(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<SaleListParams>,
) -> Result<Json<Vec<Sale>>, AppError> {
    let sales = state.ledger.list_sales(&SaleQuery::from(params)).await?;
    Ok(Json(sales))
}

#[instrument(skip(state, auth, payload), fields(user = %auth.username))]
pub async fn create_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(payload): AppJson<CreateSaleRequest>,
) -> Result<(StatusCode, Json<CreateSaleResponse>), AppError> {
    let draft = NewSale::try_from(payload)?.validate()?;
    let sale = state.ledger.record_sale(draft).await?;
    Ok((StatusCode::CREATED, Json(CreateSaleResponse::from(sale))))
}

/// Sales from the last seven days.
#[instrument(skip(state))]
pub async fn weekly_sales(State(state): State<AppState>) -> Result<Json<Vec<Sale>>, AppError> {
    let now = Utc::now();
    let sales = state
        .ledger
        .list_sales(&SaleQuery::between(window_start(now, 7), now))
        .await?;
    Ok(Json(sales))
}

/// Sales since midnight UTC.
#[instrument(skip(state))]
pub async fn daily_sales(State(state): State<AppState>) -> Result<Json<Vec<Sale>>, AppError> {
    let now = Utc::now();
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);
    let sales = state
        .ledger
        .list_sales(&SaleQuery::between(midnight, now))
        .await?;
    Ok(Json(sales))
}

#[instrument(skip(state))]
pub async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Sale>, AppError> {
    Ok(Json(state.ledger.get_sale(id).await?))
}

#[instrument(skip(state, auth), fields(user = %auth.username))]
pub async fn delete_sale(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    auth.require_admin()?;
    state.ledger.delete_sale(id).await?;
    info!(sale_id = id, "sale deleted");
    Ok(Json(MessageResponse {
        message: "Sale deleted successfully",
    }))
}

#[instrument(skip(state, auth, payload), fields(user = %auth.username))]
pub async fn mark_paid(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<MarkPaidRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let sale = state
        .ledger
        .mark_paid(id, &payload.payment_method, payload.payment_date)
        .await?;
    Ok(Json(PaymentResponse {
        message: "Sale marked as paid",
        sale,
    }))
}

#[instrument(skip(state, auth), fields(user = %auth.username))]
pub async fn mark_unpaid(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<PaymentResponse>, AppError> {
    let sale = state.ledger.mark_unpaid(id).await?;
    Ok(Json(PaymentResponse {
        message: "Sale marked as unpaid",
        sale,
    }))
}
