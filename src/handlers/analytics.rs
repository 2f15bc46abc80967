use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::analytics::{
    self, window_start, AnalyticsParams, CustomerAnalysis, DashboardStats, LowStockAlerts,
    StockMovementReport, TopProducts,
};
use crate::error::AppError;
use crate::extract::AppQuery;
use crate::middleware::auth::AuthContext;
use crate::state::AppState;
use crate::store::{SaleQuery, StockQuery};

fn sales_since(since: DateTime<Utc>) -> SaleQuery {
    SaleQuery {
        since: Some(since),
        ..Default::default()
    }
}

#[instrument(skip(state, auth), fields(user = %auth.username))]
pub async fn dashboard_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<DashboardStats>, AppError> {
    auth.require_admin()?;
    let stock = state.ledger.list_stock(&StockQuery::default()).await?;
    let sales = state.ledger.list_sales(&SaleQuery::default()).await?;
    Ok(Json(analytics::dashboard_stats(&stock, &sales, Utc::now())))
}

#[instrument(skip(state, auth, params), fields(user = %auth.username))]
pub async fn top_selling_products(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppQuery(params): AppQuery<AnalyticsParams>,
) -> Result<Json<TopProducts>, AppError> {
    auth.require_admin()?;
    let (days, limit) = (params.days()?, params.limit()?);
    let start = window_start(Utc::now(), days);
    let sales = state.ledger.list_sales(&sales_since(start)).await?;
    Ok(Json(analytics::top_products(&sales, start, days, limit)))
}

#[instrument(skip(state, auth, params), fields(user = %auth.username))]
pub async fn customer_analysis(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppQuery(params): AppQuery<AnalyticsParams>,
) -> Result<Json<CustomerAnalysis>, AppError> {
    auth.require_admin()?;
    let (days, limit) = (params.days()?, params.limit()?);
    let start = window_start(Utc::now(), days);
    let sales = state.ledger.list_sales(&sales_since(start)).await?;
    Ok(Json(analytics::customer_analysis(&sales, start, days, limit)))
}

#[instrument(skip(state, auth, params), fields(user = %auth.username))]
pub async fn stock_movement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppQuery(params): AppQuery<AnalyticsParams>,
) -> Result<Json<StockMovementReport>, AppError> {
    auth.require_admin()?;
    let days = params.days()?;
    let stock = state.ledger.list_stock(&StockQuery::default()).await?;
    let now = Utc::now();
    let sales = state.ledger.list_sales(&sales_since(window_start(now, days))).await?;
    Ok(Json(analytics::stock_movement(&stock, &sales, now, days)))
}

/// Open to every role so the sales desk sees what is running out.
#[instrument(skip(state, params))]
pub async fn low_stock_alerts(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<AnalyticsParams>,
) -> Result<Json<LowStockAlerts>, AppError> {
    let threshold = params.threshold()?;
    let stock = state.ledger.list_stock(&StockQuery::default()).await?;
    Ok(Json(analytics::low_stock_alerts(&stock, threshold)))
}
