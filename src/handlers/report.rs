use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::instrument;

use crate::analytics::window_start;
use crate::error::AppError;
use crate::extract::AppQuery;
use crate::reports::{self, FormatParams, Grouping, Receipt, ReportFormat, REPORT_DAYS};
use crate::state::AppState;
use crate::store::SaleQuery;

fn text_attachment(body: String, file_name: &str) -> Result<Response, AppError> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .map_err(|e| AppError::internal(format!("Bad attachment name: {e}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn weekly(state: &AppState, grouping: Grouping, format: ReportFormat) -> Result<Response, AppError> {
    let now = Utc::now();
    let since = window_start(now, REPORT_DAYS);
    let sales = state.ledger.list_sales(&SaleQuery::between(since, now)).await?;
    let report = reports::weekly_report(&sales, grouping, since, now, &state.config.company_name);

    match format {
        ReportFormat::Json => Ok(Json(report).into_response()),
        ReportFormat::Text => text_attachment(report.render_text(), &report.file_name()),
    }
}

// GET /reports/weekly/customer
#[instrument(skip(state, params))]
pub async fn weekly_by_customer(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<FormatParams>,
) -> Result<Response, AppError> {
    weekly(&state, Grouping::Customer, params.format).await
}

// GET /reports/weekly/date
#[instrument(skip(state, params))]
pub async fn weekly_by_date(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<FormatParams>,
) -> Result<Response, AppError> {
    weekly(&state, Grouping::Date, params.format).await
}

// GET /receipt/{sale_id}
#[instrument(skip(state, params))]
pub async fn receipt(
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
    AppQuery(params): AppQuery<FormatParams>,
) -> Result<Response, AppError> {
    let sale = state.ledger.get_sale(sale_id).await?;
    let receipt = Receipt::new(sale, &state.config.company_name, Utc::now());

    match params.format {
        ReportFormat::Json => Ok(Json(receipt).into_response()),
        ReportFormat::Text => text_attachment(receipt.render_text(), &receipt.file_name()),
    }
}
