//! Reporting handlers for stock and movement exports

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::permissions::caps;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::reporting::{ReportFormat, StockReportFilter};
use crate::services::stock::MovementFilter;
use crate::services::ReportingService;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FormatQuery {
    #[serde(default)]
    pub format: ReportFormat,
}

fn respond<T: Serialize>(data: Vec<T>, format: ReportFormat, filename: &str) -> AppResult<Response> {
    match format {
        ReportFormat::Csv => {
            let csv = ReportingService::export_to_csv(&data)?;
            let disposition = format!("attachment; filename=\"{}\"", filename);
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                csv,
            )
                .into_response())
        }
        ReportFormat::Json => Ok(Json(data).into_response()),
    }
}

/// Stock report
pub async fn get_stock_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<StockReportFilter>,
) -> AppResult<Response> {
    current_user.0.require(caps::REPORTS_VIEW)?;
    if filter.format == ReportFormat::Csv {
        current_user.0.require(caps::REPORTS_EXPORT)?;
    }

    let rows = ReportingService::new(state.db).stock_report(&filter).await?;
    respond(rows, filter.format, "giacenze.csv")
}

/// Movement export
pub async fn get_movement_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<MovementFilter>,
    Query(format): Query<FormatQuery>,
) -> AppResult<Response> {
    current_user.0.require(caps::REPORTS_VIEW)?;
    current_user.0.require(caps::MOVEMENTS_VIEW)?;
    if format.format == ReportFormat::Csv {
        current_user.0.require(caps::REPORTS_EXPORT)?;
    }

    let rows = ReportingService::new(state.db)
        .movement_report(&filter)
        .await?;
    respond(rows, format.format, "movimenti.csv")
}
