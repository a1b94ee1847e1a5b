//! Error handling for the Cantiere back office
//!
//! Provides consistent error responses in Italian and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::WarehouseError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
        message_it: String,
    },

    #[error("Missing capability: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_it: String,
    },

    #[error("Validation error: {0}")]
    ValidationErrors(#[from] validator::ValidationErrors),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Warehouse rule violations
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_it: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: impl Into<String>, message_it: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message_en: message_en.into(),
            message_it: message_it.into(),
            field: None,
        }
    }

    fn with_field(mut self, field: Option<&str>) -> Self {
        self.field = field.map(str::to_string);
        self
    }
}

impl AppError {
    pub fn validation(field: &str, message: &str, message_it: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_it: message_it.to_string(),
        }
    }

    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new(
                    "INVALID_CREDENTIALS",
                    "Invalid email or password",
                    "Email o password non validi",
                ),
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("TOKEN_EXPIRED", "Token has expired", "Sessione scaduta"),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("INVALID_TOKEN", "Invalid token", "Token non valido"),
            ),
            AppError::Unauthorized { message, message_it } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone(), message_it.clone()),
            ),
            AppError::Forbidden(capability) => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "FORBIDDEN",
                    format!("Permission denied: requires {}", capability),
                    "Non hai i permessi per questa operazione",
                ),
            ),
            AppError::Validation {
                field,
                message,
                message_it,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_it.clone())
                    .with_field(Some(field)),
            ),
            AppError::ValidationErrors(errors) => {
                let field = errors.field_errors().keys().next().map(|f| f.to_string());
                (
                    StatusCode::BAD_REQUEST,
                    ErrorDetail::new(
                        "VALIDATION_ERROR",
                        errors.to_string(),
                        "Dati non validi",
                    )
                    .with_field(field.as_deref()),
                )
            }
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("{} non trovato", resource),
                ),
            ),
            AppError::Warehouse(err) => warehouse_detail(err),
            AppError::DatabaseError(sqlx::Error::Database(db)) if db.is_unique_violation() => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "DUPLICATE_ENTRY",
                    "A record with the same key already exists",
                    "Esiste già un elemento con lo stesso valore",
                ),
            ),
            AppError::DatabaseError(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INVALID_REFERENCE",
                    "A referenced record does not exist",
                    "Un elemento collegato non esiste",
                ),
            ),
            AppError::DatabaseError(sqlx::Error::RowNotFound) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", "Resource not found", "Elemento non trovato"),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "DATABASE_ERROR",
                    "A database error occurred",
                    "Errore del database",
                ),
            ),
            AppError::Internal(_) | AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred",
                    "Errore interno del server",
                ),
            ),
        }
    }
}

fn warehouse_detail(err: &WarehouseError) -> (StatusCode, ErrorDetail) {
    let (status, code, message_it) = match err {
        WarehouseError::NotFound { entity } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{} non trovato", entity),
        ),
        WarehouseError::InvalidQuantity { .. } => (
            StatusCode::BAD_REQUEST,
            "INVALID_QUANTITY",
            "Quantità non valida".to_string(),
        ),
        WarehouseError::InvalidInput { .. } => (
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "Dati non validi".to_string(),
        ),
        WarehouseError::InsufficientStock {
            code, available, ..
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "INSUFFICIENT_STOCK",
            format!("Giacenza insufficiente per {} (disponibili {})", code, available),
        ),
        WarehouseError::DuplicateName(name) => (
            StatusCode::CONFLICT,
            "DUPLICATE_ENTRY",
            format!("Esiste già una categoria chiamata '{}'", name),
        ),
        WarehouseError::DuplicateCode(code) => (
            StatusCode::CONFLICT,
            "DUPLICATE_ENTRY",
            format!("Esiste già un articolo con codice '{}'", code),
        ),
        WarehouseError::NoValidLines => (
            StatusCode::BAD_REQUEST,
            "NO_VALID_LINES",
            "La richiesta non contiene righe valide".to_string(),
        ),
        WarehouseError::NothingToFulfill => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "NOTHING_TO_FULFILL",
            "Nessuna quantità da evadere".to_string(),
        ),
        WarehouseError::ItemUnavailable { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "ITEM_UNAVAILABLE",
            "Articolo non disponibile".to_string(),
        ),
        WarehouseError::InvalidTransition { from, .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_STATE_TRANSITION",
            format!("Operazione non consentita nello stato {}", from),
        ),
    };

    (
        status,
        ErrorDetail::new(code, err.to_string(), message_it).with_field(err.field()),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::RequestStatus;
    use uuid::Uuid;

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn business_errors_map_to_client_statuses() {
        assert_eq!(status_of(WarehouseError::item_not_found()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(WarehouseError::invalid_quantity("quantity", "must be positive")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(WarehouseError::InsufficientStock {
                item_id: Uuid::new_v4(),
                code: "CAV-016".to_string(),
                requested: Decimal::from(12),
                available: Decimal::from(10),
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(WarehouseError::DuplicateName("DPI".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(WarehouseError::InvalidTransition {
                from: RequestStatus::Fulfilled,
                action: "approve",
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn auth_errors_map_to_401_and_403() {
        assert_eq!(status_of(AppError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AppError::Forbidden("audit.view".to_string())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn infrastructure_errors_hide_details() {
        let (status, detail) =
            AppError::DatabaseError(sqlx::Error::PoolTimedOut).status_and_detail();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail.message_en, "A database error occurred");
    }

    #[test]
    fn field_is_carried_for_form_errors() {
        let (_, detail) = AppError::from(WarehouseError::DuplicateCode("X1".to_string()))
            .status_and_detail();
        assert_eq!(detail.field.as_deref(), Some("code"));
    }
}
