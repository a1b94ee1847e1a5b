//! Authentication middleware
//!
//! JWT authentication and capability-based access control

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::permissions::{self, Role};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::auth::decode_token;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Check if the user's role grants a capability
    pub fn can(&self, capability: &str) -> bool {
        permissions::has_capability(Some(self.role), capability)
    }

    /// Permission guard for use in handlers
    pub fn require(&self, capability: &str) -> AppResult<()> {
        if self.can(capability) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.user_id, role = %self.role, capability, "Capability denied");
            Err(AppError::Forbidden(capability.to_string()))
        }
    }
}

/// Authentication middleware that validates JWT tokens
///
/// The role claim is parsed into [`Role`] here; a token carrying anything
/// else is rejected rather than downgraded.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            return AppError::Unauthorized {
                message: "Missing or invalid Authorization header".to_string(),
                message_it: "Autenticazione richiesta".to_string(),
            }
            .into_response();
        }
    };

    let auth_user = match authenticate(token, &state.config.jwt.secret) {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

fn authenticate(token: &str, secret: &str) -> AppResult<AuthUser> {
    let claims = decode_token(token, secret)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
    let role = claims.role.parse::<Role>().map_err(|e| {
        tracing::warn!(%user_id, "Rejecting token: {}", e);
        AppError::InvalidToken
    })?;

    Ok(AuthUser { user_id, role })
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authentication required".to_string(),
                message_it: "Autenticazione richiesta".to_string(),
            })
    }
}
