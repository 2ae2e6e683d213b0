use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::SharedState;

/// Extractor guarding the operator API: `Authorization: Bearer <token>`
/// checked against the configured token in constant time.
#[derive(Debug, Clone)]
pub struct ApiAuth;

impl FromRequestParts<SharedState> for ApiAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Expected bearer token".to_string()))?;

        let matches: bool = token
            .as_bytes()
            .ct_eq(state.config.api_token.as_bytes())
            .into();

        if matches {
            Ok(ApiAuth)
        } else {
            Err(AppError::Unauthorized("Invalid API token".to_string()))
        }
    }
}
