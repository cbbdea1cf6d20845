use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::models::Role;

use super::AppState;
use super::error::ApiError;

/// Caller identity resolved from `Authorization: Bearer <access token>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub role: Role,
    pub session_id: Uuid,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::not_authenticated())?;

            let mut store = state.store.write().await;
            let record = store
                .verify_access(authz.token())
                .ok_or_else(ApiError::token_not_valid)?;

            let user = store
                .find_by_id(record.user_id)
                .filter(|u| u.is_active)
                .ok_or_else(ApiError::token_not_valid)?;

            Ok(AuthContext {
                user_id: user.id,
                role: user.role,
                session_id: record.session_id,
            })
        }
    }
}
