use axum::http::HeaderMap;
use elly_core::banking::UserId;

use crate::error::{ApiError, ApiResult};

/// Header carrying the authenticated user, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

pub fn current_user_id(headers: &HeaderMap) -> ApiResult<UserId> {
    let raw = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))?;
    raw.to_str()
        .ok()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .map(UserId)
        .ok_or_else(|| ApiError::BadRequest("Invalid X-User-Id header".to_string()))
}
