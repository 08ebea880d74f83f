use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};
use elly_core::obligations::Obligation;

use super::shared::current_user_id;
use crate::{error::ApiResult, main_lib::AppState};

async fn list_obligations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Obligation>>> {
    let user_id = current_user_id(&headers)?;
    let obligations = state.obligations.list_active(user_id).await?;
    Ok(Json(obligations))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/obligations", get(list_obligations))
}
