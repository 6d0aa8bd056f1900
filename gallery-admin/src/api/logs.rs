use super::{
    extract::{Superadmin, UrlQuery},
    ApiError, AppState,
};
use axum::{extract::State, Json};
use gallery_admin_core::audit::{LogPage, LogQuery};

pub(super) async fn query_logs(
    State(state): State<AppState>,
    _admin: Superadmin,
    UrlQuery(query): UrlQuery<LogQuery>,
) -> Result<Json<LogPage>, ApiError> {
    Ok(Json(state.services.logger.query(&query).await?))
}
