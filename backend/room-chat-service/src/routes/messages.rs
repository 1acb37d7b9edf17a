use crate::config::MAX_HISTORY_PAGE_SIZE;
use crate::error::AppError;
use crate::middleware::auth::CurrentUser;
use crate::models::RoomId;
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

impl HistoryParams {
    /// Page size clamped to `1..=200`, falling back to `default`.
    pub fn page(&self, default: i64) -> (i64, i64) {
        let limit = self.limit.unwrap_or(default).clamp(1, MAX_HISTORY_PAGE_SIZE);
        let skip = self.skip.unwrap_or(0).max(0);
        (limit, skip)
    }
}

/// GET /rooms/{room_id}/messages?limit=&skip=
///
/// Decrypted history, oldest first.
#[get("/rooms/{room_id}/messages")]
pub async fn get_history(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<RoomId>,
    query: web::Query<HistoryParams>,
) -> Result<HttpResponse, AppError> {
    let room_id = path.into_inner();
    state
        .rooms
        .resolve_room(room_id)
        .await?
        .ok_or(AppError::RoomNotFound)?;

    let (limit, skip) = query.page(state.config.history_page_size);
    let messages = state.pipeline.history(room_id, limit, skip).await?;

    tracing::debug!(room_id, user = %user.0.username, count = messages.len(), "history served");
    Ok(HttpResponse::Ok().json(messages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_clamps() {
        let params = HistoryParams { limit: None, skip: None };
        assert_eq!(params.page(50), (50, 0));

        let params = HistoryParams { limit: Some(1000), skip: Some(-3) };
        assert_eq!(params.page(50), (200, 0));

        let params = HistoryParams { limit: Some(0), skip: Some(10) };
        assert_eq!(params.page(50), (1, 10));
    }
}
