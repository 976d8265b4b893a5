//! Page-view tracking.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::USER_AGENT},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use rayha_core::ProductId;

use crate::db::AnalyticsRepository;
use crate::db::analytics::PageView;
use crate::error::{AppError, Result};
use crate::models::session_keys;
use crate::state::AppState;

/// Longest path stored for a page view.
const MAX_PATH_LEN: usize = 512;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewRequest {
    pub path: String,
    #[serde(default)]
    pub product_id: Option<ProductId>,
}

/// Coarse device class from a User-Agent string.
fn device_class(user_agent: &str) -> &'static str {
    let ua = user_agent.to_ascii_lowercase();
    if ua.contains("ipad") || ua.contains("tablet") {
        "tablet"
    } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("android") {
        "mobile"
    } else {
        "desktop"
    }
}

/// Anonymous visitor id, created on first use.
async fn visitor_id(session: &Session) -> Result<String> {
    if let Some(id) = session
        .get::<String>(session_keys::ANALYTICS_SESSION)
        .await?
    {
        return Ok(id);
    }
    let id = Uuid::new_v4().to_string();
    session
        .insert(session_keys::ANALYTICS_SESSION, &id)
        .await?;
    Ok(id)
}

/// Record a page view.
#[instrument(skip(state, session, headers, req), fields(path = %req.path))]
pub async fn page_view(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Json(req): Json<PageViewRequest>,
) -> Result<StatusCode> {
    let path = req.path.trim();
    if path.is_empty() || path.len() > MAX_PATH_LEN {
        return Err(AppError::BadRequest("Chemin invalide".to_owned()));
    }

    let session_id = visitor_id(&session).await?;
    let device = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(device_class);

    AnalyticsRepository::new(state.pool())
        .record_page_view(&PageView {
            session_id: &session_id,
            path,
            product_id: req.product_id,
            device,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_class() {
        assert_eq!(
            device_class("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148"),
            "mobile"
        );
        assert_eq!(
            device_class("Mozilla/5.0 (Linux; Android 14; Pixel 8) Mobile Safari/537.36"),
            "mobile"
        );
        assert_eq!(
            device_class("Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)"),
            "tablet"
        );
        assert_eq!(
            device_class("Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/126.0"),
            "desktop"
        );
    }
}
