//! Back-office traffic summary.

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::db::AnalyticsRepository;
use crate::db::analytics::AnalyticsSummary;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

const DEFAULT_DAYS: i64 = 30;
const MAX_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<i64>,
}

impl SummaryQuery {
    /// Window length in days, clamped to 1..=365.
    fn days(&self) -> i64 {
        self.days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
    }
}

/// Page views, visitors, add-to-carts and top products over the last days.
#[instrument(skip(state, _admin))]
pub async fn summary(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<AnalyticsSummary>> {
    let since = Utc::now() - Duration::days(query.days());
    let summary = AnalyticsRepository::new(state.pool())
        .summary(since)
        .await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_window() {
        assert_eq!(SummaryQuery { days: None }.days(), 30);
        assert_eq!(SummaryQuery { days: Some(0) }.days(), 1);
        assert_eq!(SummaryQuery { days: Some(7) }.days(), 7);
        assert_eq!(SummaryQuery { days: Some(10_000) }.days(), 365);
    }
}
