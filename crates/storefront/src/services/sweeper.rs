//! Abandoned-cart sweeper.
//!
//! Periodically snapshots account carts that nobody has touched for a while
//! into `abandoned_carts`, where the back-office can follow up on them.

use chrono::Utc;
use sqlx::PgPool;
use tracing::instrument;

use rayha_core::abandoned::is_idle;

use crate::config::AbandonedCartConfig;
use crate::db::abandoned_carts::CartSnapshot;
use crate::db::carts::CartActivity;
use crate::db::{AbandonedCartRepository, CartRepository, RepositoryError};

/// Run the sweeper forever.
pub async fn run(pool: PgPool, config: AbandonedCartConfig) {
    let mut interval = tokio::time::interval(config.sweep_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match sweep(&pool, config).await {
            Ok(0) => {}
            Ok(recorded) => tracing::info!(recorded, "Recorded abandoned carts"),
            Err(e) => tracing::error!(error = %e, "Abandoned cart sweep failed"),
        }
    }
}

/// Snapshot every idle cart once. Returns how many records changed.
///
/// A cart that fails to snapshot is logged and skipped.
///
/// # Errors
///
/// Returns `RepositoryError` if the list of carts cannot be read.
#[instrument(skip(pool))]
pub async fn sweep(pool: &PgPool, config: AbandonedCartConfig) -> Result<usize, RepositoryError> {
    let idle_after = chrono::Duration::from_std(config.idle_after)
        .unwrap_or_else(|_| chrono::Duration::hours(1));
    let now = Utc::now();

    let carts = CartRepository::new(pool);
    let abandoned = AbandonedCartRepository::new(pool);

    let idle: Vec<CartActivity> = carts
        .activity()
        .await?
        .into_iter()
        .filter(|activity| is_idle(activity.last_activity, now, idle_after))
        .collect();

    Ok(record_each(idle, |activity| snapshot(&carts, &abandoned, activity)).await)
}

/// Run `record` over every cart, counting successes and skipping failures.
async fn record_each<F, Fut>(idle: Vec<CartActivity>, mut record: F) -> usize
where
    F: FnMut(CartActivity) -> Fut,
    Fut: Future<Output = Result<bool, RepositoryError>>,
{
    let mut recorded = 0;
    for activity in idle {
        let user_id = activity.user_id;
        match record(activity).await {
            Ok(true) => recorded += 1,
            Ok(false) => {}
            Err(e) => tracing::warn!(user_id = %user_id, error = %e, "Skipping cart in sweep"),
        }
    }
    recorded
}

/// Snapshot one cart. Returns whether an abandoned-cart record changed.
async fn snapshot(
    carts: &CartRepository<'_>,
    abandoned: &AbandonedCartRepository<'_>,
    activity: CartActivity,
) -> Result<bool, RepositoryError> {
    let cart = carts.get(activity.user_id).await?;
    if cart.is_empty() {
        return Ok(false);
    }

    let client_id = activity.user_id.to_string();
    let client_name = display_name(&activity);
    let snapshot = CartSnapshot {
        client_id: Some(&client_id),
        client_name: &client_name,
        client_email: &activity.email,
        items: cart.lines(),
        total_value: cart.subtotal(),
        abandoned_at: activity.last_activity,
    };
    Ok(abandoned.upsert(&snapshot).await?.is_some())
}

fn display_name(activity: &CartActivity) -> String {
    activity
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map_or_else(
            || {
                activity
                    .email
                    .split('@')
                    .next()
                    .unwrap_or(&activity.email)
                    .to_owned()
            },
            str::to_owned,
        )
}

#[cfg(test)]
mod tests {
    use rayha_core::UserId;

    use super::*;

    fn activity(username: Option<&str>) -> CartActivity {
        CartActivity {
            user_id: UserId::new(1),
            email: "nadia@example.com".to_owned(),
            username: username.map(str::to_owned),
            last_activity: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_failing_cart_does_not_stop_the_sweep() {
        let idle = vec![activity(None), activity(None), activity(None)];
        let mut seen = 0;

        let recorded = record_each(idle, |_| {
            seen += 1;
            let outcome = match seen {
                1 => Err(RepositoryError::NotFound),
                2 => Ok(true),
                _ => Ok(false),
            };
            async move { outcome }
        })
        .await;

        assert_eq!(seen, 3);
        assert_eq!(recorded, 1);
    }

    #[test]
    fn test_display_name_prefers_username() {
        assert_eq!(display_name(&activity(Some("Nadia B."))), "Nadia B.");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        assert_eq!(display_name(&activity(None)), "nadia");
        assert_eq!(display_name(&activity(Some("  "))), "nadia");
    }
}
