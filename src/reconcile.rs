use crate::services::moderation_service::ModerationService;
use std::time::Duration;
use tracing::{info, warn};

/// Background task that finishes rejections interrupted mid-flight.
///
/// Runs on an interval, picks up photos claimed for deletion longer than
/// `stale_after` ago, and retries the asset and record deletes for each.
pub async fn run_reconcile_loop(
    moderation: ModerationService,
    interval_secs: u64,
    stale_after: Duration,
) {
    let stale_after = match chrono::Duration::from_std(stale_after) {
        Ok(d) => d,
        Err(e) => {
            warn!("Reconcile disabled, invalid stale threshold: {}", e);
            return;
        }
    };
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match moderation.reconcile_stale_rejections(stale_after).await {
            Ok(stats) => {
                if stats.completed > 0 || stats.failed > 0 {
                    info!(
                        "Reconcile: finished {} rejections, {} still pending",
                        stats.completed, stats.failed
                    );
                }
            }
            Err(e) => {
                warn!("Reconcile error: {}", e);
            }
        }
    }
}
