//! Session keep-alive
//!
//! Periodically fetches the site root so the session tokens do not expire
//! between sparse polls. The page itself is discarded.

use crate::tracker::ResilientFetcher;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Spawns the keep-alive loop
///
/// The first fetch happens one `period` after spawning. The loop exits when
/// `cancel` fires.
pub fn spawn_keepalive(
    fetcher: ResilientFetcher,
    root: Url,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match fetcher.fetch(&root).await {
                Ok(_) => tracing::debug!(url = %root, "Keep-alive ok"),
                Err(e) => tracing::warn!(url = %root, "Keep-alive failed: {}", e),
            }
        }

        tracing::debug!("Keep-alive stopped");
    })
}
