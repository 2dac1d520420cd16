//! Poll scheduler
//!
//! Each cycle lists every subscription, groups them by resource and checks
//! each distinct resource once, with a bounded number of checks in flight.
//! A resource's subscribers are never split across tasks, so only one task
//! ever writes a given cursor within a cycle.

use crate::model::{Resource, Subscription};
use crate::storage::{self, SharedStore};
use crate::tracker::engine::{CheckOutcome, ResourceChecker};
use crate::{Result, TrackerError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Summary of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub resources: usize,
    pub subscriptions: usize,
    pub checked: usize,
    pub empty: usize,
    pub skipped: usize,
    pub failed: usize,
    pub notified: usize,
    pub baselined: usize,
    pub deferred: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Skipped => self.skipped += 1,
            CheckOutcome::ExtractionEmpty => self.empty += 1,
            CheckOutcome::Checked {
                notified,
                baselined,
                deferred,
            } => {
                self.checked += 1;
                self.notified += notified;
                self.baselined += baselined;
                self.deferred += deferred;
            }
        }
    }
}

struct SchedulerInner {
    checker: ResourceChecker,
    store: SharedStore,
    interval: Duration,
    max_concurrent: usize,
}

/// Drives poll cycles on a fixed cadence or on demand
#[derive(Clone)]
pub struct PollScheduler {
    inner: Arc<SchedulerInner>,
}

impl PollScheduler {
    pub fn new(
        checker: ResourceChecker,
        store: SharedStore,
        interval: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                checker,
                store,
                interval,
                max_concurrent: max_concurrent.max(1),
            }),
        }
    }

    /// Runs one poll cycle over every tracked resource
    ///
    /// Per-resource failures are logged and counted; only a failure to
    /// list subscriptions fails the cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let start = Instant::now();
        let subscriptions = storage::lock(&self.inner.store)?.list_all()?;
        let groups = group_by_resource(subscriptions);

        let mut report = CycleReport {
            resources: groups.len(),
            subscriptions: groups.values().map(|(_, subs)| subs.len()).sum(),
            ..CycleReport::default()
        };

        let permits = Arc::new(Semaphore::new(self.inner.max_concurrent));
        let mut checks = JoinSet::new();

        for (_, (resource, subs)) in groups {
            if !resource.kind().is_trackable() {
                tracing::debug!(url = %resource.url(), "Not scheduling resource of unknown kind");
                report.skipped += 1;
                continue;
            }

            let checker = self.inner.checker.clone();
            let permits = Arc::clone(&permits);
            checks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => checker.check(&resource, &subs).await,
                    Err(e) => Err(TrackerError::Task(e.to_string())),
                };
                (resource, result)
            });
        }

        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => report.record(outcome),
                Ok((resource, Err(e))) => {
                    tracing::warn!(url = %resource.url(), "Check failed, retrying next cycle: {}", e);
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!("Resource check task failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Cycle done in {:?}: {} resources, {} checked, {} empty, {} failed, {} notified",
            start.elapsed(),
            report.resources,
            report.checked,
            report.empty,
            report.failed,
            report.notified
        );

        Ok(report)
    }

    /// Runs cycles on the configured interval until cancelled
    ///
    /// The first cycle starts immediately. A failed cycle is logged and the
    /// loop waits for the next tick.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.inner.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Polling every {:?}", self.inner.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.run_cycle() => {
                    if let Err(e) = result {
                        tracing::error!("Poll cycle failed: {}", e);
                    }
                }
            }
        }

        tracing::info!("Poll loop stopped");
    }

    /// Starts one extra cycle outside the regular cadence
    ///
    /// The cycle runs as its own task; it neither waits for nor disturbs a
    /// scheduled cycle. Aborting the handle cancels it.
    pub fn trigger(&self) -> JoinHandle<Result<CycleReport>> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            tracing::info!("On-demand check started");
            scheduler.run_cycle().await
        })
    }
}

/// Groups subscriptions by resource URL, in URL order
fn group_by_resource(
    subscriptions: Vec<Subscription>,
) -> BTreeMap<String, (Resource, Vec<Subscription>)> {
    let mut groups: BTreeMap<String, (Resource, Vec<Subscription>)> = BTreeMap::new();
    for sub in subscriptions {
        groups
            .entry(sub.resource.key().to_string())
            .or_insert_with(|| (sub.resource.clone(), Vec::new()))
            .1
            .push(sub);
    }
    groups
}
