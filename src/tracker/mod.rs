//! Tracker module for polling watched resources
//!
//! This module contains the core watching logic, including:
//! - Credential-racing HTTP fetches
//! - Per-resource diffing and notification
//! - Interval and on-demand poll cycles
//! - Session keep-alive
//! - The facade used by the command layer

mod coordinator;
mod engine;
mod fetcher;
mod keepalive;
mod scheduler;

pub use coordinator::{CredentialStatus, TrackOutcome, Tracker};
pub use engine::{plan, CheckOutcome, DiffPlan, ResourceChecker, SubscriberPlan};
pub use fetcher::{build_http_client, AttemptError, FetchFailure, ResilientFetcher};
pub use keepalive::spawn_keepalive;
pub use scheduler::{CycleReport, PollScheduler};
