//! Integration tests for the tracker
//!
//! These tests use wiremock to stand in for the forum and drive the
//! fetcher, poll cycles and reply submitter end-to-end.

mod common;
mod fetch_tests;
mod reply_tests;
mod tracker_tests;
