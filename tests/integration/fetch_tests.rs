//! Credential race and keep-alive against a mock site

use crate::common::{credentials, fetcher, quick_fetcher};
use forum_tracker::tracker::{spawn_keepalive, FetchFailure};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn page_url(server: &MockServer, p: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
}

#[tokio::test]
async fn test_fastest_good_credential_wins() {
    let server = MockServer::start().await;

    for slow in ["slow-a", "slow-b"] {
        Mock::given(method("GET"))
            .and(path("/threads/t.1/"))
            .and(header("cookie", format!("xf_session={}", slow).as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html>slow</html>")
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/threads/t.1/"))
        .and(header("cookie", "xf_session=fast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>fast</html>"))
        .mount(&server)
        .await;

    let fetcher = fetcher(
        &["slow-a", "fast", "slow-b"],
        Duration::from_secs(15),
        Duration::from_secs(30),
    );

    let start = Instant::now();
    let body = fetcher.fetch(&page_url(&server, "/threads/t.1/").await).await.unwrap();

    assert_eq!(body, "<html>fast</html>");
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "race blocked for {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_error_status_loses_to_good_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("cookie", "xf_session=banned"))
        .respond_with(ResponseTemplate::new(403).set_body_string("banned"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("cookie", "xf_session=good"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let fetcher = fetcher(&["banned", "good"], Duration::from_secs(2), Duration::from_secs(5));
    let body = fetcher.fetch(&page_url(&server, "/").await).await.unwrap();
    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn test_all_attempts_fail() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = fetcher(&["a", "b"], Duration::from_secs(2), Duration::from_secs(5));
    let result = fetcher.fetch(&page_url(&server, "/forums/f.2/").await).await;

    match result {
        Err(FetchFailure::AllAttemptsFailed {
            attempts,
            last_error,
            ..
        }) => {
            // One racer per credential set, then one sequential pass
            assert_eq!(attempts, 4);
            assert!(last_error.contains("503"));
        }
        other => panic!("expected AllAttemptsFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_body_is_a_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("   "))
        .mount(&server)
        .await;

    let result = quick_fetcher().fetch(&page_url(&server, "/").await).await;
    match result {
        Err(FetchFailure::AllAttemptsFailed { last_error, .. }) => {
            assert_eq!(last_error, "empty response body")
        }
        other => panic!("expected AllAttemptsFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ceiling_bounds_the_whole_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher(&["a"], Duration::from_secs(20), Duration::from_millis(500));

    let start = Instant::now();
    let result = fetcher.fetch(&page_url(&server, "/").await).await;

    assert!(matches!(result, Err(FetchFailure::CeilingElapsed { .. })));
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_fetch_with_uses_only_that_identity() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("cookie", "xf_session=second"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>second</html>"))
        .mount(&server)
        .await;

    let fetcher = fetcher(&["first", "second"], Duration::from_secs(2), Duration::from_secs(5));
    let url = page_url(&server, "/").await;

    let body = fetcher.fetch_with(&url, &credentials("second")).await.unwrap();
    assert_eq!(body, "<html>second</html>");
    assert!(fetcher.fetch_with(&url, &credentials("first")).await.is_err());
}

#[tokio::test]
async fn test_keepalive_hits_root_until_cancelled() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>home</html>"))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let handle = spawn_keepalive(
        quick_fetcher(),
        page_url(&server, "/").await,
        Duration::from_millis(100),
        cancel.clone(),
    );

    tokio::time::sleep(Duration::from_millis(450)).await;
    cancel.cancel();
    handle.await.unwrap();

    let hits = server.received_requests().await.unwrap().len();
    assert!(hits >= 2, "keep-alive fetched {} times", hits);

    // No more fetches once cancelled
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), hits);
}
