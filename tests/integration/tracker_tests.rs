//! Poll cycles end-to-end against a mock forum

use crate::common::{forum_page, quick_fetcher, resource_on, thread_page, RecordingNotifier};
use forum_tracker::model::{Resource, SubscriberId, Subscription};
use forum_tracker::storage::{self, SharedStore, SqliteStorage, SubscriptionStore};
use forum_tracker::tracker::{PollScheduler, ResourceChecker};
use forum_tracker::url::ResourceKind;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    store: SharedStore,
    notifier: Arc<RecordingNotifier>,
    scheduler: PollScheduler,
}

impl Harness {
    fn new(notifier: RecordingNotifier) -> Self {
        Self::over(storage::shared(SqliteStorage::new_in_memory().unwrap()), notifier)
    }

    fn over(store: SharedStore, notifier: RecordingNotifier) -> Self {
        let notifier = Arc::new(notifier);
        let checker = ResourceChecker::new(quick_fetcher(), Arc::clone(&store), notifier.clone(), 8);
        let scheduler = PollScheduler::new(checker, Arc::clone(&store), Duration::from_millis(50), 4);
        Self {
            store,
            notifier,
            scheduler,
        }
    }

    fn subscribe(&self, subscriber: i64, resource: &Resource) {
        storage::lock(&self.store)
            .unwrap()
            .add_subscription(&Subscription::new(SubscriberId(subscriber), resource.clone()))
            .unwrap();
    }

    fn cursor(&self, subscriber: i64, resource: &Resource) -> Option<String> {
        storage::lock(&self.store)
            .unwrap()
            .get_subscription(SubscriberId(subscriber), resource.key())
            .unwrap()
            .and_then(|sub| sub.cursor)
    }

    fn set_cursor(&self, subscriber: i64, resource: &Resource, cursor: &str) {
        storage::lock(&self.store)
            .unwrap()
            .update_cursor(SubscriberId(subscriber), resource.key(), cursor)
            .unwrap();
    }
}

async fn serve(server: &MockServer, at: &str, body: String) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_thread_baseline_then_new_post() {
    let server = MockServer::start().await;
    let harness = Harness::new(RecordingNotifier::default());
    let thread = resource_on(&server, "/threads/topic.77/", ResourceKind::Thread);
    harness.subscribe(1, &thread);

    // Cycle 1: first look only records the baseline
    serve(&server, "/threads/topic.77/", thread_page(&[101, 102])).await;
    let report = harness.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.baselined, 1);
    assert_eq!(report.notified, 0);
    assert!(harness.notifier.sent().is_empty());
    assert_eq!(harness.cursor(1, &thread).as_deref(), Some("102"));

    // Cycle 2: post 555 appears
    serve(&server, "/threads/topic.77/", thread_page(&[101, 102, 555])).await;
    let report = harness.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.notified, 1);
    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, SubscriberId(1));
    assert!(sent[0].1.contains("body 555"));
    assert!(sent[0].1.contains("user555"));
    assert_eq!(harness.cursor(1, &thread).as_deref(), Some("555"));

    // Cycle 3: nothing changed
    let report = harness.scheduler.run_cycle().await.unwrap();
    assert_eq!(report.notified, 0);
    assert_eq!(harness.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_forum_caught_up_stays_silent() {
    let server = MockServer::start().await;
    let harness = Harness::new(RecordingNotifier::default());
    let forum = resource_on(&server, "/forums/news.5/", ResourceKind::Forum);
    harness.subscribe(1, &forum);

    let ids: Vec<u32> = (1..=10).collect();
    serve(&server, "/forums/news.5/", forum_page(&ids)).await;

    harness.scheduler.run_cycle().await.unwrap();
    assert_eq!(harness.cursor(1, &forum).as_deref(), Some("10"));

    let report = harness.scheduler.run_cycle().await.unwrap();
    assert_eq!(report.notified, 0);
    assert!(harness.notifier.sent().is_empty());

    // Two new topics are announced oldest first
    let ids: Vec<u32> = (1..=12).rev().collect();
    serve(&server, "/forums/news.5/", forum_page(&ids)).await;
    let report = harness.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.notified, 2);
    let sent = harness.notifier.sent();
    assert!(sent[0].1.contains("Topic 11"));
    assert!(sent[1].1.contains("Topic 12"));
    assert_eq!(harness.cursor(1, &forum).as_deref(), Some("12"));
}

#[tokio::test]
async fn test_resource_fetched_once_for_many_subscribers() {
    let server = MockServer::start().await;
    let harness = Harness::new(RecordingNotifier::default());
    let thread = resource_on(&server, "/threads/shared.9/", ResourceKind::Thread);
    for subscriber in 1..=5 {
        harness.subscribe(subscriber, &thread);
    }

    serve(&server, "/threads/shared.9/", thread_page(&[1, 2])).await;
    let report = harness.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.resources, 1);
    assert_eq!(report.subscriptions, 5);
    assert_eq!(report.baselined, 5);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failing_resource_does_not_block_others() {
    let server = MockServer::start().await;
    let harness = Harness::new(RecordingNotifier::default());
    let broken = resource_on(&server, "/threads/broken.1/", ResourceKind::Thread);
    let healthy = resource_on(&server, "/threads/healthy.2/", ResourceKind::Thread);
    harness.subscribe(1, &broken);
    harness.subscribe(1, &healthy);

    Mock::given(method("GET"))
        .and(path("/threads/broken.1/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/threads/healthy.2/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(thread_page(&[7])))
        .mount(&server)
        .await;

    let report = harness.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.checked, 1);
    assert_eq!(harness.cursor(1, &broken), None);
    assert_eq!(harness.cursor(1, &healthy).as_deref(), Some("7"));
}

#[tokio::test]
async fn test_empty_page_changes_nothing() {
    let server = MockServer::start().await;
    let harness = Harness::new(RecordingNotifier::default());
    let thread = resource_on(&server, "/threads/gone.3/", ResourceKind::Thread);
    harness.subscribe(1, &thread);
    harness.set_cursor(1, &thread, "40");

    serve(&server, "/threads/gone.3/", "<html><body>You must log in</body></html>".to_string()).await;
    let report = harness.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.empty, 1);
    assert_eq!(harness.cursor(1, &thread).as_deref(), Some("40"));
}

#[tokio::test]
async fn test_failed_delivery_keeps_cursor() {
    let server = MockServer::start().await;
    let harness = Harness::new(RecordingNotifier::refusing(SubscriberId(2)));
    let thread = resource_on(&server, "/threads/t.4/", ResourceKind::Thread);
    harness.subscribe(1, &thread);
    harness.subscribe(2, &thread);
    harness.set_cursor(1, &thread, "102");
    harness.set_cursor(2, &thread, "102");

    serve(&server, "/threads/t.4/", thread_page(&[102, 555])).await;
    let report = harness.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.notified, 1);
    assert_eq!(report.deferred, 1);
    assert_eq!(harness.cursor(1, &thread).as_deref(), Some("555"));
    assert_eq!(harness.cursor(2, &thread).as_deref(), Some("102"));
}

#[tokio::test]
async fn test_unknown_resources_are_not_fetched() {
    let server = MockServer::start().await;
    let harness = Harness::new(RecordingNotifier::default());
    let odd = resource_on(&server, "/members/someone.1/", ResourceKind::Unknown);
    harness.subscribe(1, &odd);

    let report = harness.scheduler.run_cycle().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_trigger_runs_an_extra_cycle() {
    let server = MockServer::start().await;
    let harness = Harness::new(RecordingNotifier::default());
    let thread = resource_on(&server, "/threads/t.6/", ResourceKind::Thread);
    harness.subscribe(3, &thread);

    serve(&server, "/threads/t.6/", thread_page(&[60])).await;
    let report = harness.scheduler.trigger().await.unwrap().unwrap();

    assert_eq!(report.baselined, 1);
    assert_eq!(harness.cursor(3, &thread).as_deref(), Some("60"));
}

#[tokio::test]
async fn test_run_loop_polls_until_cancelled() {
    let server = MockServer::start().await;
    let harness = Harness::new(RecordingNotifier::default());
    let thread = resource_on(&server, "/threads/t.8/", ResourceKind::Thread);
    harness.subscribe(1, &thread);
    serve(&server, "/threads/t.8/", thread_page(&[80])).await;

    let cancel = CancellationToken::new();
    let scheduler = harness.scheduler.clone();
    let loop_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(220)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), loop_handle)
        .await
        .expect("poll loop did not stop")
        .unwrap();

    assert_eq!(harness.cursor(1, &thread).as_deref(), Some("80"));
    assert!(server.received_requests().await.unwrap().len() >= 2);
}

#[tokio::test]
async fn test_corrupt_row_does_not_stop_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("subs.db");
    let server = MockServer::start().await;
    let thread = resource_on(&server, "/threads/ok.5/", ResourceKind::Thread);

    {
        let mut store = SqliteStorage::new(&db).unwrap();
        store
            .add_subscription(&Subscription::new(SubscriberId(1), thread.clone()))
            .unwrap();
    }
    rusqlite::Connection::open(&db)
        .unwrap()
        .execute(
            "INSERT INTO subscriptions
                (subscriber_id, resource_url, resource_kind, created_at, updated_at)
             VALUES (2, 'https://f.example/boards/x.1/', 'board', 'now', 'now')",
            [],
        )
        .unwrap();

    let harness = Harness::over(
        storage::shared(SqliteStorage::new(&db).unwrap()),
        RecordingNotifier::default(),
    );
    serve(&server, "/threads/ok.5/", thread_page(&[5])).await;

    let report = harness.scheduler.run_cycle().await.unwrap();
    assert_eq!(report.resources, 1);
    assert_eq!(report.baselined, 1);
    assert_eq!(harness.cursor(1, &thread).as_deref(), Some("5"));

    // The next cycle is not blocked either
    assert!(harness.scheduler.run_cycle().await.is_ok());
}
