//! Reply submission against a mock thread

use crate::common::{fetcher, quick_fetcher, resource_on, RecordingNotifier};
use forum_tracker::config::{parse_config, ReplyConfig};
use forum_tracker::model::{SubscriberId, Subscription};
use forum_tracker::reply::{Encoding, ReplyError, ReplySubmitter, FALLBACK_BODY_FIELDS};
use forum_tracker::storage::{self, SqliteStorage, SubscriptionStore};
use forum_tracker::url::ResourceKind;
use forum_tracker::Tracker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const THREAD_PATH: &str = "/threads/x.1/";
const REPLY_PATH: &str = "/threads/x.1/add-reply";

const REJECTION: &str = r#"{"status":"error","errors":["Please enter a valid message."]}"#;

fn reply_config() -> ReplyConfig {
    ReplyConfig {
        verify_attempts: 3,
        verify_delay_ms: 10,
        snippet_words: 4,
    }
}

fn submitter() -> ReplySubmitter {
    ReplySubmitter::new(quick_fetcher(), &reply_config())
}

fn thread_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}{}", server.uri(), THREAD_PATH)).unwrap()
}

/// Serves the thread; the new post shows up once `posted` is set
struct ThreadPage {
    posted: Arc<AtomicBool>,
}

impl Respond for ThreadPage {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let reply = if self.posted.load(Ordering::SeqCst) {
            r#"<article class="message message--post" data-author="me" data-content="post-556">
                 <div class="bbWrapper">hello world</div></article>"#
        } else {
            ""
        };
        let html = format!(
            r#"<html><body>
                 <article class="message message--post" data-author="op" data-content="post-555">
                   <div class="bbWrapper">first post</div></article>
                 {reply}
                 <form class="js-quickReply" action="{REPLY_PATH}" method="post">
                   <input type="hidden" name="_xfToken" value="tok123">
                   <button type="submit">Post reply</button>
                 </form>
               </body></html>"#
        );
        ResponseTemplate::new(200).set_body_string(html)
    }
}

/// Accepts only submissions whose body contains `accepted`
struct ReplyEndpoint {
    accepted: &'static str,
    posted: Arc<AtomicBool>,
}

impl Respond for ReplyEndpoint {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body);
        if body.contains(self.accepted) && body.contains("tok123") {
            self.posted.store(true, Ordering::SeqCst);
            ResponseTemplate::new(200).set_body_string(r#"{"status":"ok"}"#)
        } else {
            ResponseTemplate::new(200).set_body_string(REJECTION)
        }
    }
}

async fn mount_forum(server: &MockServer, accepted: &'static str) {
    let posted = Arc::new(AtomicBool::new(false));
    Mock::given(method("GET"))
        .and(path(THREAD_PATH))
        .respond_with(ThreadPage {
            posted: Arc::clone(&posted),
        })
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .respond_with(ReplyEndpoint { accepted, posted })
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_reply_found_by_field_cascade() {
    let server = MockServer::start().await;
    mount_forum(&server, "content=hello+world").await;

    let report = submitter()
        .submit(&thread_url(&server), "hello world")
        .await
        .unwrap();

    assert_eq!(report.field, "content");
    assert_eq!(report.encoding, Encoding::UrlEncoded);
    assert_eq!(report.newest_post_id.as_deref(), Some("556"));
}

#[tokio::test]
async fn test_reply_falls_back_to_multipart() {
    let server = MockServer::start().await;
    mount_forum(&server, "name=\"message\"\r\n\r\nhello world").await;

    let report = submitter()
        .submit(&thread_url(&server), "hello world")
        .await
        .unwrap();

    assert_eq!(report.field, "message");
    assert_eq!(report.encoding, Encoding::Multipart);
}

#[tokio::test]
async fn test_accepted_but_never_visible() {
    let server = MockServer::start().await;
    let never = Arc::new(AtomicBool::new(false));
    Mock::given(method("GET"))
        .and(path(THREAD_PATH))
        .respond_with(ThreadPage { posted: never })
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"ok"}"#))
        .mount(&server)
        .await;

    let error = submitter()
        .submit(&thread_url(&server), "hello world")
        .await
        .unwrap_err();

    match error {
        ReplyError::Exhausted { attempts, last_error } => {
            assert_eq!(attempts, 8);
            assert!(last_error.contains("not visible"), "{}", last_error);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_site_rejection_is_reported() {
    let server = MockServer::start().await;
    mount_forum(&server, "never-matches").await;

    let error = submitter()
        .submit(&thread_url(&server), "hello world")
        .await
        .unwrap_err();

    assert!(error.to_string().contains("Please enter a valid message."));
}

#[tokio::test]
async fn test_page_without_form() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(THREAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Locked</body></html>"))
        .mount(&server)
        .await;

    let error = submitter()
        .submit(&thread_url(&server), "hello")
        .await
        .unwrap_err();

    assert!(matches!(error, ReplyError::NoForm { .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreachable_thread() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(THREAD_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let error = submitter()
        .submit(&thread_url(&server), "hello")
        .await
        .unwrap_err();

    assert!(matches!(error, ReplyError::PageUnreachable(_)));
}

#[tokio::test]
async fn test_stalled_reply_endpoint_times_out_each_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(THREAD_PATH))
        .respond_with(ThreadPage {
            posted: Arc::new(AtomicBool::new(false)),
        })
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REPLY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"status":"ok"}"#)
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher(&["main"], Duration::from_millis(200), Duration::from_secs(5));
    let submitter = ReplySubmitter::new(fetcher, &reply_config());

    let error = tokio::time::timeout(
        Duration::from_secs(10),
        submitter.submit(&thread_url(&server), "hello world"),
    )
    .await
    .expect("reply submission hung on a stalled endpoint")
    .unwrap_err();

    match error {
        ReplyError::Exhausted { attempts, last_error } => {
            assert_eq!(attempts, 8);
            assert!(last_error.contains("timed out"), "{}", last_error);
        }
        other => panic!("unexpected error: {}", other),
    }
}

const TRACKER_CONFIG: &str = r#"
[site]
base-url = "https://forum.example.com"

[reply]
verify-attempts = 3
verify-delay-ms = 10

[storage]
database-path = ":memory:"

[[credentials]]
label = "main"
[credentials.tokens]
xf_session = "main"
"#;

#[tokio::test]
async fn test_tracker_reply_advances_cursor() {
    let server = MockServer::start().await;
    mount_forum(&server, "content=hello+world").await;

    let store = storage::shared(SqliteStorage::new_in_memory().unwrap());
    let thread = resource_on(&server, THREAD_PATH, ResourceKind::Thread);
    {
        let mut guard = storage::lock(&store).unwrap();
        guard
            .add_subscription(&Subscription::new(SubscriberId(4), thread.clone()))
            .unwrap();
        guard.update_cursor(SubscriberId(4), thread.key(), "555").unwrap();
    }

    let tracker = Tracker::from_parts(
        parse_config(TRACKER_CONFIG).unwrap(),
        store.clone(),
        Arc::new(RecordingNotifier::default()),
        quick_fetcher(),
    )
    .unwrap();

    let outcome = tracker
        .post_reply_to(SubscriberId(4), &thread, "hello world")
        .await;

    assert!(outcome.ok, "{:?}", outcome.error);
    let cursor = storage::lock(&store)
        .unwrap()
        .get_subscription(SubscriberId(4), thread.key())
        .unwrap()
        .and_then(|sub| sub.cursor);
    assert_eq!(cursor.as_deref(), Some("556"));
}

#[tokio::test]
async fn test_inspect_form_posts_nothing() {
    let server = MockServer::start().await;
    mount_forum(&server, "content=hello+world").await;

    let form = submitter().inspect(&thread_url(&server)).await.unwrap();

    assert!(form.action.as_str().ends_with(REPLY_PATH));
    assert_eq!(form.csrf_token(), Some("tok123"));
    assert_eq!(form.body_fields, FALLBACK_BODY_FIELDS.to_vec());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), THREAD_PATH);
}
