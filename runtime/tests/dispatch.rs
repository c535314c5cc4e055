//! Integration tests for dispatch delivery
//!
//! Exercises pipes end to end against the contract-based mock backend:
//! lifecycle events, failure classification, laziness, concurrent
//! independence, cancellation, observers and interceptors.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use actionpipe_core::{ActionError, ActionState, ErrorKind, HttpAction, RequestSpec};
use actionpipe_runtime::{ActionClient, ActionStreamExt, ClientConfig, LoggingInterceptor};
use actionpipe_testing::{
    InterceptorCall, MockHttpClient, MockResponse, RecordingInterceptor, any_request, header_is,
    init_test_tracing, path_is, query_is,
};
use futures::StreamExt;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct User {
    login: String,
}

#[derive(Debug, Clone)]
struct UsersAction {
    since: i64,
}

impl HttpAction for UsersAction {
    type Response = Vec<User>;

    fn request(&self) -> RequestSpec {
        RequestSpec::get("/users").query("since", self.since)
    }

    fn validate(&self) -> Result<(), ActionError> {
        if self.since < 0 {
            return Err(ActionError::validation("since must be non-negative"));
        }
        Ok(())
    }
}

/// A GET carrying a body, rejected before any I/O
#[derive(Debug, Clone)]
struct BrokenAction;

impl HttpAction for BrokenAction {
    type Response = ();

    fn request(&self) -> RequestSpec {
        RequestSpec::get("/users/{login}").json(&serde_json::json!({"x": 1}))
    }
}

fn users_json(logins: &[&str]) -> MockResponse {
    let users: Vec<_> = logins
        .iter()
        .map(|login| serde_json::json!({ "login": login }))
        .collect();
    MockResponse::json(&users)
}

fn client_with(mock: &MockHttpClient) -> ActionClient {
    ActionClient::builder()
        .base_url("https://api.github.com")
        .shared_http_client(Arc::new(mock.clone()))
        .build()
        .unwrap()
}

fn terminal_count<A: HttpAction>(events: &[ActionState<A>]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_success_yields_started_then_one_succeeded() {
    let mock = MockHttpClient::builder()
        .bind(users_json(&["alice", "bob"]), path_is("/users"))
        .latency(Duration::from_millis(20))
        .build();
    let client = client_with(&mock);

    let events: Vec<_> = client
        .pipe::<UsersAction>()
        .dispatch(UsersAction { since: 0 })
        .collect()
        .await;

    assert_eq!(events.len(), 2, "{events:?}");
    assert!(matches!(events[0], ActionState::Started { .. }));
    assert!(events[1].is_success());
    assert_eq!(events[0].id(), events[1].id());
    assert_eq!(events[1].response().unwrap().body.len(), 2);
    assert_eq!(mock.request_count(), 1);
    assert_eq!(mock.requests()[0].query_param("since").as_deref(), Some("0"));
}

#[tokio::test]
async fn test_upstream_failure_yields_one_failed() {
    let mock = MockHttpClient::builder()
        .bind(
            MockResponse::new(403).body("API rate limit exceeded"),
            any_request(),
        )
        .build();
    let client = client_with(&mock);

    let events: Vec<_> = client
        .pipe::<UsersAction>()
        .dispatch(UsersAction { since: 0 })
        .collect()
        .await;

    assert_eq!(terminal_count(&events), 1);
    assert!(events.iter().all(|e| !e.is_success()));
    match events.last().unwrap().error() {
        Some(ActionError::Upstream {
            status,
            reason,
            body,
        }) => {
            assert_eq!(*status, 403);
            assert_eq!(reason, "Forbidden");
            assert_eq!(body, "API rate limit exceeded");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wrong_shape_is_deserialization_failure() {
    let mock = MockHttpClient::builder()
        .bind(
            MockResponse::json(&serde_json::json!({"message": "not a list"})),
            any_request(),
        )
        .build();

    let error = client_with(&mock)
        .pipe::<UsersAction>()
        .execute(UsersAction { since: 0 })
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Deserialization);
    assert_eq!(error.status(), Some(200));
}

#[tokio::test]
async fn test_transport_failures() {
    let mock = MockHttpClient::builder()
        .fail(query_is("since", "1"), "connection reset by peer")
        .time_out(query_is("since", "2"))
        .build();
    let users = client_with(&mock).pipe::<UsersAction>();

    let error = users.execute(UsersAction { since: 1 }).await.unwrap_err();
    assert_eq!(error, ActionError::Transport("connection reset by peer".into()));

    let error = users.execute(UsersAction { since: 2 }).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Transport);

    // No contract for since=3.
    let error = users.execute(UsersAction { since: 3 }).await.unwrap_err();
    assert!(error.to_string().contains("no contract for GET"), "{error}");
}

#[tokio::test]
async fn test_validation_failure_never_reaches_backend() {
    let mock = MockHttpClient::builder()
        .bind(users_json(&[]), any_request())
        .build();
    let client = client_with(&mock);

    let events: Vec<_> = client
        .pipe::<UsersAction>()
        .dispatch(UsersAction { since: -1 })
        .collect()
        .await;
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].error().map(ActionError::kind),
        Some(ErrorKind::Validation)
    );

    let events: Vec<_> = client.pipe::<BrokenAction>().dispatch(BrokenAction).collect().await;
    assert_eq!(events.len(), 1);
    let message = events[0].error().unwrap().to_string();
    assert!(message.contains("login"), "{message}");
    assert!(message.contains("body"), "{message}");

    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn test_dispatch_is_lazy_and_restartable() {
    let mock = MockHttpClient::builder()
        .bind(users_json(&["alice"]), any_request())
        .build();
    let users = client_with(&mock).pipe::<UsersAction>();

    let stream = users.dispatch(UsersAction { since: 0 });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(mock.request_count(), 0);

    let first = stream.terminal().await.unwrap();
    let second = users
        .dispatch(UsersAction { since: 0 })
        .terminal()
        .await
        .unwrap();

    assert!(first.is_success() && second.is_success());
    assert_ne!(first.id(), second.id());
    assert_eq!(mock.request_count(), 2);
}

#[tokio::test]
async fn test_pipe_reusable_after_failure() {
    let mock = MockHttpClient::builder()
        .bind(MockResponse::new(500), query_is("since", "1"))
        .bind(users_json(&["carol"]), any_request())
        .build();
    let users = client_with(&mock).pipe::<UsersAction>();

    assert!(users.execute(UsersAction { since: -5 }).await.is_err());
    assert!(users.execute(UsersAction { since: 1 }).await.is_err());
    let response = users.execute(UsersAction { since: 2 }).await.unwrap();
    assert_eq!(response.body[0].login, "carol");
}

#[tokio::test]
async fn test_default_headers_are_sent() {
    let mock = MockHttpClient::builder()
        .bind(
            users_json(&[]),
            header_is("accept", "application/vnd.github+json"),
        )
        .build();
    let client = ActionClient::builder()
        .base_url("https://api.github.com")
        .shared_http_client(Arc::new(mock.clone()))
        .config(ClientConfig::default().with_default_header("Accept", "application/vnd.github+json"))
        .build()
        .unwrap();

    assert!(client
        .pipe::<UsersAction>()
        .execute(UsersAction { since: 0 })
        .await
        .is_ok());
}

// ============================================================================
// Independence
// ============================================================================

#[tokio::test]
async fn test_concurrent_dispatches_are_independent() {
    let mut builder = MockHttpClient::builder().latency(Duration::from_millis(30));
    for since in 0..8 {
        let login = format!("user{since}");
        builder = builder.bind(
            users_json(&[login.as_str()]),
            query_is("since", since.to_string()),
        );
    }
    let mock = builder.build();
    let users = client_with(&mock).pipe::<UsersAction>();

    let runs = (0..8).map(|since| users.dispatch(UsersAction { since }).collect::<Vec<_>>());
    let results = join_all(runs).await;

    let mut ids = HashSet::new();
    for (since, events) in results.iter().enumerate() {
        assert_eq!(terminal_count(events), 1);
        let id = events[0].id();
        assert!(events.iter().all(|e| e.id() == id));
        assert!(ids.insert(id));

        let terminal = events.last().unwrap();
        assert_eq!(terminal.action().since, i64::try_from(since).unwrap());
        assert_eq!(terminal.response().unwrap().body[0].login, format!("user{since}"));
    }
    assert_eq!(mock.request_count(), 8);
    assert!(mock.peak_in_flight() > 1);
}

#[tokio::test]
async fn test_same_descriptor_sent_twice_concurrently() {
    let mock = MockHttpClient::builder()
        .bind(users_json(&["alice"]), query_is("since", "0"))
        .latency(Duration::from_millis(30))
        .build();
    let users = client_with(&mock).pipe::<UsersAction>();

    let action = Arc::new(UsersAction { since: 0 });
    let first = users.send_shared(Arc::clone(&action));
    let second = users.send_shared(Arc::clone(&action));
    assert_ne!(first.id(), second.id());

    let (first_events, second_events): (Vec<_>, Vec<_>) =
        futures::join!(first.subscribe().collect(), second.subscribe().collect());

    for (handle, events) in [(&first, &first_events), (&second, &second_events)] {
        assert_eq!(terminal_count(events), 1);
        assert!(events.iter().all(|e| e.id() == handle.id()));
        assert!(Arc::ptr_eq(events.last().unwrap().action(), &action));
        assert!(events.last().unwrap().is_success());
    }
    assert_eq!(mock.request_count(), 2);
    assert_eq!(mock.peak_in_flight(), 2);
}

#[tokio::test]
async fn test_dropped_subscriber_does_not_affect_others() {
    let mock = MockHttpClient::builder()
        .bind(users_json(&["alice"]), any_request())
        .latency(Duration::from_millis(30))
        .build();
    let users = client_with(&mock).pipe::<UsersAction>();

    let handle = users.send(UsersAction { since: 0 });
    let mut early = handle.subscribe();
    let patient = handle.subscribe();

    let first = early.next().await.unwrap();
    assert!(matches!(first, ActionState::Started { .. }));
    drop(early);

    let events: Vec<_> = patient.collect().await;
    assert_eq!(terminal_count(&events), 1);
    assert!(events.last().unwrap().is_success());
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn test_late_subscriber_sees_only_terminal() {
    let mock = MockHttpClient::builder()
        .bind(users_json(&["alice"]), any_request())
        .build();
    let users = client_with(&mock).pipe::<UsersAction>();

    let handle = users.send(UsersAction { since: 0 });
    let terminal = handle.wait().await;
    assert!(handle.is_finished());

    let events: Vec<_> = handle.subscribe().collect().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id(), terminal.id());
    assert!(events[0].is_success());
    assert!(handle.state().unwrap().is_success());
}

// ============================================================================
// Observers
// ============================================================================

#[tokio::test]
async fn test_observe_all_sees_every_pipe_instance() {
    let mock = MockHttpClient::builder()
        .bind(users_json(&["alice"]), any_request())
        .build();
    let client = client_with(&mock);

    let observer = client.pipe::<UsersAction>().observe_all();
    let first = client.pipe::<UsersAction>();
    let second = client.clone().pipe::<UsersAction>();

    first.execute(UsersAction { since: 0 }).await.unwrap();
    second.execute(UsersAction { since: 1 }).await.unwrap();
    let _ = second.execute(UsersAction { since: -1 }).await;

    let terminals: Vec<_> = observer
        .filter(|e| futures::future::ready(e.is_terminal()))
        .take(3)
        .collect()
        .await;
    let sinces: Vec<_> = terminals.iter().map(|e| e.action().since).collect();
    assert_eq!(sinces, vec![0, 1, -1]);
    assert!(terminals[2].error().is_some());
}

#[tokio::test]
async fn test_observe_success_skips_failures() {
    let mock = MockHttpClient::builder()
        .bind(MockResponse::new(404), query_is("since", "1"))
        .bind(users_json(&["bob"]), any_request())
        .build();
    let users = client_with(&mock).pipe::<UsersAction>();
    let mut successes = users.observe_success();

    let _ = users.execute(UsersAction { since: 1 }).await;
    users.execute(UsersAction { since: 2 }).await.unwrap();

    let (action, response) = tokio::time::timeout(Duration::from_secs(1), successes.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(action.since, 2);
    assert_eq!(response.body[0].login, "bob");
}

#[tokio::test]
async fn test_observers_of_other_types_see_nothing() {
    let mock = MockHttpClient::builder()
        .bind(users_json(&[]), any_request())
        .build();
    let client = client_with(&mock);

    let mut broken = client.pipe::<BrokenAction>().observe_all();
    client
        .pipe::<UsersAction>()
        .execute(UsersAction { since: 0 })
        .await
        .unwrap();

    let next = tokio::time::timeout(Duration::from_millis(50), broken.next()).await;
    assert!(next.is_err(), "unexpected event {next:?}");
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_in_flight_dispatch() {
    let mock = MockHttpClient::builder()
        .bind(users_json(&["alice"]), any_request())
        .latency(Duration::from_secs(5))
        .build();
    let recorder = RecordingInterceptor::new();
    let client = ActionClient::builder()
        .base_url("https://api.github.com")
        .shared_http_client(Arc::new(mock.clone()))
        .interceptor(recorder.clone())
        .build()
        .unwrap();
    let users = client.pipe::<UsersAction>();
    let observer = users.observe_all();

    let handle = users.send(UsersAction { since: 0 });
    let mut events = handle.subscribe();
    assert!(matches!(events.next().await, Some(ActionState::Started { .. })));
    tokio::task::yield_now().await;
    assert_eq!(mock.request_count(), 1);

    assert!(handle.cancel());
    let terminal = events.next().await.unwrap();
    assert_eq!(terminal.error(), Some(&ActionError::Cancelled));
    assert!(events.next().await.is_none());

    assert!(!handle.cancel());
    assert_eq!(handle.result().await.unwrap_err().kind(), ErrorKind::Cancelled);
    assert_eq!(recorder.hooks_for(handle.id()), vec!["send", "start", "cancel"]);

    let seen: Vec<_> = observer.take(2).collect().await;
    assert!(matches!(seen[0], ActionState::Started { .. }));
    assert_eq!(seen[1].error(), Some(&ActionError::Cancelled));
}

#[tokio::test]
async fn test_cancel_before_start_never_reaches_backend() {
    let mock = MockHttpClient::builder()
        .bind(users_json(&["alice"]), any_request())
        .build();
    let users = client_with(&mock).pipe::<UsersAction>();

    // Current-thread runtime: the dispatch task has not been polled yet.
    let handle = users.send(UsersAction { since: 0 });
    assert!(handle.cancel());

    let events: Vec<_> = handle.subscribe().collect().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error(), Some(&ActionError::Cancelled));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(mock.request_count(), 0);
    assert!(users.execute(UsersAction { since: 0 }).await.is_ok());
}

#[tokio::test]
async fn test_cancel_after_completion_is_a_no_op() {
    let mock = MockHttpClient::builder()
        .bind(users_json(&["alice"]), any_request())
        .build();
    let users = client_with(&mock).pipe::<UsersAction>();

    let finished = users.send(UsersAction { since: 0 });
    assert!(finished.wait().await.is_success());
    assert!(!finished.cancel());
    assert!(finished.state().unwrap().is_success());

    let invalid = users.send(UsersAction { since: -1 });
    assert!(!invalid.cancel());
    assert_eq!(invalid.result().await.unwrap_err().kind(), ErrorKind::Validation);
}

// ============================================================================
// Interceptors
// ============================================================================

#[tokio::test]
async fn test_interceptors_see_hooks_in_order() {
    init_test_tracing();
    let mock = MockHttpClient::builder()
        .bind(users_json(&["alice"]), query_is("since", "0"))
        .bind(MockResponse::new(502), any_request())
        .build();
    let recorder = RecordingInterceptor::new();
    let client = ActionClient::builder()
        .base_url("https://api.github.com")
        .shared_http_client(Arc::new(mock.clone()))
        .interceptor(LoggingInterceptor::new().verbose())
        .interceptor(recorder.clone())
        .build()
        .unwrap();
    let users = client.pipe::<UsersAction>();

    let ok = users.send(UsersAction { since: 0 });
    ok.wait().await;
    assert_eq!(recorder.hooks_for(ok.id()), vec!["send", "start", "success"]);

    let upstream = users.send(UsersAction { since: 9 });
    upstream.wait().await;
    assert_eq!(recorder.hooks_for(upstream.id()), vec!["send", "start", "fail"]);

    let invalid = users.send(UsersAction { since: -1 });
    invalid.wait().await;
    assert_eq!(recorder.hooks_for(invalid.id()), vec!["send", "fail"]);

    let calls = recorder.calls();
    assert!(calls.contains(&InterceptorCall::Send {
        id: invalid.id(),
        action_type: "UsersAction",
        rendered: false,
    }));
    assert!(calls.contains(&InterceptorCall::Fail {
        id: upstream.id(),
        kind: ErrorKind::Upstream,
    }));
}
