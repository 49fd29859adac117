// ABOUTME: Trigger source tests: branch polling and the webhook listener over real HTTP.
// ABOUTME: The webhook is driven with a hyper client against an ephemeral port.

mod support;

use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use shipyard::trigger::{
    BranchPoller, MAX_PAYLOAD_BYTES, Routes, Trigger, TriggerCursor, WebhookListener, merge,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use support::{DirSource, env, rev};
use tokio::net::TcpStream;

async fn send(addr: SocketAddr, method: Method, path: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(conn);

    let request = Request::builder()
        .method(method)
        .uri(path)
        .header(hyper::header::HOST, addr.to_string())
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();
    let response = sender.send_request(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn main_routes() -> Routes {
    let mut routes = Routes::new();
    routes.insert("main".to_string(), vec![env("staging"), env("prod")]);
    routes
}

#[tokio::test]
async fn poller_reports_only_moved_heads() {
    let source = DirSource::new();
    let a = source.commit("aaa111");
    let b = source.commit("bbb222");
    source.set_head("main", &a);
    source.set_head("release", &a);

    let mut poller = BranchPoller::new(source.clone(), Duration::from_secs(60))
        .watch(env("staging"), "main")
        .watch(env("prod"), "release")
        .with_last_known(HashMap::from([(env("prod"), a.clone())]));

    // prod already handled `a`; staging has never seen anything.
    assert_eq!(poller.poll_once().await, vec![Trigger::new(env("staging"), a.clone())]);
    assert!(poller.poll_once().await.is_empty());

    source.set_head("release", &b);
    assert_eq!(poller.poll_once().await, vec![Trigger::new(env("prod"), b)]);
}

#[tokio::test]
async fn poller_skips_unresolvable_branches() {
    let source = DirSource::new();
    let a = source.commit("aaa111");
    source.set_head("main", &a);

    let mut poller = BranchPoller::new(source.clone(), Duration::from_secs(60))
        .watch(env("staging"), "does-not-exist")
        .watch(env("prod"), "main");

    assert_eq!(poller.poll_once().await, vec![Trigger::new(env("prod"), a)]);
}

#[tokio::test(start_paused = true)]
async fn poller_stream_polls_on_an_interval() {
    let source = DirSource::new();
    let a = source.commit("aaa111");
    let b = source.commit("bbb222");
    source.set_head("main", &a);

    let mut stream = Box::pin(
        BranchPoller::new(source.clone(), Duration::from_secs(30))
            .watch(env("prod"), "main")
            .into_stream(),
    );

    assert_eq!(stream.next().await, Some(Trigger::new(env("prod"), a)));

    source.set_head("main", &b);
    let next = tokio::time::timeout(Duration::from_secs(31), stream.next()).await.unwrap();
    assert_eq!(next, Some(Trigger::new(env("prod"), b)));
}

#[tokio::test]
async fn webhook_fans_out_to_tracking_environments() {
    support::init_tracing();
    let (listener, stream) = WebhookListener::bind("127.0.0.1:0".parse().unwrap(), main_routes())
        .await
        .unwrap();
    let addr = listener.local_addr();

    let (status, body) = send(
        addr,
        Method::POST,
        "/hook",
        r#"{"revision": "abc123", "branch": "main", "metadata": {"pusher": "ci"}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], 2);

    let triggers: Vec<_> = stream.take(2).collect().await;
    assert_eq!(
        triggers,
        vec![
            Trigger::new(env("staging"), rev("abc123")),
            Trigger::new(env("prod"), rev("abc123")),
        ]
    );
}

#[tokio::test]
async fn webhook_rejects_bad_requests() {
    let (listener, _stream) = WebhookListener::bind("127.0.0.1:0".parse().unwrap(), main_routes())
        .await
        .unwrap();
    let addr = listener.local_addr();

    let (status, body) = send(addr, Method::POST, "/hook", "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid payload"));

    // Revisions become git arguments, so option-like ones are refused.
    let (status, body) = send(
        addr,
        Method::POST,
        "/hook",
        r#"{"revision": "--output=/tmp/shipyard-overwritten.tar", "branch": "main"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("cannot start with '-'"));

    let (status, _) = send(addr, Method::POST, "/elsewhere", "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(addr, Method::GET, "/hook", "").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    // Untracked branches are acknowledged with nothing to do.
    let (status, body) = send(
        addr,
        Method::POST,
        "/hook",
        r#"{"revision": "abc123", "branch": "feature"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], 0);
}

#[tokio::test]
async fn webhook_refuses_oversized_payloads() {
    let (listener, _stream) = WebhookListener::bind("127.0.0.1:0".parse().unwrap(), main_routes())
        .await
        .unwrap();

    let oversized = "x".repeat(MAX_PAYLOAD_BYTES + 1);
    let (status, body) = send(listener.local_addr(), Method::POST, "/hook", &oversized).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].as_str().unwrap().contains("exceeds"));
}

#[tokio::test]
async fn merged_sources_drop_the_same_revision_twice() {
    let (listener, hook) = WebhookListener::bind("127.0.0.1:0".parse().unwrap(), main_routes())
        .await
        .unwrap();

    let source = DirSource::new();
    let a = source.commit("abc123");
    source.set_head("main", &a);
    let poll = BranchPoller::new(source.clone(), Duration::from_secs(3600))
        .watch(env("prod"), "main")
        .into_stream();

    let mut merged = merge(vec![poll.boxed(), hook.boxed()]);
    assert_eq!(merged.next().await, Some(Trigger::new(env("prod"), a.clone())));

    // The webhook reports the same head for prod; only staging is new.
    let payload = r#"{"revision": "abc123", "branch": "main"}"#;
    send(listener.local_addr(), Method::POST, "/hook", payload).await;
    assert_eq!(merged.next().await, Some(Trigger::new(env("staging"), a)));

    let quiet = tokio::time::timeout(Duration::from_millis(100), merged.next()).await;
    assert!(quiet.is_err(), "prod trigger should have been dropped");
}

#[test]
fn cursor_survives_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("triggers.json");

    let mut cursor = TriggerCursor::load(&path).unwrap();
    assert!(cursor.get(&env("prod")).is_none());
    cursor.record(&env("prod"), &rev("abc123")).unwrap();

    let reloaded = TriggerCursor::load(&path).unwrap();
    assert_eq!(reloaded.get(&env("prod")), Some(&rev("abc123")));
    assert_eq!(reloaded.revisions().len(), 1);
}
