//! Webhook forwarding end-to-end tests

use std::time::Duration;

use base64::Engine;
use hyper::StatusCode;
use serde_json::{json, Value};

use proxyhook_e2e::{init_test, ClientHandle, MockHttpService, MockRelay};

const WAIT: Duration = Duration::from_secs(5);

fn webhook(headers: Value, body: &str) -> Value {
    json!({
        "type": "WEBHOOK",
        "headers": headers,
        "bufferText": body,
    })
}

#[tokio::test]
async fn test_login_is_first_and_carries_password() -> anyhow::Result<()> {
    init_test();
    std::env::set_var("PROXYHOOK_E2E_LOGIN_PASSWORD", "s3cret");

    let mut relay = MockRelay::start().await;
    let target = MockHttpService::start().await;
    let _client = ClientHandle::spawn(
        &relay.url(),
        &[target.url("/hook")],
        "PROXYHOOK_E2E_LOGIN_PASSWORD",
    )?;

    let mut conn = relay.accept().await?;
    assert_eq!(conn.path, "/listen");

    let first = conn.recv_json().await?;
    assert_eq!(first, json!({"type": "LOGIN", "password": "s3cret"}));
    Ok(())
}

#[tokio::test]
async fn test_unset_password_logs_in_with_empty_string() -> anyhow::Result<()> {
    init_test();
    std::env::remove_var("PROXYHOOK_E2E_UNSET_PASSWORD");

    let mut relay = MockRelay::start().await;
    let target = MockHttpService::start().await;
    let _client = ClientHandle::spawn(
        &relay.url(),
        &[target.url("/")],
        "PROXYHOOK_E2E_UNSET_PASSWORD",
    )?;

    let mut conn = relay.accept().await?;
    assert_eq!(conn.login().await?, "");
    Ok(())
}

#[tokio::test]
async fn test_webhook_fans_out_to_every_target() -> anyhow::Result<()> {
    init_test();

    let mut relay = MockRelay::start().await;
    let first = MockHttpService::start().await;
    let second = MockHttpService::start().await;
    let _client = ClientHandle::spawn(
        &relay.url(),
        &[first.url("/hook-a"), second.url("/hook-b")],
        "PROXYHOOK_E2E_FANOUT",
    )?;

    let mut conn = relay.accept().await?;
    conn.login().await?;
    conn.send_json(webhook(
        json!([
            ["Host", "evil.example"],
            ["X-GitHub-Event", "push"],
            ["Content-Type", "application/json"]
        ]),
        r#"{"ok":true}"#,
    ))
    .await?;

    for (service, path) in [(&first, "/hook-a"), (&second, "/hook-b")] {
        let requests = service.wait_for_requests(1, WAIT).await;
        assert_eq!(requests.len(), 1);

        let request = &requests[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.uri, path);
        assert_eq!(request.header("x-github-event"), Some("push"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body, br#"{"ok":true}"#);

        let host = request.header("host").unwrap_or_default();
        assert_ne!(host, "evil.example");
        assert_eq!(host, service.addr().to_string());
    }
    Ok(())
}

#[tokio::test]
async fn test_header_filtering_ignores_case() -> anyhow::Result<()> {
    init_test();

    let mut relay = MockRelay::start().await;
    let target = MockHttpService::start().await;
    let _client = ClientHandle::spawn(&relay.url(), &[target.url("/")], "PROXYHOOK_E2E_CASE")?;

    let mut conn = relay.accept().await?;
    conn.login().await?;
    conn.send_json(webhook(
        json!([
            ["x-github-event", "issues"],
            ["X-HUB-SIGNATURE", "sha1=abc"],
            ["X-Custom", "dropped"],
            ["Connection", "close-me"],
            ["cookie", ["a=1", "b=2"]],
            ["Accept", "text/plain"],
            ["accept", "application/json"]
        ]),
        "{}",
    ))
    .await?;

    let requests = target.wait_for_requests(1, WAIT).await;
    assert_eq!(requests.len(), 1);

    let request = &requests[0];
    assert_eq!(request.header("X-GitHub-Event"), Some("issues"));
    assert_eq!(request.header("x-hub-signature"), Some("sha1=abc"));
    assert!(!request.has_header("x-custom"));
    assert_ne!(request.header("connection"), Some("close-me"));
    assert_eq!(request.header_values("cookie"), vec!["a=1", "b=2"]);
    assert_eq!(
        request.header_values("accept"),
        vec!["text/plain", "application/json"]
    );
    Ok(())
}

#[tokio::test]
async fn test_base64_body_is_forwarded_as_bytes() -> anyhow::Result<()> {
    init_test();

    let mut relay = MockRelay::start().await;
    let target = MockHttpService::start().await;
    let _client = ClientHandle::spawn(&relay.url(), &[target.url("/")], "PROXYHOOK_E2E_BINARY")?;

    let raw: Vec<u8> = vec![0x00, 0x9f, 0xff, b'h', b'i', 0x80];
    let encoded = base64::engine::general_purpose::STANDARD.encode(&raw);

    let mut conn = relay.accept().await?;
    conn.login().await?;
    conn.send_json(json!({
        "type": "WEBHOOK",
        "headers": [["Content-Type", "application/octet-stream"]],
        "buffer": encoded,
    }))
    .await?;

    let requests = target.wait_for_requests(1, WAIT).await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, raw);
    Ok(())
}

#[tokio::test]
async fn test_webhook_without_body_posts_empty() -> anyhow::Result<()> {
    init_test();

    let mut relay = MockRelay::start().await;
    let target = MockHttpService::start().await;
    let _client = ClientHandle::spawn(&relay.url(), &[target.url("/")], "PROXYHOOK_E2E_EMPTY")?;

    let mut conn = relay.accept().await?;
    conn.login().await?;
    conn.send_json(json!({"type": "WEBHOOK"})).await?;

    let requests = target.wait_for_requests(1, WAIT).await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].body.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_each_webhook_is_forwarded_once_per_target() -> anyhow::Result<()> {
    init_test();

    let mut relay = MockRelay::start().await;
    let first = MockHttpService::start().await;
    let second = MockHttpService::start().await;
    let _client = ClientHandle::spawn(
        &relay.url(),
        &[first.url("/"), second.url("/")],
        "PROXYHOOK_E2E_REPEAT",
    )?;

    let mut conn = relay.accept().await?;
    conn.login().await?;
    for n in 0..3 {
        conn.send_json(webhook(json!([]), &format!("delivery-{}", n)))
            .await?;
    }

    for service in [&first, &second] {
        let requests = service.wait_for_requests(3, WAIT).await;
        let mut bodies: Vec<_> = requests
            .iter()
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect();
        bodies.sort();
        assert_eq!(bodies, vec!["delivery-0", "delivery-1", "delivery-2"]);
    }

    // No duplicates trickle in afterwards
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(first.request_count(), 3);
    assert_eq!(second.request_count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_failing_target_does_not_affect_others() -> anyhow::Result<()> {
    init_test();

    let mut relay = MockRelay::start().await;
    let broken = MockHttpService::start().await;
    broken.set_response_status(StatusCode::INTERNAL_SERVER_ERROR);
    let healthy = MockHttpService::start().await;
    let _client = ClientHandle::spawn(
        &relay.url(),
        &[
            broken.url("/"),
            "http://127.0.0.1:1/unreachable".to_string(),
            healthy.url("/"),
        ],
        "PROXYHOOK_E2E_FAILING",
    )?;

    let mut conn = relay.accept().await?;
    conn.login().await?;
    conn.send_json(webhook(json!([]), "first")).await?;

    assert_eq!(healthy.wait_for_requests(1, WAIT).await.len(), 1);
    assert_eq!(broken.wait_for_requests(1, WAIT).await.len(), 1);

    // The session survives failed deliveries
    conn.send_json(json!({"type": "PING", "pingId": "still-there"}))
        .await?;
    let pong = conn.recv_json().await?;
    assert_eq!(pong, json!({"type": "PONG", "pingId": "still-there"}));

    conn.send_json(webhook(json!([]), "second")).await?;
    let requests = healthy.wait_for_requests(2, WAIT).await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].body, b"second");
    Ok(())
}

#[tokio::test]
async fn test_ping_answered_exactly_once() -> anyhow::Result<()> {
    init_test();

    let mut relay = MockRelay::start().await;
    let target = MockHttpService::start().await;
    let _client = ClientHandle::spawn(&relay.url(), &[target.url("/")], "PROXYHOOK_E2E_PING")?;

    let mut conn = relay.accept().await?;
    conn.login().await?;

    conn.send_json(json!({"type": "PING", "pingId": "abc-123"}))
        .await?;
    let pong = conn.recv_json().await?;
    assert_eq!(pong, json!({"type": "PONG", "pingId": "abc-123"}));
    assert!(conn
        .try_recv_json(Duration::from_millis(300))
        .await?
        .is_none());

    // Non-string ids are echoed as they came
    conn.send_json(json!({"type": "PING", "pingId": 17})).await?;
    let pong = conn.recv_json().await?;
    assert_eq!(pong, json!({"type": "PONG", "pingId": 17}));

    assert_eq!(target.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_pong_from_relay_is_ignored() -> anyhow::Result<()> {
    init_test();

    let mut relay = MockRelay::start().await;
    let target = MockHttpService::start().await;
    let mut client =
        ClientHandle::spawn(&relay.url(), &[target.url("/")], "PROXYHOOK_E2E_PONG")?;

    let mut conn = relay.accept().await?;
    conn.login().await?;
    conn.send_json(json!({"type": "PONG", "pingId": "x"})).await?;

    assert!(conn
        .try_recv_json(Duration::from_millis(300))
        .await?
        .is_none());
    assert!(client.join_within(Duration::from_millis(100)).await.is_none());
    Ok(())
}
