//! Throttle handling: 429 responses and the proactive token bucket.

use std::sync::Arc;

use bytes::Bytes;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use chatdrive_core::domain::ContainerId;
use chatdrive_core::ports::chunk_channel::{ChannelError, RemoteChunkChannel};
use chatdrive_relay::{RelayChannel, RelayClient, TokenBucket};

use crate::common::{container, setup_channel, CONTAINER};

#[tokio::test]
async fn throttled_request_is_retried_after_the_server_delay() {
    let (server, channel) = setup_channel().await;

    // First attempt throttled, second succeeds.
    Mock::given(method("POST"))
        .and(path(format!("/channels/{CONTAINER}/messages")))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "0"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/channels/{CONTAINER}/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msg-after-429",
            "attachmentUrl": format!("{}/cdn/msg-after-429", server.uri()),
        })))
        .mount(&server)
        .await;

    let stored = channel
        .send_object(&container(), Bytes::from_static(b"x"), "f.0")
        .await
        .unwrap();
    assert_eq!(stored.id.as_str(), "msg-after-429");
}

#[tokio::test]
async fn persistent_throttling_eventually_fails() {
    let (server, channel) = setup_channel().await;

    Mock::given(method("POST"))
        .and(path(format!("/channels/{CONTAINER}/messages")))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "0"),
        )
        .mount(&server)
        .await;

    let err = channel
        .send_object(&container(), Bytes::from_static(b"x"), "f.0")
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::Transport(_)));
}

#[tokio::test]
async fn token_bucket_spaces_out_requests() {
    let server = wiremock::MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    // Burst of 1, 50 requests/second: the second call must wait ~20ms.
    let client = RelayClient::with_base_url("tok", server.uri())
        .with_rate_limiter(Arc::new(TokenBucket::new(1, 50.0)));
    let channel = RelayChannel::new(client, ContainerId::new(CONTAINER).unwrap());

    let start = std::time::Instant::now();
    for i in 0..3 {
        channel
            .delete_object(
                &container(),
                &chatdrive_core::domain::ObjectId::new(format!("msg-{i}")).unwrap(),
            )
            .await
            .unwrap();
    }
    // Two refill waits of ~20ms each.
    assert!(start.elapsed() >= std::time::Duration::from_millis(20));
}
