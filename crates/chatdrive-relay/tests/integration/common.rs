//! Shared test helpers for relay integration tests.
//!
//! Provides wiremock-based mock server setup for the relay REST endpoints
//! and returns a configured channel pointing at the mock server.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatdrive_core::domain::ContainerId;
use chatdrive_relay::{RelayChannel, RelayClient};

/// Container used by the tests, doubling as the metadata channel.
pub const CONTAINER: &str = "880042";

pub fn container() -> ContainerId {
    ContainerId::new(CONTAINER).unwrap()
}

/// Start a mock relay and a channel adapter pointing at it.
pub async fn setup_channel() -> (MockServer, RelayChannel) {
    let server = MockServer::start().await;
    let client = RelayClient::with_base_url("test-bot-token", server.uri());
    let channel = RelayChannel::new(client, container());
    (server, channel)
}

/// Mount the message-creation endpoint returning `id` and an attachment URL
/// served by the same mock server.
pub async fn mount_send(server: &MockServer, id: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/channels/{CONTAINER}/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": id,
            "attachmentUrl": format!("{}/cdn/{id}", server.uri()),
        })))
        .mount(server)
        .await;
}

/// Mount the attachment-URL resolution endpoint for one message.
pub async fn mount_attachment_url(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/channels/{CONTAINER}/messages/{id}/attachment"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "url": format!("{}/cdn/{id}", server.uri()),
        })))
        .mount(server)
        .await;
}

/// Mount the storage-host download endpoint for one attachment.
pub async fn mount_download(server: &MockServer, id: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/cdn/{id}")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/octet-stream")
                .set_body_bytes(content.to_vec()),
        )
        .mount(server)
        .await;
}
