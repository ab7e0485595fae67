//! Object lifecycle through the relay: send, resolve, fetch, delete.

use bytes::Bytes;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use chatdrive_core::domain::ObjectId;
use chatdrive_core::ports::chunk_channel::{ChannelError, DeleteOutcome, RemoteChunkChannel};

use crate::common::{container, mount_attachment_url, mount_download, mount_send, setup_channel, CONTAINER};

#[tokio::test]
async fn send_object_posts_payload_with_name_hint() {
    let (server, channel) = setup_channel().await;

    Mock::given(method("POST"))
        .and(path(format!("/channels/{CONTAINER}/messages")))
        .and(header("X-Attachment-Name", "report.pdf.0"))
        .and(header("Content-Type", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msg-001",
            "attachmentUrl": format!("{}/cdn/msg-001", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let stored = channel
        .send_object(&container(), Bytes::from_static(b"chunk-bytes"), "report.pdf.0")
        .await
        .unwrap();

    assert_eq!(stored.id.as_str(), "msg-001");
    assert!(stored.download_url.ends_with("/cdn/msg-001"));
}

#[tokio::test]
async fn send_object_surfaces_server_errors() {
    let (server, channel) = setup_channel().await;

    Mock::given(method("POST"))
        .and(path(format!("/channels/{CONTAINER}/messages")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = channel
        .send_object(&container(), Bytes::from_static(b"x"), "f.0")
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::Transport(_)));
}

#[tokio::test]
async fn fetch_object_url_resolves_fresh_link() {
    let (server, channel) = setup_channel().await;
    mount_attachment_url(&server, "msg-7").await;

    let url = channel
        .fetch_object_url(&container(), &ObjectId::new("msg-7").unwrap())
        .await
        .unwrap();
    assert_eq!(url, format!("{}/cdn/msg-7", server.uri()));
}

#[tokio::test]
async fn fetch_object_url_maps_404_to_not_found() {
    let (server, channel) = setup_channel().await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/channels/{CONTAINER}/messages/gone/attachment"
        )))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = channel
        .fetch_object_url(&container(), &ObjectId::new("gone").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::NotFound(_)));
}

#[tokio::test]
async fn fetch_object_streams_attachment_bytes() {
    let (server, channel) = setup_channel().await;
    let content: Vec<u8> = (0..100_000u32).map(|i| (i % 256) as u8).collect();
    mount_download(&server, "msg-9", &content).await;

    let mut rx = channel
        .fetch_object(&format!("{}/cdn/msg-9", server.uri()))
        .await
        .unwrap();

    let mut out = Vec::new();
    while let Some(piece) = rx.recv().await {
        out.extend_from_slice(&piece.unwrap());
    }
    assert_eq!(out, content);
}

#[tokio::test]
async fn fetch_object_maps_404_to_not_found() {
    let (server, channel) = setup_channel().await;

    Mock::given(method("GET"))
        .and(path("/cdn/expired"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = channel
        .fetch_object(&format!("{}/cdn/expired", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::NotFound(_)));
}

#[tokio::test]
async fn delete_object_reports_deleted_and_not_found() {
    let (server, channel) = setup_channel().await;

    Mock::given(method("DELETE"))
        .and(path(format!("/channels/{CONTAINER}/messages/msg-1")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/channels/{CONTAINER}/messages/msg-2")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert_eq!(
        channel
            .delete_object(&container(), &ObjectId::new("msg-1").unwrap())
            .await
            .unwrap(),
        DeleteOutcome::Deleted
    );
    // Already-deleted counts as success.
    assert_eq!(
        channel
            .delete_object(&container(), &ObjectId::new("msg-2").unwrap())
            .await
            .unwrap(),
        DeleteOutcome::NotFound
    );
}

#[tokio::test]
async fn send_then_fetch_round_trip() {
    let (server, channel) = setup_channel().await;
    mount_send(&server, "msg-rt").await;
    mount_attachment_url(&server, "msg-rt").await;
    mount_download(&server, "msg-rt", b"round trip payload").await;

    let stored = channel
        .send_object(&container(), Bytes::from_static(b"round trip payload"), "f.0")
        .await
        .unwrap();
    let url = channel
        .fetch_object_url(&container(), &stored.id)
        .await
        .unwrap();
    let mut rx = channel.fetch_object(&url).await.unwrap();

    let mut out = Vec::new();
    while let Some(piece) = rx.recv().await {
        out.extend_from_slice(&piece.unwrap());
    }
    assert_eq!(out, b"round trip payload");
}
