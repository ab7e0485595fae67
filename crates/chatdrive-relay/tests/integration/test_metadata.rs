//! Metadata document storage through the relay.

use bytes::Bytes;
use wiremock::matchers::{body_bytes, method, path};
use wiremock::{Mock, ResponseTemplate};

use chatdrive_core::ports::chunk_channel::{ChannelError, RemoteChunkChannel};

use crate::common::{setup_channel, CONTAINER};

#[tokio::test]
async fn load_metadata_absent_yields_none() {
    let (server, channel) = setup_channel().await;

    Mock::given(method("GET"))
        .and(path(format!("/channels/{CONTAINER}/metadata")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(channel.load_metadata().await.unwrap().is_none());
}

#[tokio::test]
async fn load_metadata_returns_document_bytes() {
    let (server, channel) = setup_channel().await;
    let document = br#"{"version":1,"root":{"name":"","created":"2026-01-01T00:00:00Z","children":[]}}"#;

    Mock::given(method("GET"))
        .and(path(format!("/channels/{CONTAINER}/metadata")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(document.to_vec()))
        .mount(&server)
        .await;

    let loaded = channel.load_metadata().await.unwrap().unwrap();
    assert_eq!(loaded, Bytes::from_static(document));
}

#[tokio::test]
async fn ambiguous_metadata_location_is_an_error() {
    let (server, channel) = setup_channel().await;

    Mock::given(method("GET"))
        .and(path(format!("/channels/{CONTAINER}/metadata")))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let err = channel.load_metadata().await.unwrap_err();
    match err {
        ChannelError::Transport(reason) => assert!(reason.contains("multiple")),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn store_metadata_puts_document_in_place() {
    let (server, channel) = setup_channel().await;
    let document = b"{\"version\":1}".to_vec();

    Mock::given(method("PUT"))
        .and(path(format!("/channels/{CONTAINER}/metadata")))
        .and(body_bytes(document.clone()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    channel
        .store_metadata(Bytes::from(document))
        .await
        .unwrap();
}

#[tokio::test]
async fn store_metadata_surfaces_failures() {
    let (server, channel) = setup_channel().await;

    Mock::given(method("PUT"))
        .and(path(format!("/channels/{CONTAINER}/metadata")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(matches!(
        channel.store_metadata(Bytes::from_static(b"{}")).await,
        Err(ChannelError::Transport(_))
    ));
}
