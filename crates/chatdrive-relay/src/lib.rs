//! chatdrive Relay - HTTP adapter for the message-oriented backend
//!
//! Implements the [`RemoteChunkChannel`] port over the relay's REST API:
//! chunk objects travel as message attachments, the metadata document lives
//! at the channel's well-known metadata location. The client throttles
//! itself with a token bucket and honors `Retry-After` on 429 responses.
//!
//! [`RemoteChunkChannel`]: chatdrive_core::ports::chunk_channel::RemoteChunkChannel

pub mod channel;
pub mod client;
pub mod rate_limit;

pub use channel::RelayChannel;
pub use client::RelayClient;
pub use rate_limit::TokenBucket;
