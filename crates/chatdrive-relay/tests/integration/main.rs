//! Integration tests for the relay channel adapter.
//!
//! Each module spins up a wiremock server standing in for the relay API and
//! drives the adapter through the channel port.

mod common;
mod test_metadata;
mod test_objects;
mod test_throttling;
