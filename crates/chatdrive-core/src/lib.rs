//! chatdrive Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `FileDescriptor`, `ChunkRef`, `DeletionEntry`, validated newtypes
//! - **Error taxonomy** - `StoreError`, the typed failure surface of every store operation
//! - **Port definitions** - Traits for adapters: `RemoteChunkChannel`, `ChunkStore`
//! - **Configuration** - Typed config with YAML loading, defaults, and validation
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure data and arithmetic with no I/O.
//! Ports define trait interfaces that the store, vfs, and relay crates
//! implement or consume.

pub mod config;
pub mod domain;
pub mod ports;
