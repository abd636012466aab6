//! # matterline-shared
//!
//! Wire data model shared between the store, the network connectors and the
//! client orchestration: identity newtypes, serde DTOs for the Mattermost
//! HTTP API, and the typed real-time event decoding.
//!
//! Everything here is transport-agnostic and deliberately tolerant: response
//! fields default when absent, so a partially malformed object never aborts
//! the batch it arrived in.

pub mod constants;
pub mod events;
pub mod models;
pub mod types;
