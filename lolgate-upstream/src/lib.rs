//! Upstream client for lolgate.
//!
//! Implements [`lolgate_core::Upstream`] over HTTP. One request per call,
//! no caching, no retries; the gateway above decides what to keep.

mod client;

pub use client::{HttpUpstream, UpstreamConfig};
