//! # lolgate Core
//!
//! Core types, errors, and traits shared by every lolgate crate.
//!
//! - **Types**: the upstream operation catalog, cache tiers, request params
//! - **Errors**: gateway and upstream error taxonomy
//! - **Constants**: TTLs and configuration defaults
//! - **Traits**: the `Upstream` seam the dispatcher calls through
//!
//! ## Example
//!
//! ```rust
//! use lolgate_core::{CacheKey, Operation, Params};
//!
//! let mut params = Params::new();
//! params.insert("id", "42");
//! let key = CacheKey::new(Operation::GetSummonerById.name(), &params);
//! assert_eq!(key.as_str(), "getSummonerById?id=42");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{GatewayError, Result, UpstreamError};
pub use traits::*;
pub use types::*;
