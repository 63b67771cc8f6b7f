//! Domain types for lolgate.

mod operation;
mod params;
mod tier;

pub use operation::Operation;
pub use params::{CacheKey, Params};
pub use tier::{is_identity_scoped, is_live, CacheTier};
