//! Gateway constants.
//!
//! Cache lifetimes, admission defaults, and the identity namespace the cache
//! group rule keys off. Values mirror the public behavior of the gateway and
//! are not configurable per request.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE TIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifetime of the short tier (static data, leagues, matches).
pub const SHORT_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Lifetime of the long tier (identity-scoped resources, service root).
pub const LONG_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default capacity of a worker's response cache.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;

/// How often a worker sweeps expired cache entries and rate windows.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTE NAMESPACES
// ═══════════════════════════════════════════════════════════════════════════════

/// Prefix of identity-scoped routes. Responses under it are tagged with a
/// cache group so they can be purged together.
pub const IDENTITY_NAMESPACE: &str = "/summoner";

/// Suffix of the always-live endpoint that is never cached.
pub const LIVE_SUFFIX: &str = "/activeGame";

/// Prefixes served from the short tier.
pub const SHORT_TIER_PREFIXES: &[&str] = &["/static", "/champions", "/leagues", "/match"];

/// Extra prefixes served from the long tier besides the identity namespace.
pub const LONG_TIER_PREFIXES: &[&str] = &["/team"];

// ═══════════════════════════════════════════════════════════════════════════════
// ADMISSION CONTROL
// ═══════════════════════════════════════════════════════════════════════════════

/// Default fixed admission window.
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Default maximum requests per identity per window.
pub const DEFAULT_RATE_MAX: u32 = 1000;

// ═══════════════════════════════════════════════════════════════════════════════
// SERVER DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3001;

/// Default upstream region.
pub const DEFAULT_REGION: &str = "euw1";

/// Default upstream base URL; `{region}` is substituted at startup.
pub const DEFAULT_UPSTREAM_URL: &str = "https://{region}.api.riotgames.com";

/// Default upstream request timeout in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Service name reported by the root endpoint.
pub const SERVICE_NAME: &str = "League of Legends API";

/// Authors reported by the root endpoint.
pub const SERVICE_AUTHORS: &str =
    "Robert Manolea <manolea.robert@gmail.com> and Daniel Sogl <mytechde@outlook.com>";

/// Repository reported by the root endpoint.
pub const SERVICE_REPOSITORY: &str = "https://github.com/Pupix/lol-riot-api";
