//! Cache tiers and the namespace rules that assign them.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::constants::{
    IDENTITY_NAMESPACE, LIVE_SUFFIX, LONG_TIER_PREFIXES, LONG_TTL, SHORT_TIER_PREFIXES, SHORT_TTL,
};

/// TTL policy of a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// Always calls upstream.
    None,
    /// 12 hours.
    Short,
    /// 1 day.
    Long,
}

impl CacheTier {
    /// Lifetime of entries in this tier, `None` if uncached.
    pub const fn ttl(self) -> Option<Duration> {
        match self {
            CacheTier::None => None,
            CacheTier::Short => Some(SHORT_TTL),
            CacheTier::Long => Some(LONG_TTL),
        }
    }

    /// Returns true if responses in this tier are stored.
    pub const fn is_cacheable(self) -> bool {
        !matches!(self, CacheTier::None)
    }

    /// Tier for an upstream-backed route template.
    ///
    /// Identity-scoped routes get the long tier except the live endpoint,
    /// reference data and listings get the short tier, everything else
    /// is uncached.
    pub fn for_path(template: &str) -> Self {
        if is_identity_scoped(template) {
            if is_live(template) {
                CacheTier::None
            } else {
                CacheTier::Long
            }
        } else if has_prefix(template, LONG_TIER_PREFIXES) {
            CacheTier::Long
        } else if has_prefix(template, SHORT_TIER_PREFIXES) {
            CacheTier::Short
        } else {
            CacheTier::None
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTier::None => f.write_str("none"),
            CacheTier::Short => f.write_str("12h"),
            CacheTier::Long => f.write_str("1d"),
        }
    }
}

/// Returns true if the template lives under the identity namespace.
pub fn is_identity_scoped(template: &str) -> bool {
    has_prefix(template, &[IDENTITY_NAMESPACE])
}

/// Returns true for the always-live endpoint.
pub fn is_live(template: &str) -> bool {
    template.ends_with(LIVE_SUFFIX)
}

// Segment-aware: "/matchmaking" is not under "/match".
fn has_prefix(template: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| {
        template
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}
