//! Static route table.
//!
//! Maps request path templates to what serves them. Built once per worker,
//! validated at construction, then only read.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use lolgate_core::error::{GatewayError, Result};
use lolgate_core::{is_identity_scoped, is_live, CacheTier, Operation, Params};

/// What a route resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "operation")]
pub enum RouteTarget {
    /// One upstream call.
    Upstream(Operation),
    /// The gateway's own identity payload.
    ServiceInfo,
    /// Purge the cache group named by the `id` path parameter.
    ClearCache,
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTarget::Upstream(op) => write!(f, "{}", op),
            RouteTarget::ServiceInfo => f.write_str("serviceInfo"),
            RouteTarget::ClearCache => f.write_str("clearCache"),
        }
    }
}

/// One entry of the route table.
#[derive(Clone, Debug, Serialize)]
pub struct RouteEntry {
    /// Path template, named parameters prefixed with `:`
    pub template: &'static str,
    /// What serves the route
    pub target: RouteTarget,
    /// TTL policy
    pub tier: CacheTier,
    /// Call upstream with no options at all (query string ignored)
    pub skip_params: bool,
}

impl RouteEntry {
    /// Upstream-backed route; tier follows the namespace policy.
    pub fn upstream(template: &'static str, operation: Operation) -> Self {
        Self {
            template,
            target: RouteTarget::Upstream(operation),
            tier: CacheTier::for_path(template),
            skip_params: false,
        }
    }

    /// The service root, cached for a day.
    pub fn service_info(template: &'static str) -> Self {
        Self {
            template,
            target: RouteTarget::ServiceInfo,
            tier: CacheTier::Long,
            skip_params: false,
        }
    }

    /// Explicit invalidation route, never cached.
    pub fn clear_cache(template: &'static str) -> Self {
        Self {
            template,
            target: RouteTarget::ClearCache,
            tier: CacheTier::None,
            skip_params: true,
        }
    }

    /// Drops path and query params before calling upstream.
    pub fn without_params(mut self) -> Self {
        self.skip_params = true;
        self
    }

    /// Cache group for a request on this route.
    ///
    /// Identity-scoped, non-live upstream routes are grouped under the `id`
    /// path parameter, falling back to `name`.
    pub fn cache_group(&self, path_params: &Params) -> Option<String> {
        if !matches!(self.target, RouteTarget::Upstream(_)) {
            return None;
        }
        if !is_identity_scoped(self.template) || is_live(self.template) {
            return None;
        }
        path_params
            .get("id")
            .or_else(|| path_params.get("name"))
            .map(str::to_string)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(&'static str),
    Param(&'static str),
}

#[derive(Debug)]
struct CompiledRoute {
    entry: RouteEntry,
    segments: Vec<Segment>,
}

impl CompiledRoute {
    fn compile(entry: RouteEntry) -> Result<Self> {
        let template = entry.template;
        let rest = template.strip_prefix('/').ok_or_else(|| {
            GatewayError::Config(format!("route '{}' must start with '/'", template))
        })?;

        let mut segments = Vec::new();
        let mut names = HashSet::new();
        for raw in rest.split('/').filter(|s| !s.is_empty()) {
            match raw.strip_prefix(':') {
                Some("") => {
                    return Err(GatewayError::Config(format!(
                        "route '{}' has an unnamed parameter",
                        template
                    )))
                }
                Some(name) => {
                    if !names.insert(name) {
                        return Err(GatewayError::Config(format!(
                            "route '{}' repeats parameter ':{}'",
                            template, name
                        )));
                    }
                    segments.push(Segment::Param(name));
                }
                None => segments.push(Segment::Literal(raw)),
            }
        }

        match entry.target {
            RouteTarget::Upstream(op) => {
                for placeholder in op.placeholders() {
                    let defaulted = op.defaults().iter().any(|(k, _)| *k == placeholder);
                    if !names.contains(placeholder) && !defaulted {
                        return Err(GatewayError::Config(format!(
                            "route '{}' does not supply '{}' required by {}",
                            template, placeholder, op
                        )));
                    }
                }
            }
            RouteTarget::ClearCache if !names.contains("id") => {
                return Err(GatewayError::Config(format!(
                    "cache clear route '{}' needs an ':id' parameter",
                    template
                )));
            }
            _ => {}
        }

        Ok(Self { entry, segments })
    }

    /// Binds path segments; literal positions are the specificity score.
    fn bind(&self, parts: &[String]) -> Option<(Params, Vec<bool>)> {
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = Params::new();
        let mut specificity = Vec::with_capacity(parts.len());
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                    specificity.push(true);
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(*name, part.as_str());
                    specificity.push(false);
                }
            }
        }
        Some((params, specificity))
    }
}

/// The full set of routes a worker serves.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    /// Builds and validates a table.
    pub fn new(entries: impl IntoIterator<Item = RouteEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut routes = Vec::new();
        for entry in entries {
            if !seen.insert(entry.template) {
                return Err(GatewayError::Config(format!(
                    "duplicate route '{}'",
                    entry.template
                )));
            }
            routes.push(CompiledRoute::compile(entry)?);
        }
        Ok(Self { routes })
    }

    /// The gateway's route table.
    pub fn standard() -> Result<Self> {
        use Operation::*;

        Self::new([
            RouteEntry::service_info("/"),
            RouteEntry::clear_cache("/summoner/:id/clear"),
            RouteEntry::upstream("/featuredGames", GetFeaturedGames),
            RouteEntry::upstream("/leagues/challenger", GetChallengerLeague),
            RouteEntry::upstream("/leagues/master", GetMasterLeague),
            RouteEntry::upstream("/match/:id", GetMatchById),
            RouteEntry::upstream("/static/champions", GetChampionData),
            RouteEntry::upstream("/static/champions/:id", GetChampionDataById),
            RouteEntry::upstream("/static/items", GetItemData),
            RouteEntry::upstream("/static/items/:id", GetItemDataById),
            RouteEntry::upstream("/static/languages", GetLanguages),
            RouteEntry::upstream("/static/languageStrings", GetLanguageStrings),
            RouteEntry::upstream("/static/maps", GetMaps),
            RouteEntry::upstream("/static/masteries", GetMasteryData),
            RouteEntry::upstream("/static/masteries/:id", GetMasteryDataById),
            RouteEntry::upstream("/static/profile-icons", GetProfileIcons),
            RouteEntry::upstream("/static/realms", GetRealms),
            RouteEntry::upstream("/static/runes", GetRuneData),
            RouteEntry::upstream("/static/runes/:id", GetRuneDataById),
            RouteEntry::upstream("/static/spells", GetSummonerSpellData),
            RouteEntry::upstream("/static/spells/:id", GetSummonerSpellDataById),
            RouteEntry::upstream("/static/versions", GetVersions),
            RouteEntry::upstream("/status", GetStatus).without_params(),
            RouteEntry::upstream("/summoner/:id/activeGame", GetActiveGameBySummonerId),
            RouteEntry::upstream("/summoner/:id/matchList", GetMatchListBySummonerId),
            RouteEntry::upstream("/summoner/:id/recentGames", GetRecentGamesBySummonerId),
            RouteEntry::upstream("/summoner/:id/championMastery", GetChampionMastery),
            RouteEntry::upstream("/summoner/:id/championMastery/score", GetChampionMasteryScore),
            RouteEntry::upstream("/summoner/:id/championMastery/:champId", GetChampionMasteryById),
            RouteEntry::upstream("/summoner/:id", GetSummonerById),
            RouteEntry::upstream("/summoner/by-name/:name", GetSummonerByName),
            RouteEntry::upstream("/summoner/:id/league", GetLeagueBySummonerId),
            RouteEntry::upstream("/summoner/:id/league/entry", GetLeagueEntryBySummonerId),
            RouteEntry::upstream("/summoner/:id/masteries", GetMasteriesBySummonerId),
            RouteEntry::upstream("/summoner/:id/runes", GetRunesBySummonerId),
        ])
    }

    /// Resolves a request path to its route and path parameters.
    ///
    /// Literal segments beat parameters, leftmost first. One trailing slash
    /// is ignored and segments are percent-decoded before binding.
    pub fn resolve(&self, path: &str) -> Option<(&RouteEntry, Params)> {
        let parts = split_path(path)?;
        self.routes
            .iter()
            .filter_map(|route| {
                route
                    .bind(&parts)
                    .map(|(params, specificity)| (route, params, specificity))
            })
            .max_by(|a, b| a.2.cmp(&b.2))
            .map(|(route, params, _)| (&route.entry, params))
    }

    /// All entries, in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.iter().map(|r| &r.entry)
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn split_path(path: &str) -> Option<Vec<String>> {
    let rest = path.strip_prefix('/')?;
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    if rest.is_empty() {
        return Some(Vec::new());
    }
    rest.split('/')
        .map(|part| urlencoding::decode(part).ok().map(|p| p.into_owned()))
        .collect()
}
