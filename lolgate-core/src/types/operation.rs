//! Upstream operation catalog.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::GatewayError;

/// One upstream resource the gateway can call.
///
/// The set is closed: route entries reference operations by variant, so a
/// route can never point at an operation that does not exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    /// Featured spectator games.
    GetFeaturedGames,
    /// Challenger league for a queue.
    GetChallengerLeague,
    /// Master league for a queue.
    GetMasterLeague,
    /// Single match by id.
    GetMatchById,
    /// All champions (static data).
    GetChampionData,
    /// One champion (static data).
    GetChampionDataById,
    /// All items (static data).
    GetItemData,
    /// One item (static data).
    GetItemDataById,
    /// Supported languages.
    GetLanguages,
    /// Localized language strings.
    GetLanguageStrings,
    /// Map data.
    GetMaps,
    /// All masteries (static data).
    GetMasteryData,
    /// One mastery (static data).
    GetMasteryDataById,
    /// Profile icons.
    GetProfileIcons,
    /// Realm data.
    GetRealms,
    /// All runes (static data).
    GetRuneData,
    /// One rune (static data).
    GetRuneDataById,
    /// All summoner spells (static data).
    GetSummonerSpellData,
    /// One summoner spell (static data).
    GetSummonerSpellDataById,
    /// Game versions.
    GetVersions,
    /// Shard status.
    GetStatus,
    /// Game a summoner is currently playing.
    GetActiveGameBySummonerId,
    /// Match list of a summoner.
    GetMatchListBySummonerId,
    /// Recent games of a summoner.
    GetRecentGamesBySummonerId,
    /// Champion masteries of a summoner.
    GetChampionMastery,
    /// Total champion mastery score of a summoner.
    GetChampionMasteryScore,
    /// Mastery of a summoner on one champion.
    GetChampionMasteryById,
    /// Summoner profile by id.
    GetSummonerById,
    /// Summoner profile by name.
    GetSummonerByName,
    /// Leagues a summoner plays in.
    GetLeagueBySummonerId,
    /// League positions of a summoner.
    GetLeagueEntryBySummonerId,
    /// Mastery pages of a summoner.
    GetMasteriesBySummonerId,
    /// Rune pages of a summoner.
    GetRunesBySummonerId,
}

impl Operation {
    /// Every operation, in catalog order.
    pub const ALL: [Operation; 33] = [
        Operation::GetFeaturedGames,
        Operation::GetChallengerLeague,
        Operation::GetMasterLeague,
        Operation::GetMatchById,
        Operation::GetChampionData,
        Operation::GetChampionDataById,
        Operation::GetItemData,
        Operation::GetItemDataById,
        Operation::GetLanguages,
        Operation::GetLanguageStrings,
        Operation::GetMaps,
        Operation::GetMasteryData,
        Operation::GetMasteryDataById,
        Operation::GetProfileIcons,
        Operation::GetRealms,
        Operation::GetRuneData,
        Operation::GetRuneDataById,
        Operation::GetSummonerSpellData,
        Operation::GetSummonerSpellDataById,
        Operation::GetVersions,
        Operation::GetStatus,
        Operation::GetActiveGameBySummonerId,
        Operation::GetMatchListBySummonerId,
        Operation::GetRecentGamesBySummonerId,
        Operation::GetChampionMastery,
        Operation::GetChampionMasteryScore,
        Operation::GetChampionMasteryById,
        Operation::GetSummonerById,
        Operation::GetSummonerByName,
        Operation::GetLeagueBySummonerId,
        Operation::GetLeagueEntryBySummonerId,
        Operation::GetMasteriesBySummonerId,
        Operation::GetRunesBySummonerId,
    ];

    /// Upstream method name. Used in cache keys and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Operation::GetFeaturedGames => "getFeaturedGames",
            Operation::GetChallengerLeague => "getChallengerLeague",
            Operation::GetMasterLeague => "getMasterLeague",
            Operation::GetMatchById => "getMatchById",
            Operation::GetChampionData => "getChampionData",
            Operation::GetChampionDataById => "getChampionDataById",
            Operation::GetItemData => "getItemData",
            Operation::GetItemDataById => "getItemDataById",
            Operation::GetLanguages => "getLanguages",
            Operation::GetLanguageStrings => "getLanguageStrings",
            Operation::GetMaps => "getMaps",
            Operation::GetMasteryData => "getMasteryData",
            Operation::GetMasteryDataById => "getMasteryDataById",
            Operation::GetProfileIcons => "getProfileIcons",
            Operation::GetRealms => "getRealms",
            Operation::GetRuneData => "getRuneData",
            Operation::GetRuneDataById => "getRuneDataById",
            Operation::GetSummonerSpellData => "getSummonerSpellData",
            Operation::GetSummonerSpellDataById => "getSummonerSpellDataById",
            Operation::GetVersions => "getVersions",
            Operation::GetStatus => "getStatus",
            Operation::GetActiveGameBySummonerId => "getActiveGameBySummonerId",
            Operation::GetMatchListBySummonerId => "getMatchListBySummonerId",
            Operation::GetRecentGamesBySummonerId => "getRecentGamesBySummonerId",
            Operation::GetChampionMastery => "getChampionMastery",
            Operation::GetChampionMasteryScore => "getChampionMasteryScore",
            Operation::GetChampionMasteryById => "getChampionMasteryById",
            Operation::GetSummonerById => "getSummonerById",
            Operation::GetSummonerByName => "getSummonerByName",
            Operation::GetLeagueBySummonerId => "getLeagueBySummonerId",
            Operation::GetLeagueEntryBySummonerId => "getLeagueEntryBySummonerId",
            Operation::GetMasteriesBySummonerId => "getMasteriesBySummonerId",
            Operation::GetRunesBySummonerId => "getRunesBySummonerId",
        }
    }

    /// Upstream resource path with `{param}` placeholders.
    pub const fn upstream_path(self) -> &'static str {
        match self {
            Operation::GetFeaturedGames => "/lol/spectator/v3/featured-games",
            Operation::GetChallengerLeague => "/lol/league/v3/challengerleagues/by-queue/{queue}",
            Operation::GetMasterLeague => "/lol/league/v3/masterleagues/by-queue/{queue}",
            Operation::GetMatchById => "/lol/match/v3/matches/{id}",
            Operation::GetChampionData => "/lol/static-data/v3/champions",
            Operation::GetChampionDataById => "/lol/static-data/v3/champions/{id}",
            Operation::GetItemData => "/lol/static-data/v3/items",
            Operation::GetItemDataById => "/lol/static-data/v3/items/{id}",
            Operation::GetLanguages => "/lol/static-data/v3/languages",
            Operation::GetLanguageStrings => "/lol/static-data/v3/language-strings",
            Operation::GetMaps => "/lol/static-data/v3/maps",
            Operation::GetMasteryData => "/lol/static-data/v3/masteries",
            Operation::GetMasteryDataById => "/lol/static-data/v3/masteries/{id}",
            Operation::GetProfileIcons => "/lol/static-data/v3/profile-icons",
            Operation::GetRealms => "/lol/static-data/v3/realms",
            Operation::GetRuneData => "/lol/static-data/v3/runes",
            Operation::GetRuneDataById => "/lol/static-data/v3/runes/{id}",
            Operation::GetSummonerSpellData => "/lol/static-data/v3/summoner-spells",
            Operation::GetSummonerSpellDataById => "/lol/static-data/v3/summoner-spells/{id}",
            Operation::GetVersions => "/lol/static-data/v3/versions",
            Operation::GetStatus => "/lol/status/v3/shard-data",
            Operation::GetActiveGameBySummonerId => "/lol/spectator/v3/active-games/by-summoner/{id}",
            Operation::GetMatchListBySummonerId => "/lol/match/v3/matchlists/by-account/{id}",
            Operation::GetRecentGamesBySummonerId => "/lol/match/v3/matchlists/by-account/{id}/recent",
            Operation::GetChampionMastery => {
                "/lol/champion-mastery/v3/champion-masteries/by-summoner/{id}"
            }
            Operation::GetChampionMasteryScore => "/lol/champion-mastery/v3/scores/by-summoner/{id}",
            Operation::GetChampionMasteryById => {
                "/lol/champion-mastery/v3/champion-masteries/by-summoner/{id}/by-champion/{champId}"
            }
            Operation::GetSummonerById => "/lol/summoner/v3/summoners/{id}",
            Operation::GetSummonerByName => "/lol/summoner/v3/summoners/by-name/{name}",
            Operation::GetLeagueBySummonerId => "/lol/league/v3/leagues/by-summoner/{id}",
            Operation::GetLeagueEntryBySummonerId => "/lol/league/v3/positions/by-summoner/{id}",
            Operation::GetMasteriesBySummonerId => "/lol/platform/v3/masteries/by-summoner/{id}",
            Operation::GetRunesBySummonerId => "/lol/platform/v3/runes/by-summoner/{id}",
        }
    }

    /// Fallback values for placeholders the caller may omit.
    pub const fn defaults(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Operation::GetChallengerLeague | Operation::GetMasterLeague => {
                &[("queue", "RANKED_SOLO_5x5")]
            }
            _ => &[],
        }
    }

    /// Placeholder names of the upstream path, in order.
    pub fn placeholders(self) -> Vec<&'static str> {
        self.upstream_path()
            .split('/')
            .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
            .collect()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| GatewayError::Config(format!("unknown upstream operation '{}'", s)))
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = Operation::ALL.iter().map(|op| op.name()).collect();
        assert_eq!(names.len(), Operation::ALL.len());
    }

    #[test]
    fn test_parse_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.name().parse::<Operation>().unwrap(), op);
        }
        assert!("getNothing".parse::<Operation>().is_err());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            Operation::GetChampionMasteryById.placeholders(),
            vec!["id", "champId"]
        );
        assert!(Operation::GetStatus.placeholders().is_empty());
        assert_eq!(Operation::GetChallengerLeague.placeholders(), vec!["queue"]);
    }

    #[test]
    fn test_league_queue_default() {
        assert_eq!(
            Operation::GetMasterLeague.defaults(),
            &[("queue", "RANKED_SOLO_5x5")]
        );
        assert!(Operation::GetSummonerById.defaults().is_empty());
    }

    #[test]
    fn test_serializes_as_name() {
        let json = serde_json::to_string(&Operation::GetSummonerByName).unwrap();
        assert_eq!(json, "\"getSummonerByName\"");
    }
}
