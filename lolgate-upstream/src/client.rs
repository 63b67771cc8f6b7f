//! reqwest-backed upstream client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use lolgate_core::constants::{DEFAULT_REGION, DEFAULT_UPSTREAM_TIMEOUT_SECS, DEFAULT_UPSTREAM_URL};
use lolgate_core::error::{GatewayError, Result, UpstreamError};
use lolgate_core::{Operation, Params, Upstream};

/// Header carrying the API credential.
const TOKEN_HEADER: &str = "X-Riot-Token";

/// Upstream client configuration.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct UpstreamConfig {
    /// Base URL; `{region}` is replaced with `region`
    pub base_url: String,
    /// Platform region (e.g. "euw1")
    pub region: String,
    /// API credential, sent on every request
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_URL.into(),
            region: DEFAULT_REGION.into(),
            api_key: None,
            timeout_seconds: DEFAULT_UPSTREAM_TIMEOUT_SECS,
        }
    }
}

impl UpstreamConfig {
    /// Creates config for a region with the default base URL.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    /// Sets the API credential.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Base URL with the region substituted.
    pub fn resolved_base_url(&self) -> String {
        self.base_url.replace("{region}", &self.region)
    }
}

/// Error body shape the upstream uses for failures.
#[derive(Deserialize)]
struct ErrorEnvelope {
    status: ErrorStatus,
}

#[derive(Deserialize)]
struct ErrorStatus {
    message: String,
}

/// HTTP implementation of [`Upstream`].
pub struct HttpUpstream {
    config: UpstreamConfig,
    base: Url,
    http_client: reqwest::Client,
}

impl HttpUpstream {
    /// Creates a client, validating the base URL.
    pub fn with_config(config: UpstreamConfig) -> Result<Self> {
        let base = Url::parse(&config.resolved_base_url())
            .map_err(|e| GatewayError::Config(format!("invalid upstream URL: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(GatewayError::Config(format!(
                "upstream URL cannot be a base: {}",
                base
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            base,
            http_client,
        })
    }

    /// Region this client talks to.
    pub fn region(&self) -> &str {
        &self.config.region
    }

    /// Builds the request URL: placeholders from params (or operation
    /// defaults), every other param as a query pair.
    pub fn request_url(&self, operation: Operation, params: &Params) -> std::result::Result<Url, UpstreamError> {
        let mut remaining = params.clone();
        let mut segments = Vec::new();

        for segment in operation.upstream_path().split('/').filter(|s| !s.is_empty()) {
            match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => {
                    let value = remaining
                        .remove(name)
                        .or_else(|| {
                            operation
                                .defaults()
                                .iter()
                                .find(|(k, _)| *k == name)
                                .map(|(_, v)| v.to_string())
                        })
                        .ok_or_else(|| UpstreamError::Status {
                            code: 400,
                            message: format!("missing parameter '{}'", name),
                        })?;
                    segments.push(value);
                }
                None => segments.push(segment.to_string()),
            }
        }

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::Transport("upstream URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        if !remaining.is_empty() {
            url.query_pairs_mut().extend_pairs(remaining.iter());
        }
        Ok(url)
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    #[instrument(skip(self, operation, params), fields(op = %operation))]
    async fn call(&self, operation: Operation, params: &Params) -> std::result::Result<Value, UpstreamError> {
        let url = self.request_url(operation, params)?;

        let mut request = self.http_client.get(url);
        if let Some(key) = &self.config.api_key {
            request = request.header(TOKEN_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.status.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("Upstream error")
                        .to_string()
                });
            warn!(status = status.as_u16(), %message, "Upstream call failed");
            return Err(UpstreamError::from_status(status.as_u16(), message));
        }

        debug!(status = status.as_u16(), "Upstream call succeeded");
        response
            .json::<Value>()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpUpstream {
        HttpUpstream::with_config(
            UpstreamConfig::new("euw1")
                .with_base_url(server.uri())
                .with_api_key("secret"),
        )
        .unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_region_substitution() {
        let config = UpstreamConfig::new("na1");
        assert_eq!(config.resolved_base_url(), "https://na1.api.riotgames.com");
    }

    #[test]
    fn test_request_url_fills_placeholders_and_query() {
        let upstream = HttpUpstream::with_config(UpstreamConfig::default()).unwrap();
        let url = upstream
            .request_url(
                Operation::GetChampionMasteryById,
                &params(&[("id", "42"), ("champId", "7"), ("locale", "en_US")]),
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://euw1.api.riotgames.com/lol/champion-mastery/v3/champion-masteries/by-summoner/42/by-champion/7?locale=en_US"
        );
    }

    #[test]
    fn test_request_url_encodes_segments() {
        let upstream = HttpUpstream::with_config(UpstreamConfig::default()).unwrap();
        let url = upstream
            .request_url(Operation::GetSummonerByName, &params(&[("name", "Faker Jr")]))
            .unwrap();
        assert!(url.path().ends_with("/by-name/Faker%20Jr"));
    }

    #[test]
    fn test_request_url_uses_defaults() {
        let upstream = HttpUpstream::with_config(UpstreamConfig::default()).unwrap();
        let url = upstream
            .request_url(Operation::GetChallengerLeague, &Params::new())
            .unwrap();
        assert!(url.path().ends_with("/by-queue/RANKED_SOLO_5x5"));
    }

    #[test]
    fn test_request_url_missing_param() {
        let upstream = HttpUpstream::with_config(UpstreamConfig::default()).unwrap();
        let err = upstream
            .request_url(Operation::GetSummonerById, &Params::new())
            .unwrap_err();
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn test_invalid_base_url() {
        let result = HttpUpstream::with_config(UpstreamConfig::default().with_base_url("not a url"));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[tokio::test]
    async fn test_call_success_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lol/summoner/v3/summoners/42"))
            .and(header(TOKEN_HEADER, "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 42,
                "name": "Faker"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let value = client(&server)
            .call(Operation::GetSummonerById, &params(&[("id", "42")]))
            .await
            .unwrap();
        assert_eq!(value["name"], "Faker");
    }

    #[tokio::test]
    async fn test_call_passes_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lol/static-data/v3/champions"))
            .and(query_param("locale", "de_DE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {}})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .call(Operation::GetChampionData, &params(&[("locale", "de_DE")]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_call_maps_error_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "status": { "message": "Data not found", "status_code": 404 }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .call(Operation::GetMatchById, &params(&[("id", "1")]))
            .await
            .unwrap_err();
        assert_eq!(err, UpstreamError::NotFound { message: "Data not found".into() });
    }

    #[tokio::test]
    async fn test_call_rate_limited_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client(&server)
            .call(Operation::GetVersions, &Params::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), 429);
        assert_eq!(err.message(), "Too Many Requests");
    }

    #[tokio::test]
    async fn test_call_undecodable_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server)
            .call(Operation::GetRealms, &Params::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }
}
