use std::path::Path;

use http::HeaderName;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

/// A structured URL endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
	pub scheme: String,
	pub hostname: String,
	#[serde(default)]
	pub port: Option<u16>,
	pub path: String,
}

/// Downstream header a forwarded token is written to, with an optional
/// bearer-style preamble.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
	pub header: String,
	#[serde(default)]
	pub preamble: String,
}

/// Per-IdP OIDC filter configuration. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
	pub authorization_endpoint: Endpoint,
	pub token_endpoint: Endpoint,
	pub callback: Endpoint,
	pub client_id: String,
	pub client_secret: SecretString,
	#[serde(default)]
	pub scopes: Vec<String>,
	/// Expected `iss` of ID tokens.
	pub issuer: String,
	/// Inline JWKS document the IdP signs ID tokens with.
	pub jwks: String,
	/// Where the user-agent lands after a successful exchange.
	pub landing_page: String,
	#[serde(default)]
	pub cookie_name_prefix: String,
	pub id_token: TokenConfig,
	#[serde(default)]
	pub access_token: Option<TokenConfig>,
	/// State cookie lifetime in seconds.
	pub timeout: i64,
	/// Reject plain-http requests outright. Off by default.
	#[serde(default)]
	pub enforce_https: bool,
}

fn default_listen_address() -> String {
	"0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
	10003
}

fn default_threads() -> usize {
	8
}

/// Top-level server configuration: where to listen, how to log, and the
/// chain of OIDC filters to run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	#[serde(default = "default_listen_address")]
	pub listen_address: String,
	#[serde(default = "default_listen_port")]
	pub listen_port: u16,
	#[serde(default = "default_threads")]
	pub threads: usize,
	#[serde(default)]
	pub log_level: String,
	pub filters: Vec<OidcConfig>,
}

impl Config {
	pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Config> {
		let contents = fs_err::read_to_string(path.as_ref())?;
		Self::parse(&contents)
	}

	pub fn parse(contents: &str) -> anyhow::Result<Config> {
		let config: Config = serde_json::from_str(contents)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> anyhow::Result<()> {
		if self.threads == 0 {
			anyhow::bail!("threads must be > 0");
		}
		self.log_level()?;
		if self.filters.is_empty() {
			anyhow::bail!("config requires at least one filter");
		}
		for filter in &self.filters {
			filter.validate()?;
		}
		Ok(())
	}

	pub fn listen_addr(&self) -> String {
		format!("{}:{}", self.listen_address, self.listen_port)
	}

	pub fn log_level(&self) -> anyhow::Result<tracing::Level> {
		match self.log_level.as_str() {
			"" | "trace" => Ok(tracing::Level::TRACE),
			"debug" => Ok(tracing::Level::DEBUG),
			"info" => Ok(tracing::Level::INFO),
			"error" | "critical" => Ok(tracing::Level::ERROR),
			other => anyhow::bail!(
				"unexpected log_level '{other}': must be one of [trace, debug, info, error, critical]"
			),
		}
	}
}

impl OidcConfig {
	pub fn validate(&self) -> anyhow::Result<()> {
		validate_endpoint("authorization_endpoint", &self.authorization_endpoint)?;
		validate_endpoint("token_endpoint", &self.token_endpoint)?;
		validate_endpoint("callback", &self.callback)?;
		if self.client_id.is_empty() {
			anyhow::bail!("oidc filter requires client_id");
		}
		if self.client_secret.expose_secret().is_empty() {
			anyhow::bail!("oidc filter requires client_secret");
		}
		if self.issuer.is_empty() {
			anyhow::bail!("oidc filter requires issuer");
		}
		serde_json::from_str::<serde_json::Value>(&self.jwks)
			.map_err(|e| anyhow::anyhow!("invalid jwks config: {e}"))?;
		Url::parse(&self.landing_page)
			.map_err(|e| anyhow::anyhow!("invalid landing_page config: {e}"))?;
		validate_header_name("id_token.header", &self.id_token.header)?;
		if let Some(access_token) = &self.access_token {
			validate_header_name("access_token.header", &access_token.header)?;
		}
		if self.timeout <= 0 {
			anyhow::bail!("oidc filter timeout must be > 0");
		}
		Ok(())
	}
}

fn validate_endpoint(name: &str, endpoint: &Endpoint) -> anyhow::Result<()> {
	if endpoint.scheme != "https" && endpoint.scheme != "http" {
		anyhow::bail!("{name} scheme must be http or https");
	}
	if endpoint.hostname.is_empty() {
		anyhow::bail!("{name} requires a hostname");
	}
	if !endpoint.path.starts_with('/') {
		anyhow::bail!("{name} path must start with '/'");
	}
	Ok(())
}

fn validate_header_name(name: &str, value: &str) -> anyhow::Result<()> {
	HeaderName::from_bytes(value.as_bytes())
		.map_err(|_| anyhow::anyhow!("{name} is not a valid header name"))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn minimal_config() -> String {
		r#"{
			"listen_address": "127.0.0.1",
			"listen_port": 10003,
			"log_level": "info",
			"filters": [{
				"authorization_endpoint": {"scheme": "https", "hostname": "idp", "path": "/auth"},
				"token_endpoint": {"scheme": "https", "hostname": "idp", "path": "/token"},
				"callback": {"scheme": "https", "hostname": "app", "path": "/cb"},
				"client_id": "c",
				"client_secret": "s",
				"scopes": ["email"],
				"issuer": "https://idp",
				"jwks": "{\"keys\":[]}",
				"landing_page": "https://app/",
				"id_token": {"header": "authorization", "preamble": "Bearer"},
				"timeout": 60
			}]
		}"#
		.to_string()
	}

	#[test]
	fn parses_and_validates_minimal_config() {
		let config = Config::parse(&minimal_config()).unwrap();
		assert_eq!(config.listen_addr(), "127.0.0.1:10003");
		assert_eq!(config.threads, 8);
		assert_eq!(config.log_level().unwrap(), tracing::Level::INFO);
		let filter = &config.filters[0];
		assert_eq!(filter.client_id, "c");
		assert!(filter.access_token.is_none());
		assert!(!filter.enforce_https);
	}

	#[test]
	fn rejects_empty_client_id() {
		let contents = minimal_config().replace("\"client_id\": \"c\"", "\"client_id\": \"\"");
		let err = Config::parse(&contents).unwrap_err();
		assert!(err.to_string().contains("requires client_id"));
	}

	#[test]
	fn rejects_non_positive_timeout() {
		let contents = minimal_config().replace("\"timeout\": 60", "\"timeout\": 0");
		let err = Config::parse(&contents).unwrap_err();
		assert!(err.to_string().contains("timeout must be > 0"));
	}

	#[test]
	fn rejects_bad_endpoint_scheme() {
		let contents = minimal_config().replace(
			"{\"scheme\": \"https\", \"hostname\": \"idp\", \"path\": \"/auth\"}",
			"{\"scheme\": \"ftp\", \"hostname\": \"idp\", \"path\": \"/auth\"}",
		);
		let err = Config::parse(&contents).unwrap_err();
		assert!(err.to_string().contains("scheme must be http or https"));
	}

	#[test]
	fn rejects_unknown_log_level() {
		let contents = minimal_config().replace("\"log_level\": \"info\"", "\"log_level\": \"loud\"");
		let err = Config::parse(&contents).unwrap_err();
		assert!(err.to_string().contains("unexpected log_level"));
	}

	#[test]
	fn rejects_invalid_header_name() {
		let contents = minimal_config().replace(
			"\"header\": \"authorization\"",
			"\"header\": \"bad header\"",
		);
		let err = Config::parse(&contents).unwrap_err();
		assert!(err.to_string().contains("not a valid header name"));
	}

	#[test]
	fn rejects_missing_filters() {
		let err = Config::parse(r#"{"filters": []}"#).unwrap_err();
		assert!(err.to_string().contains("at least one filter"));
	}
}
