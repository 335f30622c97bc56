pub mod state_cookie_codec;
pub mod token_response;


use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::check::{CheckRequest, CheckResponse, HttpRequest, Outcome};
use crate::client::HttpClient;
use crate::config::OidcConfig;
use crate::filters::Filter;
use crate::filters::oidc::state_cookie_codec::StateCookieCodec;
use crate::filters::oidc::token_response::TokenResponseParser;
use crate::http::cookies::{self, SetCookieDirective};
use crate::http::urls;
use crate::random::RandomGenerator;
use crate::session::TokenEncryptor;

const FILTER_NAME: &str = "oidc";
const MANDATORY_SCOPE: &str = "openid";
const STATE_TOKEN_LENGTH: usize = 32;

/// An OpenID Connect token acquisition filter.
///
/// Performs agent redirection and token acquisition using the Authorization
/// Code flow. See https://openid.net/specs/openid-connect-core-1_0.html.
pub struct OidcFilter {
	http: Arc<dyn HttpClient>,
	config: OidcConfig,
	parser: Arc<dyn TokenResponseParser>,
	cryptor: Arc<dyn TokenEncryptor>,
}

impl OidcFilter {
	pub fn new(
		http: Arc<dyn HttpClient>,
		config: OidcConfig,
		parser: Arc<dyn TokenResponseParser>,
		cryptor: Arc<dyn TokenEncryptor>,
	) -> Self {
		Self {
			http,
			config,
			parser,
			cryptor,
		}
	}

	fn cookie_name(&self, kind: &str) -> String {
		if self.config.cookie_name_prefix.is_empty() {
			return format!("__Host-authservice-{kind}-cookie");
		}
		format!(
			"__Host-{}-authservice-{kind}-cookie",
			self.config.cookie_name_prefix
		)
	}

	pub fn state_cookie_name(&self) -> String {
		self.cookie_name("state")
	}

	pub fn id_token_cookie_name(&self) -> String {
		self.cookie_name("id-token")
	}

	pub fn access_token_cookie_name(&self) -> String {
		self.cookie_name("access-token")
	}

	fn cookie_from_headers(
		&self,
		headers: &HashMap<String, String>,
		cookie: &str,
	) -> Option<String> {
		let cookie_header = headers.get(header::COOKIE.as_str())?;
		let cookies = cookies::decode_cookies(cookie_header)?;
		cookies.get(cookie).cloned()
	}

	fn set_state_cookie(&self, response: &mut CheckResponse, value: &str, max_age: i64) {
		let set_cookie = cookies::encode_set_cookie(
			&self.state_cookie_name(),
			value,
			&session_cookie_directives(max_age),
		);
		response.add_denied_header(header::SET_COOKIE.as_str(), &set_cookie);
	}

	/// Accept an existing session carried in encrypted cookies, or return
	/// `None` to start the authentication redirection dance.
	fn accept_session_cookies(
		&self,
		http_request: &HttpRequest,
		response: &mut CheckResponse,
	) -> Option<Outcome> {
		let id_token_cookie =
			self.cookie_from_headers(&http_request.headers, &self.id_token_cookie_name())?;
		let Some(id_token) = self.cryptor.decrypt(&id_token_cookie) else {
			info!("id token cookie decryption failed");
			return None;
		};

		let Some(access_token_config) = &self.config.access_token else {
			response.add_ok_header(
				&self.config.id_token.header,
				&encode_header_value(&self.config.id_token.preamble, &id_token),
			);
			return Some(Outcome::Ok);
		};

		// Both cookies must decrypt before either header is injected.
		let Some(access_token_cookie) =
			self.cookie_from_headers(&http_request.headers, &self.access_token_cookie_name())
		else {
			info!("access token cookie missing");
			return None;
		};
		let Some(access_token) = self.cryptor.decrypt(&access_token_cookie) else {
			info!("access token cookie decryption failed");
			return None;
		};
		response.add_ok_header(
			&self.config.id_token.header,
			&encode_header_value(&self.config.id_token.preamble, &id_token),
		);
		response.add_ok_header(
			&access_token_config.header,
			&encode_header_value(&access_token_config.preamble, &access_token),
		);
		Some(Outcome::Ok)
	}

	/// Redirect the requesting agent to the IdP authorization endpoint,
	/// binding the browser session with an encrypted state cookie.
	fn redirect_to_idp(&self, response: &mut CheckResponse) -> Outcome {
		let generator = RandomGenerator;
		let state = match generator.generate(STATE_TOKEN_LENGTH) {
			Ok(state) => state,
			Err(err) => {
				info!("state generation failed: {err}");
				return Outcome::Internal;
			},
		};
		let nonce = match generator.generate(STATE_TOKEN_LENGTH) {
			Ok(nonce) => nonce,
			Err(err) => {
				info!("nonce generation failed: {err}");
				return Outcome::Internal;
			},
		};

		let mut scopes: BTreeSet<&str> = BTreeSet::from([MANDATORY_SCOPE]);
		for scope in &self.config.scopes {
			scopes.insert(scope.as_str());
		}
		let encoded_scopes = scopes.into_iter().collect::<Vec<_>>().join(" ");

		let callback = urls::to_url(&self.config.callback);
		let query = urls::encode_query([
			("response_type", "code"),
			("scope", encoded_scopes.as_str()),
			("client_id", self.config.client_id.as_str()),
			("nonce", nonce.as_str()),
			("state", state.as_str()),
			("redirect_uri", callback.as_str()),
		]);
		set_redirect_headers(
			&format!(
				"{}?{}",
				urls::to_url(&self.config.authorization_endpoint),
				query
			),
			response,
		);

		let state_token = StateCookieCodec.encode(&state, &nonce);
		let encrypted_state_token = match self.cryptor.encrypt(&state_token) {
			Ok(encrypted) => encrypted,
			Err(err) => {
				info!("state cookie encryption failed: {err}");
				return Outcome::Internal;
			},
		};
		self.set_state_cookie(response, &encrypted_state_token, self.config.timeout);
		Outcome::Unauthenticated
	}

	/// Complete the authorization-code exchange against the IdP token
	/// endpoint and install the session cookies.
	async fn retrieve_token(
		&self,
		http_request: &HttpRequest,
		response: &mut CheckResponse,
		query: &str,
	) -> Outcome {
		// Best effort at deleting the state cookie for all cases.
		self.set_state_cookie(response, "deleted", 0);

		let Some(encrypted_state_cookie) =
			self.cookie_from_headers(&http_request.headers, &self.state_cookie_name())
		else {
			info!("missing state cookie");
			return Outcome::InvalidArgument;
		};
		let Some(state_cookie) = self.cryptor.decrypt(&encrypted_state_cookie) else {
			info!("invalid state cookie");
			return Outcome::InvalidArgument;
		};
		let Some((state, nonce)) = StateCookieCodec.decode(&state_cookie) else {
			info!("invalid state cookie encoding");
			return Outcome::InvalidArgument;
		};

		let Some(query_data) = urls::decode_query(query) else {
			info!("callback query string is invalid");
			return Outcome::InvalidArgument;
		};
		let (Some(query_state), Some(code)) = (query_data.get("state"), query_data.get("code"))
		else {
			info!("callback query does not contain expected state and code parameters");
			return Outcome::InvalidArgument;
		};
		if !constant_time_eq(query_state, state) {
			info!("mismatched state on callback");
			return Outcome::InvalidArgument;
		}

		let mut headers = HeaderMap::new();
		headers.insert(
			header::CONTENT_TYPE,
			HeaderValue::from_static("application/x-www-form-urlencoded"),
		);
		let authorization = urls::encode_basic_auth(
			&self.config.client_id,
			self.config.client_secret.expose_secret(),
		);
		match HeaderValue::from_str(&authorization) {
			Ok(value) => {
				headers.insert(header::AUTHORIZATION, value);
			},
			Err(_) => {
				info!("client credentials are not header-safe");
				return Outcome::Internal;
			},
		}

		let redirect_uri = urls::to_url(&self.config.callback);
		let body = urls::encode_form([
			("code", code.as_str()),
			("redirect_uri", redirect_uri.as_str()),
			("grant_type", "authorization_code"),
		]);

		let Some(token_endpoint_response) = self
			.http
			.post(&self.config.token_endpoint, headers, body)
			.await
		else {
			info!("IdP connection error");
			return Outcome::Internal;
		};
		if token_endpoint_response.status != 200 {
			info!(
				status = token_endpoint_response.status,
				"IdP token endpoint rejected the exchange"
			);
			return Outcome::Unknown;
		}

		let Some(token) = self.parser.parse(
			&self.config.client_id,
			nonce,
			&token_endpoint_response.body,
		) else {
			info!("invalid token response");
			return Outcome::InvalidArgument;
		};

		// Session cookies live as long as the tokens. Saturate when the IdP
		// reported no lifetime; browsers clamp the value silently.
		let max_age = token.expiry().unwrap_or(i64::MAX);
		let directives = session_cookie_directives(max_age);

		if self.config.access_token.is_some() {
			let Some(access_token) = token.access_token() else {
				info!("missing expected access_token");
				return Outcome::InvalidArgument;
			};
			let cookie_value = match self.cryptor.encrypt(access_token) {
				Ok(value) => value,
				Err(err) => {
					info!("access token encryption failed: {err}");
					return Outcome::Internal;
				},
			};
			let set_cookie = cookies::encode_set_cookie(
				&self.access_token_cookie_name(),
				&cookie_value,
				&directives,
			);
			response.add_denied_header(header::SET_COOKIE.as_str(), &set_cookie);
		}

		set_redirect_headers(&self.config.landing_page, response);
		let cookie_value = match self.cryptor.encrypt(token.id_token_jwt()) {
			Ok(value) => value,
			Err(err) => {
				info!("id token encryption failed: {err}");
				return Outcome::Internal;
			},
		};
		let set_cookie =
			cookies::encode_set_cookie(&self.id_token_cookie_name(), &cookie_value, &directives);
		response.add_denied_header(header::SET_COOKIE.as_str(), &set_cookie);
		Outcome::Unauthenticated
	}
}

#[async_trait]
impl Filter for OidcFilter {
	async fn process(&self, request: &CheckRequest, response: &mut CheckResponse) -> Outcome {
		if let (Some(source), Some(destination)) = (&request.source, &request.destination) {
			debug!(
				"check from {}@{} to {}@{}",
				source.principal, source.address, destination.principal, destination.address
			);
		}
		let Some(http_request) = &request.http else {
			info!("missing http attributes in check request");
			set_standard_response_headers(response);
			return Outcome::InvalidArgument;
		};

		// Reject plaintext requests when the policy demands TLS.
		if self.config.enforce_https && http_request.scheme != "https" {
			info!(scheme = %http_request.scheme, "rejecting non-https request");
			set_standard_response_headers(response);
			return Outcome::InvalidArgument;
		}

		// An existing identity header means an upstream authenticator already
		// ran; it is up to the downstream system to validate it.
		if http_request
			.headers
			.contains_key(&self.config.id_token.header.to_ascii_lowercase())
		{
			return Outcome::Ok;
		}

		if let Some(outcome) = self.accept_session_cookies(http_request, response) {
			return outcome;
		}

		set_standard_response_headers(response);

		// Log the query-stripped path only; callback queries carry the state
		// and authorization code.
		let (path, query) = urls::decode_path(&http_request.path);
		debug!(
			"checking handler for {}://{}{}",
			http_request.scheme, http_request.host, path
		);
		if http_request.host == self.config.callback.hostname
			&& path == self.config.callback.path
		{
			return self.retrieve_token(http_request, response, query).await;
		}
		self.redirect_to_idp(response)
	}

	fn name(&self) -> &'static str {
		FILTER_NAME
	}
}

/// The full directive set every session-scoped cookie is issued with.
fn session_cookie_directives(max_age: i64) -> Vec<SetCookieDirective> {
	vec![
		SetCookieDirective::HttpOnly,
		SetCookieDirective::SameSiteLax,
		SetCookieDirective::Secure,
		SetCookieDirective::Path("/"),
		SetCookieDirective::MaxAge(max_age),
	]
}

fn set_standard_response_headers(response: &mut CheckResponse) {
	response
		.denied_headers
		.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
	response
		.denied_headers
		.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
}

fn set_redirect_headers(redirect_url: &str, response: &mut CheckResponse) {
	response.denied_status = Some(StatusCode::FOUND);
	if let Ok(value) = HeaderValue::from_str(redirect_url) {
		response.denied_headers.insert(header::LOCATION, value);
	}
}

fn encode_header_value(preamble: &str, value: &str) -> String {
	if preamble.is_empty() {
		return value.to_string();
	}
	format!("{preamble} {value}")
}

pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
	if a.len() != b.len() {
		return false;
	}
	a.bytes()
		.zip(b.bytes())
		.fold(0u8, |acc, (x, y)| acc | (x ^ y))
		== 0
}
