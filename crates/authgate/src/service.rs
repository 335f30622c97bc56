use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use http::{HeaderName, HeaderValue, StatusCode};
use secrecy::ExposeSecret;
use tracing::info;

use crate::check::{CheckRequest, CheckResponse, HttpRequest, Outcome};
use crate::client::ReqwestHttpClient;
use crate::config::Config;
use crate::filters::oidc::OidcFilter;
use crate::filters::oidc::token_response::JwksTokenResponseParser;
use crate::filters::{Filter, Pipe};
use crate::session::AesGcmEncryptor;

const TOKEN_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(10);
const OUTCOME_HEADER: HeaderName = HeaderName::from_static("x-authgate-outcome");

/// The authorization check service: a filter chain behind the proxy's
/// external-authorization HTTP interface.
pub struct AuthService {
	pipe: Pipe,
}

impl AuthService {
	pub fn new(config: &Config) -> anyhow::Result<Self> {
		let http = Arc::new(ReqwestHttpClient::new(TOKEN_ENDPOINT_TIMEOUT)?);
		let mut pipe = Pipe::new();
		for filter_config in &config.filters {
			let parser = Arc::new(JwksTokenResponseParser::new(
				&filter_config.jwks,
				&filter_config.issuer,
			)?);
			// Key separation: bind each filter's cookie key to its issuer and
			// client.
			let scope = format!(
				"authgate_cookie|issuer={}|client_id={}",
				filter_config.issuer, filter_config.client_id
			);
			let cryptor = Arc::new(AesGcmEncryptor::from_secret(
				filter_config.client_secret.expose_secret(),
				&scope,
			)?);
			pipe.add_filter(Box::new(OidcFilter::new(
				http.clone(),
				filter_config.clone(),
				parser,
				cryptor,
			)));
		}
		Ok(Self { pipe })
	}

	pub async fn check(&self, request: &CheckRequest) -> (Outcome, CheckResponse) {
		let mut response = CheckResponse::default();
		let outcome = self.pipe.process(request, &mut response).await;
		(outcome, response)
	}
}

pub fn build_router(service: Arc<AuthService>) -> Router {
	Router::new().fallback(check_handler).with_state(service)
}

/// Bind the configured address and serve checks until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
	let addr = config.listen_addr();
	let service = Arc::new(AuthService::new(&config)?);
	let listener = tokio::net::TcpListener::bind(&addr).await?;
	info!("server listening on {addr}");
	axum::serve(listener, build_router(service)).await?;
	Ok(())
}

async fn check_handler(State(service): State<Arc<AuthService>>, request: Request) -> Response {
	let check_request = check_request_from_http(&request);
	let (outcome, check_response) = service.check(&check_request).await;
	into_http_response(outcome, check_response)
}

fn check_request_from_http(request: &Request) -> CheckRequest {
	let headers: HashMap<String, String> = request
		.headers()
		.iter()
		.filter_map(|(name, value)| {
			value
				.to_str()
				.ok()
				.map(|value| (name.as_str().to_string(), value.to_string()))
		})
		.collect();
	let scheme = headers
		.get("x-forwarded-proto")
		.cloned()
		.or_else(|| request.uri().scheme_str().map(ToOwned::to_owned))
		.unwrap_or_else(|| "https".to_string());
	let host = headers
		.get("host")
		.cloned()
		.or_else(|| request.uri().host().map(ToOwned::to_owned))
		.unwrap_or_default();
	let path = request
		.uri()
		.path_and_query()
		.map(|path_and_query| path_and_query.as_str().to_string())
		.unwrap_or_else(|| request.uri().path().to_string());
	CheckRequest {
		http: Some(HttpRequest {
			scheme,
			host,
			path,
			headers,
		}),
		source: None,
		destination: None,
	}
}

/// Map the filter outcome onto the external-authorization HTTP protocol:
/// allowed checks answer 200 with the headers to add, denials answer with
/// the denial status and headers, passed through to the user-agent.
fn into_http_response(outcome: Outcome, check_response: CheckResponse) -> Response {
	let status = match outcome {
		Outcome::Ok => StatusCode::OK,
		Outcome::Unauthenticated => check_response
			.denied_status
			.unwrap_or(StatusCode::UNAUTHORIZED),
		Outcome::InvalidArgument => StatusCode::BAD_REQUEST,
		Outcome::Internal => StatusCode::INTERNAL_SERVER_ERROR,
		Outcome::Unknown => StatusCode::BAD_GATEWAY,
	};
	let headers = match outcome {
		Outcome::Ok => check_response.ok_headers,
		_ => check_response.denied_headers,
	};
	let mut response = Response::new(Body::empty());
	*response.status_mut() = status;
	response.headers_mut().extend(headers);
	response
		.headers_mut()
		.insert(OUTCOME_HEADER, HeaderValue::from_static(outcome.as_str()));
	response
}

#[cfg(test)]
mod tests {
	use http::header;
	use tower::ServiceExt;

	use super::*;

	fn test_config() -> Config {
		Config::parse(
			r#"{
				"listen_address": "127.0.0.1",
				"listen_port": 0,
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
			}"#,
		)
		.unwrap()
	}

	fn router() -> Router {
		build_router(Arc::new(AuthService::new(&test_config()).unwrap()))
	}

	#[tokio::test]
	async fn bypass_header_allows_with_ok_outcome() {
		let request = http::Request::builder()
			.uri("/foo")
			.header(header::HOST, "app")
			.header(header::AUTHORIZATION, "Bearer upstream")
			.body(Body::empty())
			.unwrap();
		let response = router().oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(response.headers().get(OUTCOME_HEADER).unwrap(), "ok");
	}

	#[tokio::test]
	async fn unauthenticated_request_is_redirected_to_the_idp() {
		let request = http::Request::builder()
			.uri("/foo")
			.header(header::HOST, "app")
			.header("x-forwarded-proto", "https")
			.body(Body::empty())
			.unwrap();
		let response = router().oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::FOUND);
		assert_eq!(
			response.headers().get(OUTCOME_HEADER).unwrap(),
			"unauthenticated"
		);
		let location = response
			.headers()
			.get(header::LOCATION)
			.unwrap()
			.to_str()
			.unwrap();
		assert!(location.starts_with("https://idp/auth?"));
		let state_cookie = response
			.headers()
			.get(header::SET_COOKIE)
			.unwrap()
			.to_str()
			.unwrap();
		assert!(state_cookie.starts_with("__Host-authservice-state-cookie="));
	}

	#[tokio::test]
	async fn callback_without_state_cookie_is_bad_request() {
		let request = http::Request::builder()
			.uri("/cb?state=S&code=K")
			.header(header::HOST, "app")
			.body(Body::empty())
			.unwrap();
		let response = router().oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(
			response.headers().get(OUTCOME_HEADER).unwrap(),
			"invalid_argument"
		);
		assert_eq!(
			response.headers().get(header::CACHE_CONTROL).unwrap(),
			"no-cache"
		);
	}
}
