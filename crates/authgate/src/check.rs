use std::collections::HashMap;

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tracing::warn;

/// Result code of a single authorization check, mirroring the status codes
/// the host authorization interface expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	/// Let the request continue upstream.
	Ok,
	/// The check request or the OIDC protocol exchange was malformed.
	InvalidArgument,
	/// Authentication is required; the denial response carries a redirect.
	Unauthenticated,
	/// Transport failure reaching the IdP.
	Internal,
	/// The IdP rejected the exchange.
	Unknown,
}

impl Outcome {
	pub fn as_str(&self) -> &'static str {
		match self {
			Outcome::Ok => "ok",
			Outcome::InvalidArgument => "invalid_argument",
			Outcome::Unauthenticated => "unauthenticated",
			Outcome::Internal => "internal",
			Outcome::Unknown => "unknown",
		}
	}
}

/// One side of the connection the proxy reported, used only for logging.
#[derive(Debug, Clone, Default)]
pub struct Peer {
	pub principal: String,
	pub address: String,
}

/// The HTTP envelope of a check request. Header names are lower-case.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
	pub scheme: String,
	pub host: String,
	pub path: String,
	pub headers: HashMap<String, String>,
}

/// An authorization check request as handed to the filter chain.
#[derive(Debug, Clone, Default)]
pub struct CheckRequest {
	/// Absent when the proxy sent no HTTP attributes.
	pub http: Option<HttpRequest>,
	pub source: Option<Peer>,
	pub destination: Option<Peer>,
}

/// The response a filter chain builds up. Filters populate either the ok side
/// (headers injected into the upstream request) or the denied side (a status
/// and headers returned directly to the user-agent), never both.
#[derive(Debug, Default)]
pub struct CheckResponse {
	pub ok_headers: HeaderMap,
	pub denied_status: Option<StatusCode>,
	pub denied_headers: HeaderMap,
}

impl CheckResponse {
	pub fn add_ok_header(&mut self, name: &str, value: &str) {
		Self::append(&mut self.ok_headers, name, value);
	}

	pub fn add_denied_header(&mut self, name: &str, value: &str) {
		Self::append(&mut self.denied_headers, name, value);
	}

	fn append(headers: &mut HeaderMap, name: &str, value: &str) {
		let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
			warn!(header = name, "skipping invalid header name");
			return;
		};
		// Never log the value; identity headers and cookies carry tokens.
		let Ok(value) = HeaderValue::from_str(value) else {
			warn!(header = %name, "skipping header with invalid value");
			return;
		};
		headers.append(name, value);
	}
}
