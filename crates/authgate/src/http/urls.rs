use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use url::form_urlencoded;

use crate::config::Endpoint;

/// Assemble `scheme://host[:port]/path` from a structured endpoint.
pub fn to_url(endpoint: &Endpoint) -> String {
	match endpoint.port {
		Some(port) => format!(
			"{}://{}:{}{}",
			endpoint.scheme, endpoint.hostname, port, endpoint.path
		),
		None => format!("{}://{}{}", endpoint.scheme, endpoint.hostname, endpoint.path),
	}
}

/// Percent-encode key/value pairs joined with `&`, preserving insertion
/// order. Queries and `application/x-www-form-urlencoded` bodies share this
/// wire format.
pub fn encode_query<'a, I>(params: I) -> String
where
	I: IntoIterator<Item = (&'a str, &'a str)>,
{
	let mut serializer = form_urlencoded::Serializer::new(String::new());
	for (name, value) in params {
		serializer.append_pair(name, value);
	}
	serializer.finish()
}

/// Decode a query string into a name to value mapping.
///
/// Returns `None` on malformed input (an empty string or a pair without `=`).
pub fn decode_query(query: &str) -> Option<HashMap<String, String>> {
	if query.is_empty() {
		return None;
	}
	let mut decoded = HashMap::new();
	for pair in query.split('&') {
		pair.split_once('=')?;
		let (name, value) = form_urlencoded::parse(pair.as_bytes()).next()?;
		decoded.insert(name.into_owned(), value.into_owned());
	}
	Some(decoded)
}

/// Encode an `application/x-www-form-urlencoded` body.
pub fn encode_form<'a, I>(params: I) -> String
where
	I: IntoIterator<Item = (&'a str, &'a str)>,
{
	encode_query(params)
}

/// Decode an `application/x-www-form-urlencoded` body.
pub fn decode_form(body: &str) -> Option<HashMap<String, String>> {
	decode_query(body)
}

/// Split a request path at the first `?` into path and raw query.
pub fn decode_path(path: &str) -> (&str, &str) {
	match path.split_once('?') {
		Some((path, query)) => (path, query),
		None => (path, ""),
	}
}

/// Encode an HTTP basic authorization header value.
pub fn encode_basic_auth(username: &str, password: &str) -> String {
	format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}
