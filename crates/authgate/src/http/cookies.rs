use std::collections::HashMap;

use cookie::{Cookie, SameSite};
use tracing::debug;

/// A single `Set-Cookie` directive. Callers pass exactly the set they want;
/// `encode_set_cookie` injects no defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCookieDirective {
	HttpOnly,
	SameSiteLax,
	Secure,
	Path(&'static str),
	MaxAge(i64),
}

/// Encode a `Set-Cookie` header value with the given directive set.
pub fn encode_set_cookie(name: &str, value: &str, directives: &[SetCookieDirective]) -> String {
	let mut builder = Cookie::build((name, value));
	for directive in directives {
		builder = match directive {
			SetCookieDirective::HttpOnly => builder.http_only(true),
			SetCookieDirective::SameSiteLax => builder.same_site(SameSite::Lax),
			SetCookieDirective::Secure => builder.secure(true),
			SetCookieDirective::Path(path) => builder.path(*path),
			SetCookieDirective::MaxAge(seconds) => {
				builder.max_age(cookie::time::Duration::seconds(*seconds))
			},
		};
	}
	builder.build().to_string()
}

/// Decode a `Cookie` request header into a name to value mapping.
///
/// Returns `None` for an empty header or when no valid pair parses;
/// individual malformed pairs are skipped.
pub fn decode_cookies(header_value: &str) -> Option<HashMap<String, String>> {
	if header_value.trim().is_empty() {
		return None;
	}
	let mut cookies = HashMap::new();
	for cookie in Cookie::split_parse(header_value) {
		match cookie {
			Ok(cookie) => {
				cookies.insert(cookie.name().to_string(), cookie.value().to_string());
			},
			Err(e) => {
				debug!("ignoring malformed cookie: {e}");
			},
		}
	}
	if cookies.is_empty() { None } else { Some(cookies) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_multiple_cookies() {
		let cookies = decode_cookies("a=1; __Host-session=opaque; b=2").unwrap();
		assert_eq!(cookies.len(), 3);
		assert_eq!(cookies.get("__Host-session").map(String::as_str), Some("opaque"));
	}

	#[test]
	fn empty_header_decodes_to_none() {
		assert!(decode_cookies("").is_none());
		assert!(decode_cookies("   ").is_none());
	}

	#[test]
	fn malformed_pairs_are_skipped() {
		let cookies = decode_cookies("ok=1; not a cookie").unwrap();
		assert_eq!(cookies.len(), 1);
	}

	#[test]
	fn encodes_exactly_the_requested_directives() {
		let header = encode_set_cookie(
			"__Host-session",
			"opaque",
			&[
				SetCookieDirective::HttpOnly,
				SetCookieDirective::SameSiteLax,
				SetCookieDirective::Secure,
				SetCookieDirective::Path("/"),
				SetCookieDirective::MaxAge(60),
			],
		);
		assert!(header.starts_with("__Host-session=opaque"));
		assert!(header.contains("HttpOnly"));
		assert!(header.contains("SameSite=Lax"));
		assert!(header.contains("Secure"));
		assert!(header.contains("Path=/"));
		assert!(header.contains("Max-Age=60"));
	}

	#[test]
	fn encodes_no_default_directives() {
		let header = encode_set_cookie("name", "value", &[]);
		assert_eq!(header, "name=value");
	}

	#[test]
	fn max_age_zero_deletes() {
		let header = encode_set_cookie("name", "deleted", &[SetCookieDirective::MaxAge(0)]);
		assert!(header.contains("Max-Age=0"));
	}
}
