// Separator between the state and nonce values. The random generator's
// URL-safe alphabet can never produce it.
const DELIMITER: char = ';';

/// Serializes the `(state, nonce)` pair into an opaque string and back.
///
/// The codec is a pure function; encryption of the encoded value is the
/// caller's concern.
#[derive(Debug, Default)]
pub struct StateCookieCodec;

impl StateCookieCodec {
	pub fn encode(&self, state: &str, nonce: &str) -> String {
		format!("{state}{DELIMITER}{nonce}")
	}

	pub fn decode<'a>(&self, value: &'a str) -> Option<(&'a str, &'a str)> {
		let (state, nonce) = value.split_once(DELIMITER)?;
		if state.is_empty() || nonce.is_empty() || nonce.contains(DELIMITER) {
			return None;
		}
		Some((state, nonce))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use crate::random::RandomGenerator;

	#[test]
	fn round_trips() {
		let codec = StateCookieCodec;
		assert_eq!(codec.decode(&codec.encode("state", "nonce")), Some(("state", "nonce")));
	}

	#[test]
	fn round_trips_random_values() {
		let codec = StateCookieCodec;
		let generator = RandomGenerator;
		let state = generator.generate(32).unwrap();
		let nonce = generator.generate(32).unwrap();
		assert_eq!(
			codec.decode(&codec.encode(&state, &nonce)),
			Some((state.as_str(), nonce.as_str()))
		);
	}

	#[test]
	fn rejects_malformed_values() {
		let codec = StateCookieCodec;
		assert_eq!(codec.decode(""), None);
		assert_eq!(codec.decode("no-delimiter"), None);
		assert_eq!(codec.decode(";nonce"), None);
		assert_eq!(codec.decode("state;"), None);
		assert_eq!(codec.decode("state;nonce;extra"), None);
	}
}
