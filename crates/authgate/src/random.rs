use rand::TryRngCore;
use rand::rngs::OsRng;

// The URL-safe base64 alphabet. 64 divides 256, so masking a random byte to
// six bits introduces no modulo bias.
const URL_SAFE_ALPHABET: &[u8; 64] =
	b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

#[derive(Debug, thiserror::Error)]
#[error("secure random source unavailable: {0}")]
pub struct RandomError(String);

/// Cryptographically strong random strings for `state` and `nonce` values.
///
/// Bytes come from the operating system CSPRNG. There is no fallback source;
/// callers fail the request when generation errors.
#[derive(Debug, Default)]
pub struct RandomGenerator;

impl RandomGenerator {
	pub fn generate(&self, length: usize) -> Result<String, RandomError> {
		let mut bytes = vec![0u8; length];
		OsRng
			.try_fill_bytes(&mut bytes)
			.map_err(|e| RandomError(e.to_string()))?;
		Ok(
			bytes
				.iter()
				.map(|b| URL_SAFE_ALPHABET[(b & 0x3f) as usize] as char)
				.collect(),
		)
	}
}
