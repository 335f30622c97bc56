use aws_lc_rs::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use aws_lc_rs::hkdf;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

const COOKIE_AAD: &[u8] = b"authgate_cookie";
const NONCE_LEN: usize = 12;

/// Authenticated symmetric encryption for cookie values.
///
/// Ciphertext is an opaque URL-cookie-safe string. `decrypt` returns `None`
/// on any tampering or key mismatch.
pub trait TokenEncryptor: Send + Sync {
	fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError>;
	fn decrypt(&self, ciphertext: &str) -> Option<String>;
}

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
	#[error("encryption failed")]
	Seal,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
	#[error("invalid key material")]
	InvalidKey,
	#[error("key derivation failed")]
	Derivation,
}

/// AES-256-GCM encryptor with a random nonce per value, the nonce prefixed
/// to the ciphertext and the whole sealed value base64url-encoded.
pub struct AesGcmEncryptor {
	key: LessSafeKey,
	aad: &'static [u8],
}

impl AesGcmEncryptor {
	pub fn new(key_bytes: &[u8]) -> Result<Self, KeyError> {
		let unbound = UnboundKey::new(&AES_256_GCM, key_bytes).map_err(|_| KeyError::InvalidKey)?;
		Ok(Self {
			key: LessSafeKey::new(unbound),
			aad: COOKIE_AAD,
		})
	}

	/// Derive a dedicated AES-256 key from a shared secret with HKDF-SHA256,
	/// bound to the given scope string for key separation between filters.
	pub fn from_secret(secret: &str, scope: &str) -> Result<Self, KeyError> {
		let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, &[]);
		let prk = salt.extract(secret.as_bytes());
		let info = [scope.as_bytes()];
		let okm = prk
			.expand(&info, hkdf::HKDF_SHA256)
			.map_err(|_| KeyError::Derivation)?;
		let mut key_bytes = [0u8; 32];
		okm.fill(&mut key_bytes).map_err(|_| KeyError::Derivation)?;
		Self::new(&key_bytes)
	}
}

impl TokenEncryptor for AesGcmEncryptor {
	fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
		let mut nonce_bytes = [0u8; NONCE_LEN];
		rand::rng().fill_bytes(&mut nonce_bytes);
		let nonce = Nonce::assume_unique_for_key(nonce_bytes);

		let mut in_out = Vec::with_capacity(plaintext.len() + AES_256_GCM.tag_len());
		in_out.extend_from_slice(plaintext.as_bytes());
		self
			.key
			.seal_in_place_append_tag(nonce, Aad::from(self.aad), &mut in_out)
			.map_err(|_| EncryptionError::Seal)?;

		// Prefix the nonce so decryption can reconstruct the AEAD input.
		let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
		sealed.extend_from_slice(&nonce_bytes);
		sealed.extend_from_slice(&in_out);
		Ok(URL_SAFE_NO_PAD.encode(sealed))
	}

	fn decrypt(&self, ciphertext: &str) -> Option<String> {
		let mut data = URL_SAFE_NO_PAD.decode(ciphertext).ok()?;
		if data.len() < NONCE_LEN + AES_256_GCM.tag_len() {
			return None;
		}
		let nonce = Nonce::try_assume_unique_for_key(&data[..NONCE_LEN]).ok()?;
		let plaintext_len = {
			let in_out = &mut data[NONCE_LEN..];
			self
				.key
				.open_in_place(nonce, Aad::from(self.aad), in_out)
				.ok()?
				.len()
		};
		data.copy_within(NONCE_LEN..NONCE_LEN + plaintext_len, 0);
		data.truncate(plaintext_len);
		String::from_utf8(data).ok()
	}
}
