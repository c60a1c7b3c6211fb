//! Public share token generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// Generate a URL-safe token from `bytes` bytes of OS randomness.
///
/// 16 bytes yield a 22 character token.
pub fn generate_token(bytes: usize) -> String {
    let mut raw = vec![0u8; bytes.max(1)];
    rand::rng().fill_bytes(&mut raw);
    URL_SAFE_NO_PAD.encode(raw)
}
