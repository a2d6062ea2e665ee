//! Admin API token generation.
//!
//! ```bash
//! echo "ADMIN_API_TOKEN=$(atelier-cli token)" >> .env
//! ```

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// Random bytes behind each token.
pub const TOKEN_BYTES: usize = 32;

/// A new random token: 32 bytes from the OS-seeded RNG, URL-safe base64.
#[must_use]
pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_url_safe_and_distinct() {
        let a = generate();
        let b = generate();

        // 32 bytes -> 43 unpadded base64 characters
        assert_eq!(a.len(), 43);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_ne!(a, b);
    }
}
