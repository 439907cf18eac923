//! CSRF state for the authorization request
//!
//! The `state` parameter is an opaque random value sent with the
//! authorization URL. The authorization server returns it unchanged on the
//! redirect, so the callback listener can reject redirects it did not start.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;

/// Generate a random state value: 32 bytes as URL-safe base64 (no padding).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare a returned state with the expected one without early exit.
pub fn state_matches(expected: &str, returned: &str) -> bool {
    let (a, b) = (expected.as_bytes(), returned.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_url_safe_base64() {
        let state = generate_state();
        // 32 bytes → 43 base64url chars (no padding)
        assert_eq!(state.len(), 43);
        assert!(
            state
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "state must be URL-safe base64 (no padding): {state}"
        );
    }

    #[test]
    fn states_are_unique() {
        assert_ne!(generate_state(), generate_state());
    }

    #[test]
    fn state_matches_only_identical_values() {
        let state = generate_state();
        assert!(state_matches(&state, &state.clone()));
        assert!(!state_matches(&state, "other"));
        assert!(!state_matches(&state, ""));
        assert!(!state_matches("abc", "abd"));
    }

    #[test]
    fn state_decodes_to_32_bytes() {
        let decoded = URL_SAFE_NO_PAD.decode(generate_state()).expect("valid base64url");
        assert_eq!(decoded.len(), 32);
    }
}
