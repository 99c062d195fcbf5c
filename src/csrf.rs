use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

/// Generates a single-use CSRF token for the consent/registration/namespace forms
/// (§4.6/§7). Stored on the session record and matched against the form field on the
/// next POST; the caller is responsible for clearing it after use.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn tokens_match(stored: Option<&str>, submitted: &str) -> bool {
    match stored {
        Some(stored) => constant_time_eq(stored.as_bytes(), submitted.as_bytes()),
        None => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_token_passes() {
        let token = generate_token();
        assert!(tokens_match(Some(&token), &token));
    }

    #[test]
    fn mismatched_token_fails() {
        let token = generate_token();
        assert!(!tokens_match(Some(&token), "not-the-token"));
    }

    #[test]
    fn missing_stored_token_fails() {
        assert!(!tokens_match(None, "anything"));
    }
}
