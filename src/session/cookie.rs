use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

pub const SESSION_COOKIE_NAME: &str = "portal-auth.cookie.sid";

type HmacSha256 = Hmac<Sha256>;

/// Mints a fresh session id and its HMAC-signed cookie value (§6): `<id>.<signature>`,
/// following the teacher's `utils::secret` SHA256+base64 style but keyed (HMAC) rather
/// than bare-hashed, since a cookie must be verifiable without a lookup.
pub fn mint_cookie(secret: &str) -> (String, String) {
    let session_id = Uuid::new_v4().to_string();
    let signature = sign(&session_id, secret);
    (session_id.clone(), format!("{}.{}", session_id, signature))
}

/// Verifies a cookie value against the configured secret, returning the session id on
/// success. An absent or invalid cookie is not an error — `CheckSession` in the flow
/// orchestrator simply treats it as "not logged in" (§4.9).
pub fn verify_cookie(value: &str, secret: &str) -> Option<String> {
    let (session_id, signature) = value.split_once('.')?;
    let expected = sign(session_id, secret);
    if constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
        Some(session_id.to_string())
    } else {
        None
    }
}

fn sign(session_id: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(session_id.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
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
    fn mint_then_verify_roundtrips() {
        let secret = "test-secret";
        let (session_id, cookie_value) = mint_cookie(secret);
        assert_eq!(verify_cookie(&cookie_value, secret), Some(session_id));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let secret = "test-secret";
        let (_, cookie_value) = mint_cookie(secret);
        let tampered = format!("{}x", cookie_value);
        assert_eq!(verify_cookie(&tampered, secret), None);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (_, cookie_value) = mint_cookie("secret-a");
        assert_eq!(verify_cookie(&cookie_value, "secret-b"), None);
    }
}
