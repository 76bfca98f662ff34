//! Signed cookie envelopes.
//!
//! A sealed value is `base64url(json{data, exp}) . base64url(hmac-sha256)`,
//! signed over the encoded body. Clients can read but not mint or alter one;
//! anything that fails verification, decoding or the expiry check opens as
//! `None`, which callers treat as "no cookie".

use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Serialize, de::DeserializeOwned};
use sha2::Sha256;

use crate::crypto::SigningKey;
use crate::errors::Result;

type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize)]
struct SealClaims<'a, T: Serialize> {
    data: &'a T,
    exp: i64,
}

#[derive(serde::Deserialize)]
struct OpenClaims<T> {
    data: T,
    exp: i64,
}

/// Sign `data` into an envelope that expires `max_age` from now.
pub fn seal<T: Serialize>(key: &SigningKey, data: &T, max_age: Duration) -> Result<String> {
    let exp = Utc::now()
        .timestamp()
        .saturating_add(max_age.as_secs() as i64);
    let payload = serde_json::to_vec(&SealClaims { data, exp })?;
    let body = URL_SAFE_NO_PAD.encode(payload);
    let tag = sign(key, body.as_bytes());
    Ok(format!("{body}.{tag}"))
}

/// Verify and decode an envelope. `None` for any forged, malformed or
/// expired token.
pub fn open<T: DeserializeOwned>(key: &SigningKey, token: &str) -> Option<T> {
    let (body, tag) = token.rsplit_once('.')?;
    let tag_bytes = URL_SAFE_NO_PAD.decode(tag).ok()?;

    let mut mac = mac_for(key);
    mac.update(body.as_bytes());
    mac.verify_slice(&tag_bytes).ok()?;

    let payload = URL_SAFE_NO_PAD.decode(body).ok()?;
    let claims: OpenClaims<T> = serde_json::from_slice(&payload).ok()?;
    if claims.exp <= Utc::now().timestamp() {
        return None;
    }
    Some(claims.data)
}

fn sign(key: &SigningKey, message: &[u8]) -> String {
    let mut mac = mac_for(key);
    mac.update(message);
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

fn mac_for(key: &SigningKey) -> HmacSha256 {
    HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Payload {
        session_id: String,
    }

    fn payload() -> Payload {
        Payload {
            session_id: "abc123".to_string(),
        }
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = SigningKey::generate();
        let token = seal(&key, &payload(), Duration::from_secs(60)).unwrap();
        let opened: Payload = open(&key, &token).unwrap();
        assert_eq!(opened, payload());
    }

    #[test]
    fn wrong_key_opens_nothing() {
        let token = seal(&SigningKey::generate(), &payload(), Duration::from_secs(60)).unwrap();
        assert!(open::<Payload>(&SigningKey::generate(), &token).is_none());
    }

    #[test]
    fn tampered_body_opens_nothing() {
        let key = SigningKey::generate();
        let token = seal(&key, &payload(), Duration::from_secs(60)).unwrap();

        let (body, tag) = token.rsplit_once('.').unwrap();
        let mut bytes = URL_SAFE_NO_PAD.decode(body).unwrap();
        bytes[10] ^= 0x01;
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(bytes), tag);

        assert!(open::<Payload>(&key, &forged).is_none());
    }

    #[test]
    fn tampered_signature_opens_nothing() {
        let key = SigningKey::generate();
        let token = seal(&key, &payload(), Duration::from_secs(60)).unwrap();
        let forged = format!("{}{}", token, "x");
        assert!(open::<Payload>(&key, &forged).is_none());
    }

    #[test]
    fn expired_token_opens_nothing() {
        let key = SigningKey::generate();
        let token = seal(&key, &payload(), Duration::ZERO).unwrap();
        assert!(open::<Payload>(&key, &token).is_none());
    }

    #[test]
    fn garbage_opens_nothing() {
        let key = SigningKey::generate();
        assert!(open::<Payload>(&key, "").is_none());
        assert!(open::<Payload>(&key, "no-dot-here").is_none());
        assert!(open::<Payload>(&key, "not base64.not base64").is_none());
    }
}
