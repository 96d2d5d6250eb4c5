use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::models::auth::Claims;
use crate::services::auth::AuthError;

/// Stateless codec for the HS256 access token. The algorithm is pinned —
/// the `alg` field of a presented token is never trusted.
#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
}

impl TokenCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Serialize and sign claims. Deterministic for identical claims.
    pub fn issue(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|_| AuthError::BadSignature)
    }

    /// Verify signature and expiry, returning the decoded claims.
    ///
    /// Fails closed: expiry maps to `Expired`, a wrong segment count to
    /// `MalformedToken`, and every other failure (bad base64, bad JSON,
    /// HMAC mismatch) to `BadSignature` so callers cannot distinguish why
    /// verification failed.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if token.split('.').count() != 3 {
            return Err(AuthError::MalformedToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::BadSignature,
        })?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;
    use chrono::Utc;

    fn sample_claims(exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            user_id: 42,
            username: "alice".to_string(),
            login_role: UserRole::Buyer,
            session_id: Some(7),
            iat: now,
            exp: now + exp_offset,
        }
    }

    #[test]
    fn issue_then_verify_round_trips() {
        let codec = TokenCodec::new("test-secret");
        let claims = sample_claims(3600);
        let token = codec.issue(&claims).unwrap();
        assert_eq!(codec.verify(&token).unwrap(), claims);
    }

    #[test]
    fn wire_payload_uses_contract_key_names() {
        let codec = TokenCodec::new("test-secret");
        let token = codec.issue(&sample_claims(3600)).unwrap();
        let payload_b64 = token.split('.').nth(1).unwrap();

        let payload: serde_json::Value = base64_decode::decode_segment(payload_b64);
        assert_eq!(payload["user_id"], 42);
        assert_eq!(payload["username"], "alice");
        assert_eq!(payload["login_role"], "buyer");
        assert_eq!(payload["session_id"], 7);
        assert!(payload["iat"].is_i64());
        assert!(payload["exp"].is_i64());
    }

    #[test]
    fn null_session_id_serializes_as_null() {
        let codec = TokenCodec::new("test-secret");
        let mut claims = sample_claims(3600);
        claims.session_id = None;
        let token = codec.issue(&claims).unwrap();
        let payload: serde_json::Value =
            base64_decode::decode_segment(token.split('.').nth(1).unwrap());
        assert!(payload["session_id"].is_null());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let codec = TokenCodec::new("test-secret");
        let token = codec.issue(&sample_claims(3600)).unwrap();
        let (head, sig) = token.rsplit_once('.').unwrap();
        // Flip one character of the signature segment
        let flipped = if sig.as_bytes()[0] == b'A' { 'B' } else { 'A' };
        let mut tampered_sig = sig.to_string();
        tampered_sig.replace_range(0..1, &flipped.to_string());
        let tampered = format!("{head}.{tampered_sig}");
        assert!(matches!(codec.verify(&tampered), Err(AuthError::BadSignature)));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let codec = TokenCodec::new("test-secret");
        let other = TokenCodec::new("other-secret");
        let token = codec.issue(&sample_claims(3600)).unwrap();
        assert!(matches!(other.verify(&token), Err(AuthError::BadSignature)));
    }

    #[test]
    fn expired_claims_fail_even_with_valid_signature() {
        let codec = TokenCodec::new("test-secret");
        let token = codec.issue(&sample_claims(-10)).unwrap();
        assert!(matches!(codec.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        let codec = TokenCodec::new("test-secret");
        assert!(matches!(codec.verify("abc.def"), Err(AuthError::MalformedToken)));
        assert!(matches!(codec.verify("a.b.c.d"), Err(AuthError::MalformedToken)));
        assert!(matches!(codec.verify(""), Err(AuthError::MalformedToken)));
    }

    #[test]
    fn garbage_segments_fail_closed_as_bad_signature() {
        let codec = TokenCodec::new("test-secret");
        assert!(matches!(
            codec.verify("not-base64!.also-not!.nope!"),
            Err(AuthError::BadSignature)
        ));
    }

    // Minimal base64url decoding for payload inspection in tests.
    mod base64_decode {
        pub fn decode_segment(seg: &str) -> serde_json::Value {
            let mut table = [255u8; 256];
            const ALPHABET: &[u8] =
                b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
            for (i, &c) in ALPHABET.iter().enumerate() {
                table[c as usize] = i as u8;
            }
            let mut out = Vec::new();
            let mut buf = 0u32;
            let mut bits = 0;
            for &c in seg.as_bytes() {
                let v = table[c as usize];
                assert_ne!(v, 255, "invalid base64url character");
                buf = (buf << 6) | v as u32;
                bits += 6;
                if bits >= 8 {
                    bits -= 8;
                    out.push((buf >> bits) as u8);
                }
            }
            serde_json::from_slice(&out).unwrap()
        }
    }
}
