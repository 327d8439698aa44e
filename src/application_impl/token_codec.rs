use crate::application_port::{AuthError, InvalidTokenReason};
use crate::domain_model::{User, UserId};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Identity-token claims: the sanitized user snapshot plus standard times.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub user: User,
    pub iat: i64,
    pub exp: i64,
}

/// Refresh-token claims carry only the user id and a random token id. The
/// token id is what the revocation store tracks.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub uid: UserId,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug)]
pub struct MintedRefreshToken {
    pub token: String,
    pub token_id: String,
    pub expires_in: Duration,
}

pub fn mint_identity_token(
    user: &User,
    key: &EncodingKey,
    ttl: Duration,
) -> Result<String, AuthError> {
    let iat_dt = Utc::now();
    let exp_dt = iat_dt + ttl;
    let claims = IdentityClaims {
        user: user.clone(),
        iat: iat_dt.timestamp(),
        exp: exp_dt.timestamp(),
    };
    encode(&Header::new(Algorithm::RS256), &claims, key)
        .map_err(|e| AuthError::Signing(e.to_string()))
}

pub fn mint_refresh_token(
    uid: UserId,
    secret: &EncodingKey,
    ttl: Duration,
) -> Result<MintedRefreshToken, AuthError> {
    // v4 uuid: 122 random bits, unique with overwhelming probability.
    let token_id = Uuid::new_v4().to_string();
    let iat_dt = Utc::now();
    let exp_dt = iat_dt + ttl;
    let claims = RefreshClaims {
        uid,
        jti: token_id.clone(),
        iat: iat_dt.timestamp(),
        exp: exp_dt.timestamp(),
    };
    let token = encode(&Header::new(Algorithm::HS256), &claims, secret)
        .map_err(|e| AuthError::Signing(e.to_string()))?;
    Ok(MintedRefreshToken {
        token,
        token_id,
        expires_in: ttl,
    })
}

pub fn validate_identity_token(
    token: &str,
    key: &DecodingKey,
) -> Result<IdentityClaims, AuthError> {
    let mut v = Validation::new(Algorithm::RS256);
    v.leeway = 0;
    decode::<IdentityClaims>(token, key, &v)
        .map(|data| data.claims)
        .map_err(invalid_token)
}

/// Signature/expiry check only. Full refresh-token validity additionally
/// requires a revocation-store lookup, which is layered in the token service.
pub(crate) fn decode_refresh_claims(
    token: &str,
    secret: &DecodingKey,
) -> Result<RefreshClaims, AuthError> {
    let mut v = Validation::new(Algorithm::HS256);
    v.leeway = 0;
    decode::<RefreshClaims>(token, secret, &v)
        .map(|data| data.claims)
        .map_err(invalid_token)
}

fn invalid_token(e: jsonwebtoken::errors::Error) -> AuthError {
    let reason = match e.kind() {
        ErrorKind::ExpiredSignature => InvalidTokenReason::Expired,
        ErrorKind::InvalidSignature => InvalidTokenReason::BadSignature,
        _ => InvalidTokenReason::Malformed,
    };
    AuthError::InvalidToken(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const PRIVATE_PEM: &[u8] = include_bytes!("../../testdata/rsa_private_test.pem");
    const PUBLIC_PEM: &[u8] = include_bytes!("../../testdata/rsa_public_test.pem");
    const REFRESH_SECRET: &[u8] = b"anotsorandomtestsecret";

    fn rsa_keys() -> (EncodingKey, DecodingKey) {
        (
            EncodingKey::from_rsa_pem(PRIVATE_PEM).unwrap(),
            DecodingKey::from_rsa_pem(PUBLIC_PEM).unwrap(),
        )
    }

    fn test_user() -> User {
        User {
            uid: UserId(Uuid::new_v4()),
            email: "hello@world.com".to_string(),
            name: "Tester".to_string(),
            image_url: String::new(),
            website: String::new(),
            password_hash: "not-a-real-hash".to_string(),
        }
    }

    #[test]
    fn identity_token_round_trip() {
        let (enc, dec) = rsa_keys();
        let user = test_user();
        let ttl = Duration::from_secs(15 * 60);

        let token = mint_identity_token(&user, &enc, ttl).unwrap();
        let claims = validate_identity_token(&token, &dec).unwrap();

        assert_eq!(claims.user.uid, user.uid);
        assert_eq!(claims.user.email, user.email);
        assert_eq!(claims.user.name, user.name);
        // credential hash must not survive the trip into the claims
        assert!(claims.user.password_hash.is_empty());

        let expected_exp = Utc::now().timestamp() + 15 * 60;
        assert!((claims.exp - expected_exp).abs() <= 5);
        assert!(claims.iat <= Utc::now().timestamp());
    }

    #[test]
    fn identity_token_validation_is_idempotent() {
        let (enc, dec) = rsa_keys();
        let user = test_user();
        let token = mint_identity_token(&user, &enc, Duration::from_secs(60)).unwrap();

        let first = validate_identity_token(&token, &dec).unwrap();
        let second = validate_identity_token(&token, &dec).unwrap();
        assert_eq!(first.user.uid, second.user.uid);
        assert_eq!(first.iat, second.iat);
        assert_eq!(first.exp, second.exp);
    }

    #[test]
    fn expired_identity_token_is_rejected() {
        let (enc, dec) = rsa_keys();
        let iat_dt = Utc::now() - ChronoDuration::seconds(120);
        let claims = IdentityClaims {
            user: test_user(),
            iat: iat_dt.timestamp(),
            exp: (iat_dt + ChronoDuration::seconds(60)).timestamp(),
        };
        let token = encode(&Header::new(Algorithm::RS256), &claims, &enc).unwrap();

        match validate_identity_token(&token, &dec) {
            Err(AuthError::InvalidToken(reason)) => {
                assert_eq!(reason, InvalidTokenReason::Expired)
            }
            other => panic!("expected expired-token error, got {:?}", other),
        }
    }

    #[test]
    fn tampered_identity_token_is_rejected() {
        let (enc, dec) = rsa_keys();
        let a = mint_identity_token(&test_user(), &enc, Duration::from_secs(60)).unwrap();
        let b = mint_identity_token(&test_user(), &enc, Duration::from_secs(60)).unwrap();

        // payload of one token glued to the signature of another
        let mut parts_a = a.split('.');
        let (header, payload) = (parts_a.next().unwrap(), parts_a.next().unwrap());
        let foreign_sig = b.split('.').nth(2).unwrap();
        let forged = format!("{header}.{payload}.{foreign_sig}");

        match validate_identity_token(&forged, &dec) {
            Err(AuthError::InvalidToken(reason)) => {
                assert_eq!(reason, InvalidTokenReason::BadSignature)
            }
            other => panic!("expected bad-signature error, got {:?}", other),
        }
    }

    #[test]
    fn garbage_identity_token_is_malformed() {
        let (_, dec) = rsa_keys();
        match validate_identity_token("not-even-a-token", &dec) {
            Err(AuthError::InvalidToken(reason)) => {
                assert_eq!(reason, InvalidTokenReason::Malformed)
            }
            other => panic!("expected malformed-token error, got {:?}", other),
        }
    }

    #[test]
    fn refresh_token_round_trip() {
        let enc = EncodingKey::from_secret(REFRESH_SECRET);
        let dec = DecodingKey::from_secret(REFRESH_SECRET);
        let uid = UserId(Uuid::new_v4());
        let ttl = Duration::from_secs(3 * 24 * 3600);

        let minted = mint_refresh_token(uid, &enc, ttl).unwrap();
        assert_eq!(minted.expires_in, ttl);
        assert!(Uuid::parse_str(&minted.token_id).is_ok());

        let claims = decode_refresh_claims(&minted.token, &dec).unwrap();
        assert_eq!(claims.uid, uid);
        assert_eq!(claims.jti, minted.token_id);
    }

    #[test]
    fn refresh_token_ids_are_unique() {
        let enc = EncodingKey::from_secret(REFRESH_SECRET);
        let uid = UserId(Uuid::new_v4());
        let a = mint_refresh_token(uid, &enc, Duration::from_secs(60)).unwrap();
        let b = mint_refresh_token(uid, &enc, Duration::from_secs(60)).unwrap();
        assert_ne!(a.token_id, b.token_id);
    }

    #[test]
    fn refresh_token_with_wrong_secret_is_rejected() {
        let enc = EncodingKey::from_secret(REFRESH_SECRET);
        let dec = DecodingKey::from_secret(b"a-different-secret");
        let minted =
            mint_refresh_token(UserId(Uuid::new_v4()), &enc, Duration::from_secs(60)).unwrap();

        match decode_refresh_claims(&minted.token, &dec) {
            Err(AuthError::InvalidToken(reason)) => {
                assert_eq!(reason, InvalidTokenReason::BadSignature)
            }
            other => panic!("expected bad-signature error, got {:?}", other),
        }
    }
}
