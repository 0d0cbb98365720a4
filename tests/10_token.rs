use cardbox_api::token::{self, Claims, Expire, TokenError, TokenType};
use chrono::{Duration, Utc};
use jsonwebtoken::Algorithm;

const KEY: &str = "integration-test-secret";

#[test]
fn round_trip_preserves_every_set_field() {
    let claims = Claims::new("1001", TokenType::Access)
        .expires(Expire::In(Duration::minutes(30)))
        .not_before(Expire::At(Utc::now() - Duration::seconds(5)))
        .audience("cardbox-clients")
        .issuer("cardbox-api")
        .with_csrf("csrf-nonce")
        .fresh(true);

    let encoded = token::encode(&claims, KEY, Algorithm::HS256).unwrap();
    let decoded = token::decode(
        &encoded,
        KEY,
        &[Algorithm::HS256],
        Some("cardbox-clients"),
        Some("cardbox-api"),
        true,
    )
    .unwrap();

    assert_eq!(decoded, claims);
}

#[test]
fn token_signed_with_a_different_key_is_rejected() {
    let claims = Claims::new("1", TokenType::Access).expires(Expire::In(Duration::minutes(5)));
    let encoded = token::encode(&claims, "key-a", Algorithm::HS256).unwrap();

    let err = token::decode(&encoded, "key-b", &[Algorithm::HS256], None, None, true).unwrap_err();
    assert!(matches!(err, TokenError::Invalid(_)), "unexpected error: {err:?}");
}

#[test]
fn expiry_is_enforced_at_decode_time() {
    let claims = Claims::new("1", TokenType::Refresh).expires(Expire::At(Utc::now() - Duration::hours(1)));
    let encoded = token::encode(&claims, KEY, Algorithm::HS256).unwrap();

    let err = token::decode(&encoded, KEY, &[Algorithm::HS256], None, None, true).unwrap_err();
    assert!(matches!(err, TokenError::Expired));
}

#[test]
fn not_before_in_the_future_is_rejected() {
    let claims = Claims::new("1", TokenType::Access)
        .expires(Expire::In(Duration::hours(1)))
        .not_before(Expire::In(Duration::minutes(10)));
    let encoded = token::encode(&claims, KEY, Algorithm::HS256).unwrap();

    let err = token::decode(&encoded, KEY, &[Algorithm::HS256], None, None, true).unwrap_err();
    assert!(matches!(err, TokenError::Invalid(_)));
}

#[test]
fn wrong_audience_is_rejected() {
    let claims = Claims::new("1", TokenType::Access)
        .expires(Expire::In(Duration::minutes(5)))
        .audience("cardbox-clients");
    let encoded = token::encode(&claims, KEY, Algorithm::HS256).unwrap();

    let err = token::decode(&encoded, KEY, &[Algorithm::HS256], Some("someone-else"), None, true).unwrap_err();
    assert!(matches!(err, TokenError::Invalid(_)));
}
