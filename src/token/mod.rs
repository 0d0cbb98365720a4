use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from encoding, decoding or verifying session tokens
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Missing token")]
    Missing,

    #[error("'{expected}' token required, '{found}' token received")]
    WrongType { expected: TokenType, found: TokenType },

    #[error("CSRF token missing or mismatched")]
    CsrfMismatch,

    #[error("Fresh token required")]
    Stale,

    #[error("Invalid token: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// An expiry given either as an absolute instant or relative to now.
///
/// Relative durations are resolved against the current UTC time exactly once,
/// when the claim set is built; the encoded token carries only absolute
/// timestamps so re-verification stays deterministic.
#[derive(Debug, Clone, Copy)]
pub enum Expire {
    At(DateTime<Utc>),
    In(Duration),
}

impl Expire {
    fn resolve(self) -> i64 {
        match self {
            Expire::At(t) => t.timestamp(),
            Expire::In(d) => (Utc::now() + d).timestamp(),
        }
    }
}

/// Signed session token claim set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf: Option<String>,
    #[serde(default)]
    pub fresh: bool,
}

impl Claims {
    pub fn new(sub: impl Into<String>, token_type: TokenType) -> Self {
        Self {
            sub: sub.into(),
            jti: Uuid::new_v4().to_string(),
            token_type,
            iat: Utc::now().timestamp(),
            exp: None,
            nbf: None,
            aud: None,
            iss: None,
            csrf: None,
            fresh: false,
        }
    }

    pub fn expires(mut self, expiry: Expire) -> Self {
        self.exp = Some(expiry.resolve());
        self
    }

    pub fn not_before(mut self, nbf: Expire) -> Self {
        self.nbf = Some(nbf.resolve());
        self
    }

    pub fn audience(mut self, aud: impl Into<String>) -> Self {
        self.aud = Some(aud.into());
        self
    }

    pub fn issuer(mut self, iss: impl Into<String>) -> Self {
        self.iss = Some(iss.into());
        self
    }

    pub fn with_csrf(mut self, csrf: impl Into<String>) -> Self {
        self.csrf = Some(csrf.into());
        self
    }

    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    pub fn expiry_datetime(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

pub fn encode(claims: &Claims, key: &str, algorithm: Algorithm) -> Result<String, TokenError> {
    if key.is_empty() {
        return Err(TokenError::Invalid("empty signing key".to_string()));
    }

    jsonwebtoken::encode(&Header::new(algorithm), claims, &EncodingKey::from_secret(key.as_bytes()))
        .map_err(|e| TokenError::Invalid(e.to_string()))
}

pub fn decode(
    token: &str,
    key: &str,
    algorithms: &[Algorithm],
    audience: Option<&str>,
    issuer: Option<&str>,
    verify: bool,
) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(algorithms.first().copied().unwrap_or(Algorithm::HS256));
    validation.algorithms = algorithms.to_vec();
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    // exp stays optional in the claim set; it is enforced whenever present
    validation.required_spec_claims.clear();
    match audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }
    if let Some(iss) = issuer {
        validation.set_issuer(&[iss]);
    }
    if !verify {
        validation.insecure_disable_signature_validation();
    }

    let data = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(key.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        })?;

    Ok(data.claims)
}
