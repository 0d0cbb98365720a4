use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::Algorithm;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::token::{self, Claims, Expire, TokenError, TokenType};

/// Where the client carries its tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLocation {
    Bearer,
    Cookies,
}

/// Session signing and transport settings, injected at construction so the
/// manager can be tested without ambient configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub location: TokenLocation,
    pub csrf_protect: bool,
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub csrf_cookie: String,
    pub audience: Option<String>,
    pub issuer: Option<String>,
}

impl SessionConfig {
    pub fn from_security(sec: &SecurityConfig) -> Self {
        let location = match sec.token_location.as_str() {
            "bearer" | "headers" => TokenLocation::Bearer,
            _ => TokenLocation::Cookies,
        };

        Self {
            secret: sec.jwt_secret.clone(),
            algorithm: Algorithm::HS256,
            access_ttl: Duration::minutes(sec.access_token_expiry_mins),
            refresh_ttl: Duration::days(sec.refresh_token_expiry_days),
            location,
            csrf_protect: sec.csrf_protect,
            access_cookie: sec.access_cookie.clone(),
            refresh_cookie: sec.refresh_cookie.clone(),
            csrf_cookie: sec.csrf_cookie.clone(),
            audience: None,
            issuer: None,
        }
    }
}

/// A signed token plus the material the transport layer needs to set cookies
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub csrf: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Credential material extracted from one inbound request
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    pub access: Option<String>,
    pub refresh: Option<String>,
    pub csrf: Option<String>,
    pub state_changing: bool,
}

/// The resolved owner of a request. `reissued` is set when the access token
/// was silently refreshed and must be attached to the outgoing response.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub fresh: bool,
    pub reissued: Option<IssuedToken>,
}

pub struct SessionManager {
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// CSRF nonces only exist for cookie transport with protection enabled
    fn new_csrf(&self) -> Option<String> {
        (self.config.location == TokenLocation::Cookies && self.config.csrf_protect)
            .then(|| Uuid::new_v4().to_string())
    }

    fn build_claims(
        &self,
        uid: i64,
        token_type: TokenType,
        ttl: Duration,
        fresh: bool,
        csrf: Option<String>,
    ) -> Claims {
        let mut claims = Claims::new(uid.to_string(), token_type)
            .expires(Expire::In(ttl))
            .fresh(fresh);
        if let Some(aud) = &self.config.audience {
            claims = claims.audience(aud.clone());
        }
        if let Some(iss) = &self.config.issuer {
            claims = claims.issuer(iss.clone());
        }
        if let Some(csrf) = csrf {
            claims = claims.with_csrf(csrf);
        }
        claims
    }

    fn sign(&self, claims: &Claims) -> Result<IssuedToken, TokenError> {
        let token = token::encode(claims, &self.config.secret, self.config.algorithm)?;
        Ok(IssuedToken {
            token,
            csrf: claims.csrf.clone(),
            expires_at: claims.expiry_datetime(),
        })
    }

    pub fn create_access_token(&self, uid: i64, fresh: bool) -> Result<IssuedToken, TokenError> {
        let claims = self.build_claims(uid, TokenType::Access, self.config.access_ttl, fresh, self.new_csrf());
        self.sign(&claims)
    }

    pub fn create_refresh_token(&self, uid: i64) -> Result<IssuedToken, TokenError> {
        let claims = self.build_claims(uid, TokenType::Refresh, self.config.refresh_ttl, false, self.new_csrf());
        self.sign(&claims)
    }

    /// Issue the login pair. Both tokens share one CSRF nonce so a single
    /// CSRF cookie stays valid across silent refreshes. Access tokens from a
    /// password login are the only fresh tokens this manager ever mints.
    pub fn issue_pair(&self, uid: i64) -> Result<TokenPair, TokenError> {
        let csrf = self.new_csrf();
        let access =
            self.sign(&self.build_claims(uid, TokenType::Access, self.config.access_ttl, true, csrf.clone()))?;
        let refresh =
            self.sign(&self.build_claims(uid, TokenType::Refresh, self.config.refresh_ttl, false, csrf))?;
        Ok(TokenPair { access, refresh })
    }

    fn decode(&self, raw: &str) -> Result<Claims, TokenError> {
        token::decode(
            raw,
            &self.config.secret,
            &[self.config.algorithm],
            self.config.audience.as_deref(),
            self.config.issuer.as_deref(),
            true,
        )
    }

    fn check_type(claims: &Claims, expected: TokenType) -> Result<(), TokenError> {
        if claims.token_type != expected {
            return Err(TokenError::WrongType { expected, found: claims.token_type });
        }
        Ok(())
    }

    fn check_csrf(&self, claims: &Claims, provided: Option<&str>, state_changing: bool) -> Result<(), TokenError> {
        if self.config.location != TokenLocation::Cookies || !self.config.csrf_protect || !state_changing {
            return Ok(());
        }
        let expected = claims.csrf.as_deref().ok_or(TokenError::CsrfMismatch)?;
        let provided = provided.ok_or(TokenError::CsrfMismatch)?;
        if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
            return Err(TokenError::CsrfMismatch);
        }
        Ok(())
    }

    /// Decode a raw token and require a specific type
    pub fn verify_token(&self, raw: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.decode(raw)?;
        Self::check_type(&claims, expected)?;
        Ok(claims)
    }

    /// Mint a replacement access token from a valid refresh token. Used by
    /// the explicit refresh endpoint; the silent path goes through
    /// `resolve_owner`.
    pub fn refresh_access(&self, refresh_raw: &str) -> Result<IssuedToken, TokenError> {
        let claims = self.verify_token(refresh_raw, TokenType::Refresh)?;
        let uid = subject_id(&claims)?;
        self.sign(&self.build_claims(uid, TokenType::Access, self.config.access_ttl, false, claims.csrf))
    }

    /// Resolve a request's credential material to its owning user.
    ///
    /// States: no access token -> Missing; valid access token -> the subject;
    /// expired access token -> refresh path; anything else -> the decode
    /// error propagates unchanged.
    pub fn resolve_owner(&self, creds: &RequestCredentials) -> Result<Session, TokenError> {
        let raw = creds.access.as_deref().ok_or(TokenError::Missing)?;

        match self.decode(raw) {
            Ok(claims) => {
                Self::check_type(&claims, TokenType::Access)?;
                self.check_csrf(&claims, creds.csrf.as_deref(), creds.state_changing)?;
                Ok(Session {
                    user_id: subject_id(&claims)?,
                    fresh: claims.fresh,
                    reissued: None,
                })
            }
            Err(TokenError::Expired) => self.refresh_session(creds),
            Err(other) => Err(other),
        }
    }

    /// Access token expired: fall back to the refresh token and mint a
    /// replacement access token carrying the refresh token's CSRF nonce, so
    /// the client's CSRF cookie remains valid.
    fn refresh_session(&self, creds: &RequestCredentials) -> Result<Session, TokenError> {
        let raw = creds.refresh.as_deref().ok_or(TokenError::Expired)?;
        let claims = self.decode(raw)?;
        Self::check_type(&claims, TokenType::Refresh)?;
        self.check_csrf(&claims, creds.csrf.as_deref(), creds.state_changing)?;

        let uid = subject_id(&claims)?;
        let reissued =
            self.sign(&self.build_claims(uid, TokenType::Access, self.config.access_ttl, false, claims.csrf))?;
        Ok(Session {
            user_id: uid,
            fresh: false,
            reissued: Some(reissued),
        })
    }

    /// Operations that re-prove credentials demand a token issued directly
    /// from a password login, not one minted by the refresh path.
    pub fn require_fresh(&self, session: &Session) -> Result<(), TokenError> {
        if session.fresh {
            Ok(())
        } else {
            Err(TokenError::Stale)
        }
    }
}

fn subject_id(claims: &Claims) -> Result<i64, TokenError> {
    claims
        .sub
        .parse()
        .map_err(|_| TokenError::Invalid(format!("non-numeric subject: {}", claims.sub)))
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

    fn manager(location: TokenLocation, csrf_protect: bool) -> SessionManager {
        SessionManager::new(SessionConfig {
            secret: "session-test-secret".to_string(),
            algorithm: Algorithm::HS256,
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(30),
            location,
            csrf_protect,
            access_cookie: "access_token".to_string(),
            refresh_cookie: "refresh_token".to_string(),
            csrf_cookie: "csrf_token".to_string(),
            audience: None,
            issuer: None,
        })
    }

    fn expired_access(mgr: &SessionManager, uid: i64, csrf: Option<&str>) -> String {
        let mut claims = Claims::new(uid.to_string(), TokenType::Access)
            .expires(Expire::At(Utc::now() - Duration::minutes(5)));
        if let Some(csrf) = csrf {
            claims = claims.with_csrf(csrf.to_string());
        }
        token::encode(&claims, &mgr.config().secret, Algorithm::HS256).unwrap()
    }

    #[test]
    fn valid_access_token_resolves_subject() {
        let mgr = manager(TokenLocation::Bearer, false);
        let issued = mgr.create_access_token(42, true).unwrap();

        let creds = RequestCredentials { access: Some(issued.token), ..Default::default() };
        let session = mgr.resolve_owner(&creds).unwrap();
        assert_eq!(session.user_id, 42);
        assert!(session.fresh);
        assert!(session.reissued.is_none());
    }

    #[test]
    fn missing_access_token_is_rejected() {
        let mgr = manager(TokenLocation::Bearer, false);
        let err = mgr.resolve_owner(&RequestCredentials::default()).unwrap_err();
        assert!(matches!(err, TokenError::Missing));
    }

    #[test]
    fn refresh_token_cannot_stand_in_for_access() {
        let mgr = manager(TokenLocation::Bearer, false);
        let refresh = mgr.create_refresh_token(1).unwrap();

        let creds = RequestCredentials { access: Some(refresh.token), ..Default::default() };
        let err = mgr.resolve_owner(&creds).unwrap_err();
        assert!(matches!(err, TokenError::WrongType { expected: TokenType::Access, .. }));
    }

    #[test]
    fn expired_access_with_valid_refresh_reissues() {
        let mgr = manager(TokenLocation::Bearer, false);
        let refresh = mgr.create_refresh_token(7).unwrap();

        let creds = RequestCredentials {
            access: Some(expired_access(&mgr, 7, None)),
            refresh: Some(refresh.token),
            ..Default::default()
        };
        let session = mgr.resolve_owner(&creds).unwrap();
        assert_eq!(session.user_id, 7);
        assert!(!session.fresh);

        let reissued = session.reissued.expect("new access token attached");
        let claims = mgr.verify_token(&reissued.token, TokenType::Access).unwrap();
        assert_eq!(claims.sub, "7");
        assert!(!claims.fresh);
    }

    #[test]
    fn expired_access_without_refresh_fails() {
        let mgr = manager(TokenLocation::Bearer, false);
        let creds = RequestCredentials {
            access: Some(expired_access(&mgr, 7, None)),
            ..Default::default()
        };
        assert!(matches!(mgr.resolve_owner(&creds).unwrap_err(), TokenError::Expired));
    }

    #[test]
    fn csrf_mismatch_fails_closed_on_state_changing_requests() {
        let mgr = manager(TokenLocation::Cookies, true);
        let pair = mgr.issue_pair(3).unwrap();
        let csrf = pair.access.csrf.clone().expect("csrf nonce issued");

        // Mismatched value
        let creds = RequestCredentials {
            access: Some(pair.access.token.clone()),
            csrf: Some("wrong-value".to_string()),
            state_changing: true,
            ..Default::default()
        };
        assert!(matches!(mgr.resolve_owner(&creds).unwrap_err(), TokenError::CsrfMismatch));

        // Absent value
        let creds = RequestCredentials {
            access: Some(pair.access.token.clone()),
            state_changing: true,
            ..Default::default()
        };
        assert!(matches!(mgr.resolve_owner(&creds).unwrap_err(), TokenError::CsrfMismatch));

        // Matching value passes
        let creds = RequestCredentials {
            access: Some(pair.access.token),
            csrf: Some(csrf),
            state_changing: true,
            ..Default::default()
        };
        assert_eq!(mgr.resolve_owner(&creds).unwrap().user_id, 3);
    }

    #[test]
    fn reads_skip_the_csrf_check() {
        let mgr = manager(TokenLocation::Cookies, true);
        let pair = mgr.issue_pair(3).unwrap();

        let creds = RequestCredentials {
            access: Some(pair.access.token),
            state_changing: false,
            ..Default::default()
        };
        assert!(mgr.resolve_owner(&creds).is_ok());
    }

    #[test]
    fn bearer_transport_ignores_csrf() {
        let mgr = manager(TokenLocation::Bearer, false);
        let issued = mgr.create_access_token(5, false).unwrap();
        assert!(issued.csrf.is_none());

        let creds = RequestCredentials {
            access: Some(issued.token),
            state_changing: true,
            ..Default::default()
        };
        assert!(mgr.resolve_owner(&creds).is_ok());
    }

    #[test]
    fn silent_refresh_preserves_csrf_nonce() {
        let mgr = manager(TokenLocation::Cookies, true);
        let pair = mgr.issue_pair(11).unwrap();
        let csrf = pair.refresh.csrf.clone().unwrap();

        let creds = RequestCredentials {
            access: Some(expired_access(&mgr, 11, Some(&csrf))),
            refresh: Some(pair.refresh.token),
            csrf: Some(csrf.clone()),
            state_changing: true,
        };
        let session = mgr.resolve_owner(&creds).unwrap();
        assert_eq!(session.reissued.unwrap().csrf, Some(csrf));
    }

    #[test]
    fn freshness_gate_rejects_refreshed_sessions() {
        let mgr = manager(TokenLocation::Bearer, false);
        let refresh = mgr.create_refresh_token(2).unwrap();
        let creds = RequestCredentials {
            access: Some(expired_access(&mgr, 2, None)),
            refresh: Some(refresh.token),
            ..Default::default()
        };
        let session = mgr.resolve_owner(&creds).unwrap();
        assert!(matches!(mgr.require_fresh(&session).unwrap_err(), TokenError::Stale));
    }
}
