use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::session::{IssuedToken, RequestCredentials, SessionConfig, TokenLocation};

/// Header carrying the CSRF double-submit value on state-changing requests
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Request-scoped authenticated user, injected by `resolve_session`
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: i64,
    pub fresh: bool,
}

/// Resolves the request's credential material to an owning user and, when
/// the access token was silently refreshed, attaches the replacement cookie
/// to the outgoing response.
pub async fn resolve_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let creds = extract_credentials(state.sessions.config(), request.headers(), request.method());
    let session = state.sessions.resolve_owner(&creds)?;

    let reissued = session.reissued;
    request
        .extensions_mut()
        .insert(CurrentUser { id: session.user_id, fresh: session.fresh });

    let mut response = next.run(request).await;

    if let Some(token) = reissued {
        attach_access_cookies(state.sessions.config(), &mut response, &token);
    }
    Ok(response)
}

pub fn extract_credentials(config: &SessionConfig, headers: &HeaderMap, method: &Method) -> RequestCredentials {
    let state_changing = !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS);

    match config.location {
        TokenLocation::Bearer => RequestCredentials {
            access: bearer_token(headers),
            refresh: None,
            csrf: None,
            state_changing,
        },
        TokenLocation::Cookies => RequestCredentials {
            access: cookie_value(headers, &config.access_cookie),
            refresh: cookie_value(headers, &config.refresh_cookie),
            csrf: headers
                .get(CSRF_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            state_changing,
        },
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Access cookie plus the script-readable CSRF cookie mirroring the token's
/// nonce; the client echoes it back in the CSRF header.
pub fn attach_access_cookies(config: &SessionConfig, response: &mut Response, token: &IssuedToken) {
    append_cookie(
        response,
        &format!("{}={}; HttpOnly; SameSite=Lax; Path=/", config.access_cookie, token.token),
    );
    if let Some(csrf) = &token.csrf {
        append_cookie(response, &format!("{}={}; SameSite=Lax; Path=/", config.csrf_cookie, csrf));
    }
}

pub fn attach_refresh_cookie(config: &SessionConfig, response: &mut Response, token: &IssuedToken) {
    append_cookie(
        response,
        &format!("{}={}; HttpOnly; SameSite=Lax; Path=/", config.refresh_cookie, token.token),
    );
}

pub fn clear_session_cookies(config: &SessionConfig, response: &mut Response) {
    for name in [&config.access_cookie, &config.refresh_cookie, &config.csrf_cookie] {
        append_cookie(response, &format!("{}=; Max-Age=0; Path=/", name));
    }
}

fn append_cookie(response: &mut Response, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::Algorithm;

    fn cookie_config() -> SessionConfig {
        SessionConfig {
            secret: "middleware-test-secret".to_string(),
            algorithm: Algorithm::HS256,
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(30),
            location: TokenLocation::Cookies,
            csrf_protect: true,
            access_cookie: "access_token".to_string(),
            refresh_cookie: "refresh_token".to_string(),
            csrf_cookie: "csrf_token".to_string(),
            audience: None,
            issuer: None,
        }
    }

    #[test]
    fn cookie_header_is_parsed_by_name() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("access_token=abc; refresh_token=def; other=1"),
        );
        assert_eq!(cookie_value(&headers, "access_token").as_deref(), Some("abc"));
        assert_eq!(cookie_value(&headers, "refresh_token").as_deref(), Some("def"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn cookie_transport_collects_all_credential_material() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token=a; refresh_token=r"));
        headers.insert(CSRF_HEADER, HeaderValue::from_static("nonce"));

        let creds = extract_credentials(&cookie_config(), &headers, &Method::POST);
        assert_eq!(creds.access.as_deref(), Some("a"));
        assert_eq!(creds.refresh.as_deref(), Some("r"));
        assert_eq!(creds.csrf.as_deref(), Some("nonce"));
        assert!(creds.state_changing);
    }

    #[test]
    fn reads_are_not_state_changing() {
        let creds = extract_credentials(&cookie_config(), &HeaderMap::new(), &Method::GET);
        assert!(!creds.state_changing);
    }

    #[test]
    fn bearer_transport_reads_the_authorization_header() {
        let mut config = cookie_config();
        config.location = TokenLocation::Bearer;
        config.csrf_protect = false;

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));

        let creds = extract_credentials(&config, &headers, &Method::POST);
        assert_eq!(creds.access.as_deref(), Some("tok"));
        assert!(creds.refresh.is_none());
        assert!(creds.csrf.is_none());
    }
}
