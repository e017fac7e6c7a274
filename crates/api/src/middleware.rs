use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{debug, warn};

use warden_auth::{AssertionCodec, IdentityClaims, SessionPolicy};

use crate::app::errors::json_error;
use crate::context::SessionContext;

/// How the sealed assertion travels in cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
}

#[derive(Clone)]
pub struct SessionState {
    pub codec: Arc<dyn AssertionCodec>,
    pub policy: SessionPolicy,
    pub cookie: CookieSettings,
}

impl SessionState {
    /// `Set-Cookie` value carrying `sealed` for the policy's lifetime.
    pub fn session_cookie(&self, sealed: &str) -> String {
        self.cookie_header(sealed, self.policy.ttl.num_seconds())
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn clear_cookie(&self) -> String {
        self.cookie_header("", 0)
    }

    fn cookie_header(&self, value: &str, max_age: i64) -> String {
        let secure = if self.cookie.secure { "; Secure" } else { "" };
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            self.cookie.name, value, max_age, secure
        )
    }

    /// Seal `claims` into a ready-to-send `Set-Cookie` header value.
    pub fn issue(&self, claims: &IdentityClaims) -> Result<HeaderValue, Response> {
        let sealed = self.codec.seal(claims).map_err(|e| {
            warn!(error = %e, "failed to seal session");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "session_error", "failed to issue session")
        })?;
        HeaderValue::from_str(&self.session_cookie(&sealed)).map_err(|_| {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "session_error", "failed to issue session")
        })
    }
}

enum TokenSource {
    Cookie,
    Bearer,
}

/// Require a valid session assertion (cookie, or `Authorization: Bearer`).
///
/// Past half its lifetime, a cookie session is re-issued on the response.
pub async fn session_middleware(
    State(state): State<SessionState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some((token, source)) = extract_token(req.headers(), &state.cookie.name) else {
        return json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "session required");
    };

    let now = Utc::now();
    let claims = match state.codec.open(&token, now) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "session rejected");
            return json_error(StatusCode::UNAUTHORIZED, "unauthenticated", e.to_string());
        }
    };

    let renewal = match source {
        TokenSource::Cookie if state.policy.should_renew(&claims, now) => {
            Some(state.policy.renew(&claims, now))
        }
        _ => None,
    };

    req.extensions_mut().insert(SessionContext::new(claims));
    let mut response = next.run(req).await;

    if let Some(renewed) = renewal {
        // A handler that already set the cookie (logout, re-login) wins.
        if !response.headers().contains_key(header::SET_COOKIE) {
            match state.issue(&renewed) {
                Ok(cookie) => {
                    response.headers_mut().append(header::SET_COOKIE, cookie);
                }
                Err(_) => warn!("session renewal skipped"),
            }
        }
    }
    response
}

fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<(String, TokenSource)> {
    if let Some(token) = extract_cookie(headers, cookie_name) {
        return Some((token.to_string(), TokenSource::Cookie));
    }
    extract_bearer(headers).map(|t| (t.to_string(), TokenSource::Bearer))
}

fn extract_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, response::IntoResponse, routing::get, Router};
    use chrono::Duration;
    use tower::ServiceExt;
    use warden_auth::Hs256AssertionCodec;
    use warden_core::UserId;

    const TTL_SECS: i64 = 90;

    fn state() -> SessionState {
        SessionState {
            codec: Arc::new(Hs256AssertionCodec::new("test-secret")),
            policy: SessionPolicy {
                ttl: Duration::seconds(TTL_SECS),
                sliding: true,
            },
            cookie: CookieSettings {
                name: "warden_session".into(),
                secure: false,
            },
        }
    }

    /// Claims issued `age_secs` ago under the test policy.
    fn sealed_with_age(state: &SessionState, age_secs: i64) -> String {
        let iat = Utc::now() - Duration::seconds(age_secs);
        let claims = IdentityClaims {
            sub: UserId::new(1),
            name: "alice".into(),
            email: String::new(),
            roles: vec![],
            permissions: vec!["/".into()],
            iat: iat.timestamp(),
            exp: (iat + Duration::seconds(TTL_SECS)).timestamp(),
        };
        state.codec.seal(&claims).unwrap()
    }

    fn app(state: SessionState) -> Router {
        let logout_cookie = state.clear_cookie();
        Router::new()
            .route("/ping", get(|| async { StatusCode::OK }))
            .route(
                "/logout",
                get(move || {
                    let cookie = logout_cookie.clone();
                    async move { (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response() }
                }),
            )
            .layer(axum::middleware::from_fn_with_state(state, session_middleware))
    }

    async fn send(state: &SessionState, path: &str, header_pair: (header::HeaderName, String)) -> Response {
        let req = Request::builder()
            .uri(path)
            .header(header_pair.0, header_pair.1)
            .body(Body::empty())
            .unwrap();
        app(state.clone()).oneshot(req).await.unwrap()
    }

    fn set_cookies(resp: &Response) -> Vec<String> {
        resp.headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn fresh_cookie_is_not_reissued() {
        let state = state();
        let token = sealed_with_age(&state, 10);
        let resp = send(&state, "/ping", (header::COOKIE, format!("warden_session={token}"))).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(set_cookies(&resp).is_empty());
    }

    #[tokio::test]
    async fn cookie_past_half_lifetime_is_reissued() {
        let state = state();
        let token = sealed_with_age(&state, 60);
        let resp = send(&state, "/ping", (header::COOKIE, format!("warden_session={token}"))).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let cookies = set_cookies(&resp);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].contains(&format!("Max-Age={TTL_SECS}")));

        let renewed = extract_cookie(
            &headers(&[(header::COOKIE, cookies[0].split(';').next().unwrap())]),
            "warden_session",
        )
        .unwrap()
        .to_string();
        assert_ne!(renewed, token);
        let claims = state.codec.open(&renewed, Utc::now()).unwrap();
        assert!(!state.policy.should_renew(&claims, Utc::now()));
        assert_eq!(claims.permissions, vec!["/".to_string()]);
    }

    #[tokio::test]
    async fn bearer_session_is_never_reissued() {
        let state = state();
        let token = sealed_with_age(&state, 60);
        let resp = send(&state, "/ping", (header::AUTHORIZATION, format!("Bearer {token}"))).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(set_cookies(&resp).is_empty());
    }

    #[tokio::test]
    async fn handler_cookie_wins_over_renewal() {
        let state = state();
        let token = sealed_with_age(&state, 60);
        let resp = send(&state, "/logout", (header::COOKIE, format!("warden_session={token}"))).await;

        assert_eq!(set_cookies(&resp), vec![state.clear_cookie()]);
    }

    #[tokio::test]
    async fn expired_cookie_is_unauthorized() {
        let state = state();
        let token = sealed_with_age(&state, TTL_SECS + 5);
        let resp = send(&state, "/ping", (header::COOKIE, format!("warden_session={token}"))).await;

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&resp).is_empty());
    }

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn cookie_is_found_among_others() {
        let map = headers(&[(header::COOKIE, "theme=dark; warden_session=abc.def.ghi; lang=en")]);
        assert_eq!(extract_cookie(&map, "warden_session"), Some("abc.def.ghi"));
        assert_eq!(extract_cookie(&map, "missing"), None);
    }

    #[test]
    fn empty_cookie_falls_back_to_bearer() {
        let map = headers(&[
            (header::COOKIE, "warden_session="),
            (header::AUTHORIZATION, "Bearer tok"),
        ]);
        let (token, source) = extract_token(&map, "warden_session").unwrap();
        assert_eq!(token, "tok");
        assert!(matches!(source, TokenSource::Bearer));
    }

    #[test]
    fn bearer_requires_scheme_and_token() {
        assert!(extract_bearer(&headers(&[(header::AUTHORIZATION, "Basic abc")])).is_none());
        assert!(extract_bearer(&headers(&[(header::AUTHORIZATION, "Bearer   ")])).is_none());
    }
}
