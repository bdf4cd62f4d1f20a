use anyhow::anyhow;
use axum::{
    extract::{FromRequestParts, State},
    http::request::Parts,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::services::crypto::{CryptoService, SESSION_COOKIE, SESSION_TTL_MS};
use crate::services::state::AppState;

#[derive(Deserialize)]
pub struct LoginPayload {
    pub password: String,
}

/// Proof that the request carried a valid session cookie.
pub struct Session;

#[axum::async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = state.config.session_secret().ok_or(AppError::Unauthorized)?;
        let jar = CookieJar::from_headers(&parts.headers);
        let token = session_token(&jar).ok_or(AppError::Unauthorized)?;
        if CryptoService::validate_session_token(secret, token) {
            Ok(Session)
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|token| !token.is_empty())
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::milliseconds(SESSION_TTL_MS))
        .build()
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginPayload>,
) -> AppResult<(CookieJar, Json<Value>)> {
    let secret = state
        .config
        .session_secret()
        .ok_or_else(|| anyhow!("APP_SESSION_SECRET is not set"))?;

    if !CryptoService::verify_login(&payload.password, &state.config) {
        warn!("Rejected login attempt");
        return Err(AppError::Unauthorized);
    }

    let token = CryptoService::create_session_token(secret)?;
    info!("Session started");
    Ok((jar.add(session_cookie(token)), Json(json!({ "ok": true }))))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Json(json!({ "ok": true })))
}
