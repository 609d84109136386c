// SPDX-License-Identifier: MIT

//! Strava OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava", get(auth_start))
        .route("/auth/strava/callback", get(auth_callback))
        .route("/auth/logout", get(logout))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Who is connecting their Strava account
    username: String,
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses FRONTEND_URL env var.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to Strava authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
    headers: axum::http::HeaderMap,
) -> Result<Redirect> {
    if params.username.trim().is_empty() {
        return Err(AppError::BadRequest("username is required".to_string()));
    }

    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    // Data payload: "username|frontend_url|timestamp_hex"
    let state_payload = format!("{}|{}|{:x}", params.username, frontend_url, timestamp);

    let mut mac = HmacSha256::new_from_slice(&state.config.oauth_state_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", state_payload, hex::encode(signature));
    let oauth_state = URL_SAFE_NO_PAD.encode(signed_state.as_bytes());

    let callback_url = format!("{}/auth/strava/callback", request_base_url(&headers));

    let auth_url = format!(
        "https://www.strava.com/oauth/authorize?\
         client_id={}&\
         redirect_uri={}&\
         response_type=code&\
         scope=read,activity:read_all&\
         state={}",
        state.config.strava_client_id,
        urlencoding::encode(&callback_url),
        oauth_state
    );

    tracing::info!(
        username = %params.username,
        "Starting OAuth flow, redirecting to Strava"
    );

    Ok(Redirect::temporary(&auth_url))
}

/// Scheme and host of the incoming request, for callback URLs.
fn request_base_url(headers: &axum::http::HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "localhost:8080".to_string());

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}", scheme, host)
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, create session cookie.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let decoded = verify_and_decode_state(&params.state, &state.config.oauth_state_key)
        .ok_or_else(|| {
            tracing::error!("Invalid or tampered OAuth state parameter");
            AppError::BadRequest("Invalid state parameter".to_string())
        })?;

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        let redirect = format!("{}?error={}", decoded.frontend_url, error);
        return Ok((jar, Redirect::temporary(&redirect)));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;
    let scope = params.scope.unwrap_or_default();

    let user = state.db.users.get_or_create(&decoded.username).await?;

    tracing::info!(username = %user.username, "Exchanging authorization code for tokens");

    let athlete = state
        .strava
        .handle_oauth_callback(user.id, &code, &scope)
        .await?;

    tracing::info!(
        user_id = user.id,
        athlete_id = athlete.id,
        "OAuth successful, tokens stored"
    );

    let jwt = create_jwt(user.id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let cookie = Cookie::build((SESSION_COOKIE, jwt))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((
        jar.add(cookie),
        Redirect::temporary(&decoded.frontend_url),
    ))
}

/// Verified contents of the OAuth state parameter.
struct DecodedState {
    username: String,
    frontend_url: String,
}

/// Verify HMAC signature and decode the OAuth state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<DecodedState> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "username|frontend_url|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(4, '|').collect();
    if parts.len() != 4 {
        return None;
    }

    let username = parts[0];
    let frontend_url = parts[1];
    let timestamp_hex = parts[2];
    let signature_hex = parts[3];

    let payload = format!("{}|{}|{}", username, frontend_url, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("OAuth state signature mismatch");
        return None;
    }

    Some(DecodedState {
        username: username.to_string(),
        frontend_url: frontend_url.to_string(),
    })
}

/// Logout - clear the session cookie.
async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .build();
    (jar.remove(cookie), Redirect::temporary("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_state(username: &str, frontend_url: &str, secret: &[u8]) -> String {
        let payload = format!("{}|{}|{:x}", username, frontend_url, 1234567890u128);
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature).as_bytes())
    }

    #[test]
    fn test_verify_and_decode_state_success() {
        let secret = b"secret_key";
        let encoded = signed_state("anna", "https://example.com", secret);

        let result = verify_and_decode_state(&encoded, secret).unwrap();
        assert_eq!(result.username, "anna");
        assert_eq!(result.frontend_url, "https://example.com");
    }

    #[test]
    fn test_verify_and_decode_state_wrong_secret() {
        let encoded = signed_state("anna", "https://example.com", b"secret_key");
        assert!(verify_and_decode_state(&encoded, b"wrong_key").is_none());
    }

    #[test]
    fn test_verify_and_decode_state_tampered() {
        let secret = b"secret_key";
        let encoded = signed_state("anna", "https://example.com", secret);
        let decoded = URL_SAFE_NO_PAD.decode(&encoded).unwrap();
        let tampered = String::from_utf8(decoded)
            .unwrap()
            .replace("anna", "bert");
        let encoded = URL_SAFE_NO_PAD.encode(tampered.as_bytes());

        assert!(verify_and_decode_state(&encoded, secret).is_none());
    }

    #[test]
    fn test_verify_and_decode_state_malformed() {
        let secret = b"secret_key";
        let encoded = URL_SAFE_NO_PAD.encode("invalid|format");
        assert!(verify_and_decode_state(&encoded, secret).is_none());
    }
}
