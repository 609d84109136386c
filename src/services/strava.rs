// SPDX-License-Identifier: MIT

//! Strava API client and token lifecycle management.
//!
//! Handles:
//! - Activity and zone fetching
//! - OAuth code exchange and token refresh
//! - Rate limit tracking from response headers
//! - Webhook subscription management

use crate::error::AppError;
use serde::Deserialize;
use std::sync::Mutex;

/// Raw rate limit header values from the last Strava response.
#[derive(Debug, Clone)]
pub struct RateHeaders {
    pub limit: String,
    pub usage: String,
}

/// Strava API client.
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
    /// Headers observed on the most recent response
    last_rate: Mutex<Option<RateHeaders>>,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://www.strava.com/api/v3".to_string(),
            oauth_url: "https://www.strava.com/oauth/token".to_string(),
            client_id,
            client_secret,
            last_rate: Mutex::new(None),
        }
    }

    /// Client with URLs pointed at a test server.
    #[cfg(test)]
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            oauth_url: format!("{base_url}/oauth/token"),
            base_url,
            ..Self::new("test_id".to_string(), "test_secret".to_string())
        }
    }

    /// Rate limit headers from the most recent response, if any.
    pub fn take_rate_headers(&self) -> Option<RateHeaders> {
        self.last_rate.lock().ok()?.take()
    }

    fn record_rate_headers(&self, response: &reqwest::Response) {
        let limit = response
            .headers()
            .get("x-ratelimit-limit")
            .and_then(|v| v.to_str().ok());
        let usage = response
            .headers()
            .get("x-ratelimit-usage")
            .and_then(|v| v.to_str().ok());
        if let (Some(limit), Some(usage)) = (limit, usage) {
            if let Ok(mut guard) = self.last_rate.lock() {
                *guard = Some(RateHeaders {
                    limit: limit.to_string(),
                    usage: usage.to_string(),
                });
            }
        }
    }

    /// Get a detailed activity as raw JSON, for archival before parsing.
    pub async fn get_activity_raw(
        &self,
        access_token: &str,
        activity_id: i64,
    ) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);
        self.get_json(&url, access_token, &[]).await
    }

    /// Get an activity's zone distributions. Only available for athletes
    /// with a Strava subscription.
    pub async fn get_activity_zones(
        &self,
        access_token: &str,
        activity_id: i64,
    ) -> Result<Vec<StravaActivityZones>, AppError> {
        let url = format!("{}/activities/{}/zones", self.base_url, activity_id);
        self.get_json(&url, access_token, &[]).await
    }

    /// Get the authenticated athlete's profile.
    pub async fn get_athlete(&self, access_token: &str) -> Result<StravaAthlete, AppError> {
        let url = format!("{}/athlete", self.base_url);
        self.get_json(&url, access_token, &[]).await
    }

    /// List activities (paginated, newest first).
    pub async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);
        self.get_json(
            &url,
            access_token,
            &[
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ],
        )
        .await
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(&self.oauth_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token exchange failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.oauth_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Create a webhook push subscription.
    pub async fn create_subscription(
        &self,
        callback_url: &str,
        verify_token: &str,
    ) -> Result<SubscriptionResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/push_subscriptions", self.base_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("callback_url", callback_url),
                ("verify_token", verify_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Subscription request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// List our push subscriptions.
    pub async fn list_subscriptions(&self) -> Result<Vec<SubscriptionResponse>, AppError> {
        let response = self
            .http
            .get(format!("{}/push_subscriptions", self.base_url))
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Delete a push subscription.
    pub async fn delete_subscription(&self, subscription_id: i64) -> Result<(), AppError> {
        let response = self
            .http
            .delete(format!(
                "{}/push_subscriptions/{}",
                self.base_url, subscription_id
            ))
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response(response).await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        self.record_rate_headers(&response);

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Strava rate limit hit (429)");
            return Err(AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string()));
        }

        if status.as_u16() == 401 {
            return Err(AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string()));
        }

        Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        self.record_rate_headers(&response);

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
                return Err(AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string()));
            }

            if status.as_u16() == 401 {
                return Err(AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string()));
            }

            return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: i64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub premium: Option<bool>,
    #[serde(default)]
    pub summit: Option<bool>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub resource_state: Option<i64>,
}

impl StravaAthlete {
    /// Whether the athlete has a paid subscription. Strava has reported
    /// this as `premium` and later as `summit`.
    pub fn is_premium(&self) -> bool {
        self.premium.or(self.summit).unwrap_or(false)
    }

    /// Profile row linking this athlete to an application user.
    pub fn link(&self, user_id: i64) -> StravaUser {
        StravaUser {
            user_id,
            athlete_id: self.id,
            firstname: self.firstname.clone(),
            lastname: self.lastname.clone(),
            city: self.city.clone(),
            sex: self.sex.clone(),
            premium: self.is_premium(),
            summit: self.summit.unwrap_or(false),
            weight: self.weight,
            resource_state: self.resource_state,
        }
    }
}

/// Detailed Strava activity response.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: i64,
    pub name: Option<String>,
    pub sport_type: String,
    pub start_date: chrono::DateTime<chrono::Utc>,
    pub moving_time: Option<i64>,
    pub elapsed_time: Option<i64>,
    pub distance: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub average_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub map: Option<StravaMap>,
}

impl StravaActivity {
    /// Get the detailed polyline, falling back to summary if not available.
    pub fn get_polyline(&self) -> Option<&str> {
        let map = self.map.as_ref()?;
        map.polyline.as_deref().or(map.summary_polyline.as_deref())
    }
}

/// Activity map data with polylines.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaMap {
    pub polyline: Option<String>,
    pub summary_polyline: Option<String>,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: i64,
    pub sport_type: String,
    pub start_date: chrono::DateTime<chrono::Utc>,
}

/// One zone distribution from the activity zones endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivityZones {
    #[serde(rename = "type")]
    pub zone_type: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub sensor_based: bool,
    #[serde(default)]
    pub custom_zones: bool,
    pub points: Option<f64>,
    #[serde(default)]
    pub distribution_buckets: Vec<StravaZoneBucket>,
}

/// A single distribution bucket. Strava reports power bucket bounds as
/// floats, heart rate as integers.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaZoneBucket {
    pub min: f64,
    pub max: f64,
    pub time: i64,
}

/// Subscription create/list response.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionResponse {
    pub id: i64,
    #[serde(default)]
    pub callback_url: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - token lifecycle on top of the client
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::Database;
use crate::models::{AuthenticationStatus, StravaAuth, StravaUser};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Per-user mutex map to serialize token refresh operations.
pub type RefreshLocks = Arc<DashMap<i64, Arc<AsyncMutex<()>>>>;

/// High-level Strava service that manages token lifecycle and API calls.
#[derive(Clone)]
pub struct StravaService {
    client: Arc<StravaClient>,
    db: Database,
    /// Per-user mutex to prevent duplicate refresh calls.
    refresh_locks: RefreshLocks,
}

impl StravaService {
    pub fn new(client_id: String, client_secret: String, db: Database) -> Self {
        Self {
            client: Arc::new(StravaClient::new(client_id, client_secret)),
            db,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn with_client(client: StravaClient, db: Database) -> Self {
        Self {
            client: Arc::new(client),
            db,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    /// Get a valid (non-expired) access token for the given user,
    /// refreshing through Strava when needed.
    pub async fn get_valid_access_token(&self, user_id: i64) -> Result<String, AppError> {
        // Serialize refreshes per user so concurrent requests don't burn
        // the same refresh token twice
        let lock = self
            .refresh_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let auth = self
            .db
            .strava
            .get_auth(user_id)
            .await?
            .ok_or(AppError::NoStravaAuthorization)?;

        if auth.needs_authorization() {
            return Err(AppError::NoStravaAuthorization);
        }

        if !auth.is_access_token_expired() {
            return Ok(auth.access_token);
        }

        tracing::info!(user_id, "Access token expired, refreshing");

        let refreshed = match self.client.refresh_token(&auth.refresh_token).await {
            Ok(t) => t,
            Err(e) if e.is_strava_token_error() => {
                // Refresh token revoked; force re-authorization
                self.db.strava.clear_tokens(user_id).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        self.persist_rate_headers().await?;

        let expires_at = DateTime::from_timestamp(refreshed.expires_at, 0).unwrap_or_default();
        self.db
            .strava
            .update_token(
                user_id,
                &refreshed.access_token,
                &refreshed.refresh_token,
                expires_at,
            )
            .await?;

        tracing::info!(user_id, "Token refreshed");
        Ok(refreshed.access_token)
    }

    /// Handle the OAuth callback: exchange the code and store tokens plus
    /// the athlete link.
    pub async fn handle_oauth_callback(
        &self,
        user_id: i64,
        code: &str,
        scope: &str,
    ) -> Result<StravaAthlete, AppError> {
        let exchange = self.client.exchange_code(code).await?;
        self.persist_rate_headers().await?;

        let expires_at = DateTime::from_timestamp(exchange.expires_at, 0).unwrap_or_default();

        self.db
            .strava
            .upsert_auth(StravaAuth {
                user_id,
                code: code.to_string(),
                access_token: exchange.access_token.clone(),
                refresh_token: exchange.refresh_token.clone(),
                expires_at,
                scope: scope.to_string(),
                auto_import: true,
            })
            .await?;

        self.db
            .strava
            .upsert_athlete(exchange.athlete.link(user_id))
            .await?;

        tracing::info!(
            user_id,
            athlete_id = exchange.athlete.id,
            "OAuth callback handled, tokens stored"
        );

        Ok(exchange.athlete)
    }

    /// Current authentication state for one user.
    pub async fn authentication_status(
        &self,
        user_id: i64,
    ) -> Result<AuthenticationStatus, AppError> {
        match self.db.strava.get_auth(user_id).await? {
            Some(auth) => Ok(auth.authentication_status()),
            None => Ok(AuthenticationStatus::NotAuthenticated),
        }
    }

    /// Whether we have comfortable rate limit headroom for a batch of
    /// requests right now.
    pub async fn has_capacity(&self) -> Result<bool, AppError> {
        let limit = self.db.strava.get_rate_limit().await?;
        Ok(limit.has_plenty_remaining(Utc::now()))
    }

    /// Whether a single request still fits within the rate limits.
    pub async fn has_any_capacity(&self) -> Result<bool, AppError> {
        let limit = self.db.strava.get_rate_limit().await?;
        Ok(limit.has_usage_remaining(Utc::now()))
    }

    /// Fetch the athlete profile from Strava and store the user link.
    pub async fn sync_athlete(&self, user_id: i64) -> Result<StravaAthlete, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        let result = self.client.get_athlete(&access_token).await;
        self.persist_rate_headers().await?;
        let athlete = result?;

        self.db.strava.upsert_athlete(athlete.link(user_id)).await?;

        Ok(athlete)
    }

    /// Persist any rate limit headers the client observed.
    async fn persist_rate_headers(&self) -> Result<(), AppError> {
        if let Some(headers) = self.client.take_rate_headers() {
            let mut limit = self.db.strava.get_rate_limit().await?;
            limit.update_from_headers(&headers.limit, &headers.usage);
            self.db.strava.save_rate_limit(limit).await?;
        }
        Ok(())
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    pub async fn get_activity_raw(
        &self,
        user_id: i64,
        activity_id: i64,
    ) -> Result<serde_json::Value, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        let result = self
            .client
            .get_activity_raw(&access_token, activity_id)
            .await;
        self.persist_rate_headers().await?;
        result
    }

    pub async fn get_activity_zones(
        &self,
        user_id: i64,
        activity_id: i64,
    ) -> Result<Vec<StravaActivityZones>, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        let result = self
            .client
            .get_activity_zones(&access_token, activity_id)
            .await;
        self.persist_rate_headers().await?;
        result
    }

    pub async fn list_activities(
        &self,
        user_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        let result = self
            .client
            .list_activities(&access_token, page, per_page)
            .await;
        self.persist_rate_headers().await?;
        result
    }

    // ─── Subscription API ────────────────────────────────────────────────────

    pub async fn create_subscription(
        &self,
        callback_url: &str,
        verify_token: &str,
    ) -> Result<SubscriptionResponse, AppError> {
        let result = self
            .client
            .create_subscription(callback_url, verify_token)
            .await;
        self.persist_rate_headers().await?;
        result
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<SubscriptionResponse>, AppError> {
        let result = self.client.list_subscriptions().await;
        self.persist_rate_headers().await?;
        result
    }

    pub async fn delete_subscription(&self, subscription_id: i64) -> Result<(), AppError> {
        let result = self.client.delete_subscription(subscription_id).await;
        self.persist_rate_headers().await?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_database;
    use chrono::Duration;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(db: Database, server: &MockServer) -> StravaService {
        StravaService::with_client(StravaClient::with_base_url(server.uri()), db)
    }

    async fn store_auth(db: &Database, user_id: i64, expires_in_secs: i64) {
        db.strava
            .upsert_auth(StravaAuth {
                user_id,
                code: "code".to_string(),
                access_token: "old-access".to_string(),
                refresh_token: "old-refresh".to_string(),
                expires_at: Utc::now() + Duration::seconds(expires_in_secs),
                scope: "read,activity:read_all".to_string(),
                auto_import: true,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_stored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "expires_at": (Utc::now() + Duration::hours(6)).timestamp(),
            })))
            .mount(&server)
            .await;

        let db = create_test_database();
        let user = db.users.get_or_create("anna").await.unwrap();
        // Within the refresh margin, so the token counts as expired
        store_auth(&db, user.id, 60).await;

        let service = service(db.clone(), &server);
        let token = service.get_valid_access_token(user.id).await.unwrap();
        assert_eq!(token, "new-access");

        let auth = db.strava.get_auth(user.id).await.unwrap().unwrap();
        assert_eq!(auth.access_token, "new-access");
        assert_eq!(auth.refresh_token, "new-refresh");
        assert!(auth.has_valid_access_token());
    }

    #[tokio::test]
    async fn test_valid_token_is_returned_without_refresh() {
        let server = MockServer::start().await;

        let db = create_test_database();
        let user = db.users.get_or_create("anna").await.unwrap();
        store_auth(&db, user.id, 3600).await;

        // No mock mounted: any request to the server would fail
        let service = service(db, &server);
        let token = service.get_valid_access_token(user.id).await.unwrap();
        assert_eq!(token, "old-access");
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_clears_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "Authorization Error"
            })))
            .mount(&server)
            .await;

        let db = create_test_database();
        let user = db.users.get_or_create("anna").await.unwrap();
        store_auth(&db, user.id, 60).await;

        let service = service(db.clone(), &server);
        let err = service.get_valid_access_token(user.id).await.unwrap_err();
        assert!(err.is_strava_token_error());

        // Tokens are gone, the user has to go through OAuth again
        let auth = db.strava.get_auth(user.id).await.unwrap().unwrap();
        assert!(auth.needs_authorization());
    }

    #[tokio::test]
    async fn test_oauth_callback_stores_tokens_and_athlete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access",
                "refresh_token": "refresh",
                "expires_at": (Utc::now() + Duration::hours(6)).timestamp(),
                "athlete": {
                    "id": 4242,
                    "firstname": "Anna",
                    "city": "Amsterdam",
                    "premium": true
                }
            })))
            .mount(&server)
            .await;

        let db = create_test_database();
        let user = db.users.get_or_create("anna").await.unwrap();

        let service = service(db.clone(), &server);
        let athlete = service
            .handle_oauth_callback(user.id, "the-code", "read,activity:read_all")
            .await
            .unwrap();
        assert_eq!(athlete.id, 4242);

        let auth = db.strava.get_auth(user.id).await.unwrap().unwrap();
        assert_eq!(auth.code, "the-code");
        assert!(auth.auto_import);
        assert!(auth.has_valid_scope());
        assert!(auth.has_valid_access_token());

        let stored = db.strava.get_athlete(user.id).await.unwrap().unwrap();
        assert_eq!(stored.athlete_id, 4242);
        assert_eq!(stored.firstname.as_deref(), Some("Anna"));
        assert!(stored.premium);
    }

    #[tokio::test]
    async fn test_rate_headers_are_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/activities/7"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": 7}))
                    .insert_header("X-RateLimit-Limit", "200,2000")
                    .insert_header("X-RateLimit-Usage", "33,150"),
            )
            .mount(&server)
            .await;

        let db = create_test_database();
        let user = db.users.get_or_create("anna").await.unwrap();
        store_auth(&db, user.id, 3600).await;

        let service = service(db.clone(), &server);
        service.get_activity_raw(user.id, 7).await.unwrap();

        let limit = db.strava.get_rate_limit().await.unwrap();
        assert_eq!(limit.short_limit, 200);
        assert_eq!(limit.daily_limit, 2000);
        assert_eq!(limit.short_usage, 33);
        assert_eq!(limit.daily_usage, 150);
    }
}
