// SPDX-License-Identifier: MIT

//! Strava integration models: OAuth credentials, imports, rate limits
//! and webhook subscriptions.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Margin before actual expiry at which we treat an access token as stale.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Scopes that allow reading a user's activities.
pub const ACTIVITY_READ_SCOPES: [&str; 2] = ["activity:read", "activity:read_all"];

/// Stored OAuth credentials for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaAuth {
    pub user_id: i64,
    /// Authorization code from the most recent OAuth callback
    pub code: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    /// Comma-separated scopes granted during authorization
    pub scope: String,
    /// Whether new Strava activities are imported automatically
    pub auto_import: bool,
}

impl StravaAuth {
    /// Whether the user still has to go through the OAuth flow.
    pub fn needs_authorization(&self) -> bool {
        self.access_token.is_empty() || self.refresh_token.is_empty()
    }

    /// Whether the access token is expired (with a refresh margin).
    pub fn is_access_token_expired(&self) -> bool {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        Utc::now() + margin >= self.expires_at
    }

    /// Whether we hold a usable access token right now.
    pub fn has_valid_access_token(&self) -> bool {
        !self.needs_authorization() && !self.is_access_token_expired()
    }

    /// Whether the granted scopes cover activity reads.
    pub fn has_valid_scope(&self) -> bool {
        self.scope
            .split(',')
            .any(|s| ACTIVITY_READ_SCOPES.contains(&s.trim()))
    }

    /// Apply a token response from Strava.
    pub fn update_token(&mut self, access_token: String, refresh_token: String, expires_at: DateTime<Utc>) {
        self.access_token = access_token;
        self.refresh_token = refresh_token;
        self.expires_at = expires_at;
    }
}

/// Overall authentication state for one user, as shown to the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationStatus {
    Authenticated,
    NotAuthenticated,
    Expired,
}

impl StravaAuth {
    pub fn authentication_status(&self) -> AuthenticationStatus {
        if self.needs_authorization() || !self.has_valid_scope() {
            AuthenticationStatus::NotAuthenticated
        } else if self.is_access_token_expired() {
            AuthenticationStatus::Expired
        } else {
            AuthenticationStatus::Authenticated
        }
    }
}

/// Link between an application user and a Strava athlete, with the
/// profile fields Strava returns alongside the token exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaUser {
    pub user_id: i64,
    pub athlete_id: i64,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub city: Option<String>,
    pub sex: Option<String>,
    /// Whether the athlete has a Strava subscription (zones are premium-only)
    pub premium: bool,
    /// Newer name for the same subscription flag
    pub summit: bool,
    pub weight: Option<f64>,
    pub resource_state: Option<i64>,
}

/// Mapping from a Strava sport type to one of our disciplines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaTypeMapping {
    pub id: i64,
    /// Strava sport type string (e.g., "VirtualRide")
    pub strava_type: String,
    /// Discipline this maps to; None until someone assigns it
    pub discipline_id: Option<i64>,
}

/// Raw JSON payload saved for every imported Strava object.
#[derive(Debug, Clone)]
pub struct StravaActivityImport {
    pub id: i64,
    pub strava_id: i64,
    /// One of [`StravaActivityImport::ACTIVITY`] or
    /// [`StravaActivityImport::ACTIVITY_ZONES`]
    pub object_type: String,
    pub payload: serde_json::Value,
    pub imported_at: DateTime<Utc>,
}

impl StravaActivityImport {
    pub const ACTIVITY: &'static str = "activity";
    pub const ACTIVITY_ZONES: &'static str = "activity_zones";
}

/// Rate limit state parsed from Strava response headers.
///
/// Strava reports `X-RateLimit-Limit: short,daily` and
/// `X-RateLimit-Usage: short,daily`, where the short window is 15 minutes
/// aligned to the quarter hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaRateLimit {
    pub short_limit: u32,
    pub daily_limit: u32,
    pub short_usage: u32,
    pub daily_usage: u32,
    /// When the usage numbers were last observed
    pub updated_at: DateTime<Utc>,
}

impl Default for StravaRateLimit {
    fn default() -> Self {
        Self {
            short_limit: 100,
            daily_limit: 1000,
            short_usage: 0,
            daily_usage: 0,
            updated_at: Utc::now(),
        }
    }
}

impl StravaRateLimit {
    /// Requests we want to keep in reserve within the 15-minute window.
    pub const SHORT_HEADROOM: u32 = 20;
    /// Requests we want to keep in reserve within the day.
    pub const DAILY_HEADROOM: u32 = 200;

    /// Parse a "short,daily" header pair.
    fn parse_pair(value: &str) -> Option<(u32, u32)> {
        let mut parts = value.split(',');
        let short = parts.next()?.trim().parse().ok()?;
        let daily = parts.next()?.trim().parse().ok()?;
        Some((short, daily))
    }

    /// Update limits and usage from response header values.
    pub fn update_from_headers(&mut self, limit: &str, usage: &str) {
        if let Some((short, daily)) = Self::parse_pair(limit) {
            self.short_limit = short;
            self.daily_limit = daily;
        }
        if let Some((short, daily)) = Self::parse_pair(usage) {
            self.short_usage = short;
            self.daily_usage = daily;
        }
        self.updated_at = Utc::now();
    }

    /// Start of the 15-minute window a timestamp falls in.
    fn quarter_hour_start(at: DateTime<Utc>) -> DateTime<Utc> {
        let minute = at.minute() - at.minute() % 15;
        at.date_naive()
            .and_hms_opt(at.hour(), minute, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or(at)
    }

    /// Short usage, treating observations from a previous window as reset.
    pub fn effective_short_usage(&self, now: DateTime<Utc>) -> u32 {
        if self.updated_at < Self::quarter_hour_start(now) {
            0
        } else {
            self.short_usage
        }
    }

    /// Daily usage, treating observations from a previous UTC day as reset.
    pub fn effective_daily_usage(&self, now: DateTime<Utc>) -> u32 {
        if self.updated_at.ordinal() != now.ordinal() || self.updated_at.year() != now.year() {
            0
        } else {
            self.daily_usage
        }
    }

    /// Whether a single request still fits within the limits.
    pub fn has_usage_remaining(&self, now: DateTime<Utc>) -> bool {
        self.effective_short_usage(now) < self.short_limit
            && self.effective_daily_usage(now) < self.daily_limit
    }

    /// Whether we have comfortable headroom for a batch of requests:
    /// strictly more than the reserve must remain in both windows.
    pub fn has_plenty_remaining(&self, now: DateTime<Utc>) -> bool {
        self.effective_short_usage(now) + Self::SHORT_HEADROOM < self.short_limit
            && self.effective_daily_usage(now) + Self::DAILY_HEADROOM < self.daily_limit
    }
}

/// Lifecycle of our webhook subscription with Strava.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    /// Creation requested, callback not yet verified
    Created,
    /// Strava hit our callback with a valid hub challenge
    Validated,
    /// Subscription confirmed active against the Strava API
    Active,
    /// Subscription exists locally but Strava no longer knows it
    Invalid,
}

impl SubscriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Created => "created",
            SubscriptionState::Validated => "validated",
            SubscriptionState::Active => "active",
            SubscriptionState::Invalid => "invalid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(SubscriptionState::Created),
            "validated" => Some(SubscriptionState::Validated),
            "active" => Some(SubscriptionState::Active),
            "invalid" => Some(SubscriptionState::Invalid),
            _ => None,
        }
    }
}

/// Our webhook subscription record. There is no separate enabled flag:
/// `state` being Active is what marks the subscription as live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaSubscription {
    pub id: i64,
    /// Subscription ID assigned by Strava, once known
    pub strava_subscription_id: Option<i64>,
    /// Random token Strava echoes back during callback validation
    pub verify_token: String,
    pub callback_url: String,
    pub state: SubscriptionState,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn auth(expires_in_secs: i64, scope: &str) -> StravaAuth {
        StravaAuth {
            user_id: 1,
            code: "code".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
            scope: scope.to_string(),
            auto_import: true,
        }
    }

    #[test]
    fn test_auth_predicates() {
        let valid = auth(3600, "read,activity:read");
        assert!(!valid.needs_authorization());
        assert!(!valid.is_access_token_expired());
        assert!(valid.has_valid_access_token());
        assert!(valid.has_valid_scope());
        assert_eq!(valid.authentication_status(), AuthenticationStatus::Authenticated);

        // Within the refresh margin counts as expired
        let stale = auth(60, "activity:read");
        assert!(stale.is_access_token_expired());
        assert_eq!(stale.authentication_status(), AuthenticationStatus::Expired);

        let mut empty = auth(3600, "activity:read");
        empty.access_token.clear();
        assert!(empty.needs_authorization());
        assert_eq!(empty.authentication_status(), AuthenticationStatus::NotAuthenticated);

        assert!(auth(3600, "read,activity:read_all").has_valid_scope());

        let wrong_scope = auth(3600, "read");
        assert!(!wrong_scope.has_valid_scope());
        assert_eq!(
            wrong_scope.authentication_status(),
            AuthenticationStatus::NotAuthenticated
        );
    }

    #[test]
    fn test_rate_limit_headers() {
        let mut limit = StravaRateLimit::default();
        limit.update_from_headers("200,2000", "87,743");
        assert_eq!(limit.short_limit, 200);
        assert_eq!(limit.daily_limit, 2000);
        assert_eq!(limit.short_usage, 87);
        assert_eq!(limit.daily_usage, 743);
    }

    #[test]
    fn test_rate_limit_window_reset() {
        let observed = Utc.with_ymd_and_hms(2023, 8, 23, 10, 7, 0).unwrap();
        let limit = StravaRateLimit {
            short_limit: 100,
            daily_limit: 1000,
            short_usage: 95,
            daily_usage: 400,
            updated_at: observed,
        };

        // Same quarter hour: usage still counts
        let same_window = Utc.with_ymd_and_hms(2023, 8, 23, 10, 14, 0).unwrap();
        assert_eq!(limit.effective_short_usage(same_window), 95);
        assert!(!limit.has_plenty_remaining(same_window));

        // Next quarter hour: short usage has reset
        let next_window = Utc.with_ymd_and_hms(2023, 8, 23, 10, 16, 0).unwrap();
        assert_eq!(limit.effective_short_usage(next_window), 0);
        assert!(limit.has_plenty_remaining(next_window));

        // Next day: daily usage has reset too
        let next_day = Utc.with_ymd_and_hms(2023, 8, 24, 0, 1, 0).unwrap();
        assert_eq!(limit.effective_daily_usage(next_day), 0);
    }

    #[test]
    fn test_rate_limit_headroom_is_strict() {
        let now = Utc.with_ymd_and_hms(2023, 8, 23, 10, 7, 0).unwrap();
        let limit = StravaRateLimit {
            short_limit: 100,
            daily_limit: 1000,
            // Exactly the reserve left in the short window
            short_usage: 80,
            daily_usage: 0,
            updated_at: now,
        };
        assert!(!limit.has_plenty_remaining(now));
        assert!(limit.has_usage_remaining(now));

        let mut roomy = limit.clone();
        roomy.short_usage = 79;
        assert!(roomy.has_plenty_remaining(now));
    }

    #[test]
    fn test_subscription_state_roundtrip() {
        for state in [
            SubscriptionState::Created,
            SubscriptionState::Validated,
            SubscriptionState::Active,
            SubscriptionState::Invalid,
        ] {
            assert_eq!(SubscriptionState::parse(state.as_str()), Some(state));
        }
        assert_eq!(SubscriptionState::parse("bogus"), None);
    }
}
