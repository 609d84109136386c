// SPDX-License-Identifier: MIT

//! Webhook subscription lifecycle.
//!
//! Strava validates the callback URL synchronously while the create call
//! is in flight: it sends a GET with our verify token and expects the
//! hub challenge echoed back. The local record therefore exists before
//! the create call so the webhook handler can find the token.

use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{StravaSubscription, SubscriptionState};
use crate::services::strava::StravaService;

#[derive(Clone)]
pub struct SubscriptionService {
    db: Database,
    strava: StravaService,
}

impl SubscriptionService {
    pub fn new(db: Database, strava: StravaService) -> Self {
        Self { db, strava }
    }

    /// The current subscription record, if any.
    pub async fn status(&self) -> Result<Option<StravaSubscription>> {
        self.db.strava.current_subscription().await
    }

    /// Create a subscription with Strava.
    pub async fn start(&self, callback_url: &str) -> Result<StravaSubscription> {
        if let Some(existing) = self.db.strava.current_subscription().await? {
            if existing.state != SubscriptionState::Invalid {
                return Err(AppError::BadRequest(format!(
                    "Subscription already exists in state {}",
                    existing.state.as_str()
                )));
            }
            self.db.strava.delete_subscription(existing.id).await?;
        }

        // A subscription can survive at Strava after our records are gone,
        // and Strava allows only one per application
        for remote in self.strava.list_subscriptions().await? {
            tracing::warn!(
                subscription_id = remote.id,
                "Deleting dangling subscription at Strava"
            );
            self.strava.delete_subscription(remote.id).await?;
        }

        let verify_token = Uuid::new_v4().to_string();
        let record = StravaSubscription {
            id: 0,
            strava_subscription_id: None,
            verify_token: verify_token.clone(),
            callback_url: callback_url.to_string(),
            state: SubscriptionState::Created,
            created_at: Utc::now(),
        };
        let id = self.db.strava.insert_subscription(record).await?;

        let response = match self
            .strava
            .create_subscription(callback_url, &verify_token)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // Creation failed, drop the dangling local record
                self.db.strava.delete_subscription(id).await?;
                return Err(e);
            }
        };

        self.db
            .strava
            .set_subscription_strava_id(id, response.id)
            .await?;

        // The validation callback fires while create_subscription is in
        // flight, so a successful create means the callback worked
        self.db
            .strava
            .update_subscription_state(id, SubscriptionState::Active)
            .await?;

        tracing::info!(
            subscription_id = response.id,
            "Webhook subscription created"
        );

        self.db
            .strava
            .current_subscription()
            .await?
            .ok_or_else(|| AppError::NotFound("subscription".to_string()))
    }

    /// Handle the validation GET from Strava. Returns true when the
    /// verify token matches a pending subscription.
    pub async fn handle_validation(&self, verify_token: &str) -> Result<bool> {
        let Some(sub) = self
            .db
            .strava
            .find_subscription_by_verify_token(verify_token)
            .await?
        else {
            tracing::warn!("Webhook validation with unknown verify token");
            return Ok(false);
        };

        if sub.state == SubscriptionState::Created {
            self.db
                .strava
                .update_subscription_state(sub.id, SubscriptionState::Validated)
                .await?;
        }
        Ok(true)
    }

    /// Verify our subscription against the Strava API and update its state.
    pub async fn check(&self) -> Result<SubscriptionState> {
        let sub = self
            .db
            .strava
            .current_subscription()
            .await?
            .ok_or_else(|| AppError::NotFound("subscription".to_string()))?;

        let remote = self.strava.list_subscriptions().await?;
        if remote.len() > 1 {
            return Err(AppError::StravaApi(format!(
                "{} subscriptions registered at Strava, expected at most one",
                remote.len()
            )));
        }
        let known = sub
            .strava_subscription_id
            .map(|id| remote.iter().any(|r| r.id == id))
            .unwrap_or(false);

        let state = if known {
            SubscriptionState::Active
        } else {
            tracing::warn!("Subscription no longer known to Strava");
            SubscriptionState::Invalid
        };

        if state != sub.state {
            self.db
                .strava
                .update_subscription_state(sub.id, state)
                .await?;
        }
        Ok(state)
    }

    /// Delete the subscription. Only deletes at Strava when the remote
    /// subscription actually matches ours; otherwise the local record is
    /// marked invalid instead.
    pub async fn stop(&self) -> Result<()> {
        let sub = self
            .db
            .strava
            .current_subscription()
            .await?
            .ok_or_else(|| AppError::NotFound("subscription".to_string()))?;

        let remote = self.strava.list_subscriptions().await?;
        match sub.strava_subscription_id {
            Some(strava_id) if remote.iter().any(|r| r.id == strava_id) => {
                self.strava.delete_subscription(strava_id).await?;
                self.db.strava.delete_subscription(sub.id).await?;
                tracing::info!("Webhook subscription stopped");
            }
            _ => {
                tracing::warn!("Subscription not found at Strava, marking invalid");
                self.db
                    .strava
                    .update_subscription_state(sub.id, SubscriptionState::Invalid)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_database;
    use crate::services::strava::StravaClient;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(db: crate::db::Database, server: &MockServer) -> SubscriptionService {
        let strava =
            StravaService::with_client(StravaClient::with_base_url(server.uri()), db.clone());
        SubscriptionService::new(db, strava)
    }

    #[tokio::test]
    async fn test_start_clears_dangling_remote_subscription() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/push_subscriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 5, "callback_url": "https://old.example.com/strava/webhook"}
            ])))
            .mount(&server)
            .await;
        // The leftover must be removed before Strava accepts a new one
        Mock::given(method("DELETE"))
            .and(path("/push_subscriptions/5"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/push_subscriptions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 9})))
            .mount(&server)
            .await;

        let db = create_test_database();
        let service = service(db.clone(), &server);

        let sub = service
            .start("https://example.com/strava/webhook")
            .await
            .unwrap();
        assert_eq!(sub.state, SubscriptionState::Active);
        assert_eq!(sub.strava_subscription_id, Some(9));
    }

    #[tokio::test]
    async fn test_start_refuses_when_already_subscribed() {
        let server = MockServer::start().await;
        let db = create_test_database();
        db.strava
            .insert_subscription(StravaSubscription {
                id: 0,
                strava_subscription_id: Some(9),
                verify_token: "tok".to_string(),
                callback_url: "https://example.com/strava/webhook".to_string(),
                state: SubscriptionState::Active,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let service = service(db, &server);
        let err = service
            .start("https://example.com/strava/webhook")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
