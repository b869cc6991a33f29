//! Identity-provider webhook ingestion.
//!
//! A delivery is processed in two phases: the local mutation is committed
//! first, then the back-reference is pushed to the identity provider. A failed
//! push is logged and never undoes the commit.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::dto::webhook_dto::{
    DeletedEventData, UserEventData, WebhookEnvelope, WebhookEvent, WebhookResponse,
};
use crate::error::{Error, Result};
use crate::models::user::{NewUser, User, UserChanges};
use crate::services::identity_service::IdentityProvider;
use crate::services::user_service::UserStore;
use crate::utils::signature::{WebhookHeaders, WebhookVerifier};

/// Result of the commit phase: what changed locally and whether the identity
/// provider needs its back-reference updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub response: WebhookResponse,
    pub back_reference: Option<BackReference>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackReference {
    pub provider_user_id: String,
    pub local_id: String,
}

#[derive(Clone)]
pub struct WebhookSyncService {
    verifier: Option<WebhookVerifier>,
    store: Arc<dyn UserStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl WebhookSyncService {
    pub fn new(
        verifier: Option<WebhookVerifier>,
        store: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            verifier,
            store,
            identity,
        }
    }

    /// Builds the service from an optional raw `whsec_` secret.
    pub fn from_secret(
        secret: Option<&str>,
        store: Arc<dyn UserStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let verifier = secret.map(WebhookVerifier::new).transpose()?;
        Ok(Self::new(verifier, store, identity))
    }

    pub async fn handle(&self, body: &str, headers: &WebhookHeaders) -> Result<WebhookResponse> {
        self.verify(body, headers)?;

        let event = self.parse(body, headers)?;

        let applied = self.apply(&event).await?;
        if let Some(back_reference) = &applied.back_reference {
            self.sync_back_reference(event.event_type(), back_reference).await;
        }
        Ok(applied.response)
    }

    pub fn verify(&self, body: &str, headers: &WebhookHeaders) -> Result<()> {
        let Some(verifier) = &self.verifier else {
            error!(message_id = %headers.message_id, "Missing CLERK_WEBHOOK_SECRET");
            return Err(Error::Config("Missing CLERK_WEBHOOK_SECRET".to_string()));
        };

        verifier.verify(headers, body).map_err(|e| {
            error!(message_id = %headers.message_id, error = %e, "Webhook verification failed");
            e
        })
    }

    /// Parses a verified body, logging whatever context the envelope carries.
    fn parse(&self, body: &str, headers: &WebhookHeaders) -> Result<WebhookEvent> {
        let envelope: WebhookEnvelope = serde_json::from_str(body).map_err(|e| {
            error!(message_id = %headers.message_id, error = %e, "Webhook payload could not be parsed");
            Error::from(e)
        })?;

        let event_type = envelope.event_type.clone();
        let subject_id = envelope
            .data
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        WebhookEvent::try_from(envelope).map_err(|e| {
            error!(
                message_id = %headers.message_id,
                event_type = %event_type,
                user_id = subject_id.as_deref().unwrap_or("unknown"),
                error = %e,
                "Webhook event data could not be parsed"
            );
            e
        })
    }

    /// Commit phase. Performs at most one local mutation.
    pub async fn apply(&self, event: &WebhookEvent) -> Result<Applied> {
        let result = match event {
            WebhookEvent::UserCreated(data) => self.create_user(data).await,
            WebhookEvent::UserUpdated(data) => self.update_user(data).await,
            WebhookEvent::UserDeleted(data) => self.delete_user(data).await,
            WebhookEvent::Other(event_type) => {
                info!(event_type = %event_type, "Event processed");
                Ok(Applied {
                    response: WebhookResponse::ok("Event processed"),
                    back_reference: None,
                })
            }
        };

        result.map_err(|e| {
            error!(
                event_type = event.event_type(),
                user_id = event.subject_id().unwrap_or("unknown"),
                error = %e,
                "Webhook event was not applied"
            );
            e
        })
    }

    /// Sync phase. Failures are logged and swallowed.
    pub async fn sync_back_reference(&self, event_type: &str, back_reference: &BackReference) -> bool {
        match self
            .identity
            .set_external_id(&back_reference.provider_user_id, &back_reference.local_id)
            .await
        {
            Ok(()) => {
                info!(
                    event_type,
                    user_id = %back_reference.local_id,
                    clerk_user_id = %back_reference.provider_user_id,
                    "Synced externalId to identity provider"
                );
                true
            }
            Err(e) => {
                warn!(
                    event_type,
                    user_id = %back_reference.local_id,
                    clerk_user_id = %back_reference.provider_user_id,
                    error = %e,
                    "Failed to sync externalId to identity provider; local change kept"
                );
                false
            }
        }
    }

    async fn create_user(&self, data: &UserEventData) -> Result<Applied> {
        let email = require_email(data)?;

        let new_user = NewUser::new(
            data.id.as_str(),
            email,
            data.first_name.clone(),
            data.last_name.clone(),
        );
        let user = self.store.insert(new_user).await?;

        info!(
            user_id = %user.id,
            email = %user.email,
            clerk_user_id = %data.id,
            "Created user"
        );

        Ok(Applied {
            response: WebhookResponse::ok(format!("User {} created", email)),
            back_reference: Some(back_reference_for(&data.id, &user)),
        })
    }

    async fn update_user(&self, data: &UserEventData) -> Result<Applied> {
        let email = require_email(data)?;

        let changes = UserChanges::new(email, data.first_name.clone(), data.last_name.clone());
        let user = self.store.update_by_external_id(&data.id, changes).await?;

        info!(
            user_id = %user.id,
            email = %user.email,
            clerk_user_id = %data.id,
            "Updated user"
        );

        let back_reference = (user.id != data.id).then(|| back_reference_for(&data.id, &user));
        Ok(Applied {
            response: WebhookResponse::ok(format!("User {} updated", email)),
            back_reference,
        })
    }

    async fn delete_user(&self, data: &DeletedEventData) -> Result<Applied> {
        let Some(id) = data.id.as_deref().filter(|id| !id.is_empty()) else {
            return Err(Error::Validation("No user ID found".to_string()));
        };

        self.store.delete_by_external_id(id).await?;
        info!(clerk_user_id = %id, "Deleted user");

        Ok(Applied {
            response: WebhookResponse::ok(format!("User {} deleted", id)),
            back_reference: None,
        })
    }
}

fn require_email(data: &UserEventData) -> Result<&str> {
    data.primary_email()
        .ok_or_else(|| Error::Validation("No email found".to_string()))
}

fn back_reference_for(provider_user_id: &str, user: &User) -> BackReference {
    BackReference {
        provider_user_id: provider_user_id.to_string(),
        local_id: user.id.clone(),
    }
}
