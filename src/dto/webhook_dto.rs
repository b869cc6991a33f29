use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};

pub const USER_CREATED: &str = "user.created";
pub const USER_UPDATED: &str = "user.updated";
pub const USER_DELETED: &str = "user.deleted";

/// Outer shape shared by every identity-provider event.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
    pub email_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserEventData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl UserEventData {
    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses
            .first()
            .map(|e| e.email_address.as_str())
            .filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletedEventData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub deleted: Option<bool>,
}

#[derive(Debug, Clone)]
pub enum WebhookEvent {
    UserCreated(UserEventData),
    UserUpdated(UserEventData),
    UserDeleted(DeletedEventData),
    Other(String),
}

impl WebhookEvent {
    pub fn parse(body: &str) -> Result<Self> {
        let envelope: WebhookEnvelope = serde_json::from_str(body)?;
        Self::try_from(envelope)
    }

    pub fn event_type(&self) -> &str {
        match self {
            WebhookEvent::UserCreated(_) => USER_CREATED,
            WebhookEvent::UserUpdated(_) => USER_UPDATED,
            WebhookEvent::UserDeleted(_) => USER_DELETED,
            WebhookEvent::Other(event_type) => event_type.as_str(),
        }
    }

    pub fn subject_id(&self) -> Option<&str> {
        match self {
            WebhookEvent::UserCreated(data) | WebhookEvent::UserUpdated(data) => Some(&data.id),
            WebhookEvent::UserDeleted(data) => data.id.as_deref(),
            WebhookEvent::Other(_) => None,
        }
    }
}

impl TryFrom<WebhookEnvelope> for WebhookEvent {
    type Error = Error;

    fn try_from(envelope: WebhookEnvelope) -> Result<Self> {
        let event = match envelope.event_type.as_str() {
            USER_CREATED => WebhookEvent::UserCreated(serde_json::from_value(envelope.data)?),
            USER_UPDATED => WebhookEvent::UserUpdated(serde_json::from_value(envelope.data)?),
            USER_DELETED => WebhookEvent::UserDeleted(serde_json::from_value(envelope.data)?),
            _ => WebhookEvent::Other(envelope.event_type),
        };
        Ok(event)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
}

impl WebhookResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
