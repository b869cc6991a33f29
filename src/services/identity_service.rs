use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

/// Outbound side of the user sync: writes the local id back onto the
/// identity provider's user record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn set_external_id(&self, provider_user_id: &str, local_id: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct UpdateUserRequest<'a> {
    external_id: &'a str,
}

#[derive(Clone)]
pub struct ClerkClient {
    client: Client,
    api_url: Url,
    secret_key: Option<String>,
}

impl ClerkClient {
    pub fn new(api_url: Url, secret_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        let secret_key = secret_key.filter(|key| !key.trim().is_empty());
        if secret_key.is_some() {
            info!(api_url = %api_url, "Identity provider back-reference sync enabled");
        } else {
            info!("Identity provider back-reference sync disabled (CLERK_SECRET_KEY not set)");
        }

        Ok(Self {
            client,
            api_url,
            secret_key,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.secret_key.is_some()
    }

    fn user_url(&self, provider_user_id: &str) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config("CLERK_API_URL cannot be a base URL".to_string()))?
            .pop_if_empty()
            .push("users")
            .push(provider_user_id);
        Ok(url)
    }
}

#[async_trait]
impl IdentityProvider for ClerkClient {
    async fn set_external_id(&self, provider_user_id: &str, local_id: &str) -> Result<()> {
        let Some(secret_key) = &self.secret_key else {
            return Err(Error::Config("CLERK_SECRET_KEY is not configured".to_string()));
        };

        let url = self.user_url(provider_user_id)?;
        debug!(provider_user_id, local_id, "Updating identity provider external_id");

        let resp = self
            .client
            .patch(url)
            .bearer_auth(secret_key)
            .json(&UpdateUserRequest {
                external_id: local_id,
            })
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(Error::Upstream(format!(
                "identity provider returned {}: {}",
                status, body
            )))
        }
    }
}
