//! Customer identity resolution.

use std::collections::HashMap;
use std::sync::Arc;

use common::CustomerId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::IdentityError;
use crate::services::{CustomerDirectory, CustomerProfile};

/// Profile of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginContext {
    pub account_id: String,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
}

/// Contact data typed in by a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestContact {
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Who is booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum CustomerMode {
    Authenticated(LoginContext),
    Guest(GuestContact),
}

/// Resolves the customer a booking is made for.
///
/// Signed-in users map to their account's customer, created from the profile
/// if missing. Guests get a fresh customer: a quick create first, then a full
/// create with placeholder fields. When a checkout session token is given the
/// result is remembered for that token, so a resubmitted checkout reuses the
/// guest created the first time.
pub struct IdentityResolver<D: CustomerDirectory> {
    directory: D,
    sessions: Arc<RwLock<HashMap<String, CustomerId>>>,
}

impl<D: CustomerDirectory> IdentityResolver<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            sessions: Arc::default(),
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    #[tracing::instrument(skip_all, fields(guest = matches!(mode, CustomerMode::Guest(_))))]
    pub async fn resolve_customer(
        &self,
        mode: &CustomerMode,
        session_token: Option<&str>,
    ) -> Result<CustomerId, IdentityError> {
        let session_token = session_token.map(str::trim).filter(|t| !t.is_empty());

        if let Some(token) = session_token
            && let Some(customer_id) = self.sessions.read().await.get(token).copied()
        {
            tracing::debug!(%customer_id, "customer reused from checkout session");
            return Ok(customer_id);
        }

        let customer_id = match mode {
            CustomerMode::Authenticated(login) => self.resolve_account(login).await?,
            CustomerMode::Guest(contact) => self.create_guest(contact).await?,
        };

        if let Some(token) = session_token {
            self.sessions
                .write()
                .await
                .insert(token.to_string(), customer_id);
        }
        Ok(customer_id)
    }

    async fn resolve_account(&self, login: &LoginContext) -> Result<CustomerId, IdentityError> {
        let mut attempts = Vec::new();

        match self.directory.find_by_account(&login.account_id).await {
            Ok(Some(customer_id)) => return Ok(customer_id),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "account lookup failed, creating from profile");
                attempts.push(format!("lookup: {e}"));
            }
        }

        let profile = CustomerProfile {
            full_name: login.full_name.trim().to_string(),
            phone: login.phone.trim().to_string(),
            email: non_blank(login.email.as_deref()),
            address: None,
            account_id: Some(login.account_id.clone()),
            is_guest: false,
        };
        match self.directory.create(&profile).await {
            Ok(customer_id) => {
                tracing::info!(%customer_id, "customer created for account");
                Ok(customer_id)
            }
            Err(e) => {
                attempts.push(format!("create: {e}"));
                Err(IdentityError::Exhausted(attempts))
            }
        }
    }

    async fn create_guest(&self, contact: &GuestContact) -> Result<CustomerId, IdentityError> {
        let full_name = contact.full_name.trim();
        let phone = contact.phone.trim();

        let mut missing = Vec::new();
        if full_name.is_empty() {
            missing.push("fullName");
        }
        if phone.is_empty() {
            missing.push("phone");
        }
        if !missing.is_empty() {
            return Err(IdentityError::MissingFields(missing));
        }

        let profile = CustomerProfile {
            full_name: full_name.to_string(),
            phone: phone.to_string(),
            email: non_blank(contact.email.as_deref()),
            address: None,
            account_id: None,
            is_guest: true,
        };

        let quick_error = match self.directory.quick_create(&profile).await {
            Ok(customer_id) => {
                tracing::info!(%customer_id, "guest customer created");
                return Ok(customer_id);
            }
            Err(e) => e,
        };
        tracing::warn!(error = %quick_error, "quick create failed, retrying with placeholders");

        let conservative = CustomerProfile {
            email: profile.email.clone().or_else(|| Some(placeholder_email(phone))),
            address: Some(PLACEHOLDER_ADDRESS.to_string()),
            ..profile
        };
        match self.directory.create(&conservative).await {
            Ok(customer_id) => {
                tracing::info!(%customer_id, "guest customer created with placeholders");
                Ok(customer_id)
            }
            Err(e) => Err(IdentityError::Exhausted(vec![
                format!("quick create: {quick_error}"),
                format!("create: {e}"),
            ])),
        }
    }
}

const PLACEHOLDER_ADDRESS: &str = "N/A";

/// Stand-in email for guests who gave none. Unique per phone number.
fn placeholder_email(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    format!("guest.{digits}@guest.local")
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
