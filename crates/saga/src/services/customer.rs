//! Customer directory trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use common::CustomerId;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

const SERVICE: &str = "customer";

/// Contact data sent when creating a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    /// Login account the customer belongs to, if any.
    pub account_id: Option<String>,
    pub is_guest: bool,
}

/// A customer record as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub customer_id: CustomerId,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub is_guest: bool,
}

/// The backend's customer endpoints.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Looks up the customer linked to a login account.
    async fn find_by_account(&self, account_id: &str) -> Result<Option<CustomerId>, SagaError>;

    /// Lightweight creation used by the guest flow.
    async fn quick_create(&self, profile: &CustomerProfile) -> Result<CustomerId, SagaError>;

    /// Full creation with every field the backend knows about.
    async fn create(&self, profile: &CustomerProfile) -> Result<CustomerId, SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryCustomerState {
    customers: HashMap<CustomerId, Customer>,
    accounts: HashMap<String, CustomerId>,
    next_id: u64,
    fail_quick_create: bool,
    fail_create: bool,
    fail_lookup: bool,
}

impl InMemoryCustomerState {
    fn insert(&mut self, profile: &CustomerProfile) -> CustomerId {
        self.next_id += 1;
        let customer_id = CustomerId::new(self.next_id);
        self.customers.insert(
            customer_id,
            Customer {
                customer_id,
                full_name: profile.full_name.clone(),
                phone: profile.phone.clone(),
                email: profile.email.clone(),
                is_guest: profile.is_guest,
            },
        );
        if let Some(account_id) = &profile.account_id {
            self.accounts.insert(account_id.clone(), customer_id);
        }
        customer_id
    }
}

/// In-memory customer directory for testing.
///
/// `quick_create` mirrors the backend's lightweight endpoint and refuses
/// profiles without an email.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerDirectory {
    state: Arc<RwLock<InMemoryCustomerState>>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an existing account-linked customer.
    pub fn add_account(&self, account_id: &str, full_name: &str, phone: &str) -> CustomerId {
        self.write().insert(&CustomerProfile {
            full_name: full_name.to_string(),
            phone: phone.to_string(),
            email: None,
            address: None,
            account_id: Some(account_id.to_string()),
            is_guest: false,
        })
    }

    pub fn set_fail_on_quick_create(&self, fail: bool) {
        self.write().fail_quick_create = fail;
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.write().fail_create = fail;
    }

    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.write().fail_lookup = fail;
    }

    pub fn customer_count(&self) -> usize {
        self.read().customers.len()
    }

    pub fn customer(&self, customer_id: CustomerId) -> Option<Customer> {
        self.read().customers.get(&customer_id).cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryCustomerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryCustomerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn find_by_account(&self, account_id: &str) -> Result<Option<CustomerId>, SagaError> {
        let state = self.read();
        if state.fail_lookup {
            return Err(SagaError::service(SERVICE, "lookup timed out"));
        }
        Ok(state.accounts.get(account_id).copied())
    }

    async fn quick_create(&self, profile: &CustomerProfile) -> Result<CustomerId, SagaError> {
        let mut state = self.write();
        if state.fail_quick_create {
            return Err(SagaError::service(SERVICE, "quick create unavailable"));
        }
        if profile.email.as_deref().is_none_or(str::is_empty) {
            return Err(SagaError::service(SERVICE, "email is required"));
        }
        Ok(state.insert(profile))
    }

    async fn create(&self, profile: &CustomerProfile) -> Result<CustomerId, SagaError> {
        let mut state = self.write();
        if state.fail_create {
            return Err(SagaError::service(SERVICE, "create rejected"));
        }
        Ok(state.insert(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest(email: Option<&str>) -> CustomerProfile {
        CustomerProfile {
            full_name: "Nguyễn Văn A".to_string(),
            phone: "0901234567".to_string(),
            email: email.map(str::to_string),
            address: None,
            account_id: None,
            is_guest: true,
        }
    }

    #[tokio::test]
    async fn test_quick_create_needs_email() {
        let directory = InMemoryCustomerDirectory::new();
        assert!(directory.quick_create(&guest(None)).await.is_err());

        let id = directory.quick_create(&guest(Some("a@example.com"))).await.unwrap();
        assert!(directory.customer(id).unwrap().is_guest);
    }

    #[tokio::test]
    async fn test_account_lookup() {
        let directory = InMemoryCustomerDirectory::new();
        let id = directory.add_account("acc-1", "Trần B", "0912345678");

        assert_eq!(directory.find_by_account("acc-1").await.unwrap(), Some(id));
        assert_eq!(directory.find_by_account("acc-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sequential_ids() {
        let directory = InMemoryCustomerDirectory::new();
        let a = directory.create(&guest(None)).await.unwrap();
        let b = directory.create(&guest(None)).await.unwrap();
        assert_eq!(a, CustomerId::new(1));
        assert_eq!(b, CustomerId::new(2));
        assert_eq!(directory.customer_count(), 2);
    }
}
