//! Promotion gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use common::BookingId;
use domain::Money;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

const SERVICE: &str = "promotion";

/// The validator's answer for a code and an order amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionQuote {
    pub is_valid: bool,
    pub discount_amount: Money,
    pub final_amount: Money,
    /// Why the code was refused, when it was.
    pub message: Option<String>,
}

/// The backend's promotion endpoints.
#[async_trait]
pub trait PromotionGateway: Send + Sync {
    /// `ValidatePromotion(code, orderAmount)`.
    async fn validate(&self, code: &str, order_amount: Money) -> Result<PromotionQuote, SagaError>;

    /// `ApplyPromotionToBooking(bookingId, code)`.
    async fn apply_to_booking(&self, booking_id: BookingId, code: &str) -> Result<(), SagaError>;
}

#[derive(Debug, Clone, Copy)]
struct PromotionRule {
    percent: i64,
    min_order: Money,
    remaining_uses: u32,
}

#[derive(Debug, Default)]
struct InMemoryPromotionState {
    rules: HashMap<String, PromotionRule>,
    applied: Vec<(BookingId, String)>,
    fail_validate: bool,
    fail_apply: bool,
}

/// In-memory promotion gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPromotionGateway {
    state: Arc<RwLock<InMemoryPromotionState>>,
}

impl InMemoryPromotionGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a percentage code with a minimum order amount.
    pub fn add_percentage_code(&self, code: &str, percent: i64, min_order: Money, uses: u32) {
        self.write().rules.insert(
            code.to_string(),
            PromotionRule {
                percent,
                min_order,
                remaining_uses: uses,
            },
        );
    }

    pub fn set_fail_on_validate(&self, fail: bool) {
        self.write().fail_validate = fail;
    }

    pub fn set_fail_on_apply(&self, fail: bool) {
        self.write().fail_apply = fail;
    }

    /// Applications the backend accepted.
    pub fn applied(&self) -> Vec<(BookingId, String)> {
        self.read().applied.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryPromotionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryPromotionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn refused(order_amount: Money, message: &str) -> PromotionQuote {
    PromotionQuote {
        is_valid: false,
        discount_amount: Money::zero(),
        final_amount: order_amount,
        message: Some(message.to_string()),
    }
}

#[async_trait]
impl PromotionGateway for InMemoryPromotionGateway {
    async fn validate(&self, code: &str, order_amount: Money) -> Result<PromotionQuote, SagaError> {
        let state = self.read();
        if state.fail_validate {
            return Err(SagaError::service(SERVICE, "validator timed out"));
        }

        let Some(rule) = state.rules.get(code) else {
            return Ok(refused(order_amount, "code not found"));
        };
        if rule.remaining_uses == 0 {
            return Ok(refused(order_amount, "code has no remaining uses"));
        }
        if order_amount < rule.min_order {
            return Ok(refused(
                order_amount,
                &format!("minimum order is {}", rule.min_order),
            ));
        }

        let discount_amount = Money::new(order_amount.amount() * rule.percent / 100);
        Ok(PromotionQuote {
            is_valid: true,
            discount_amount,
            final_amount: order_amount.saturating_discount(discount_amount),
            message: None,
        })
    }

    async fn apply_to_booking(&self, booking_id: BookingId, code: &str) -> Result<(), SagaError> {
        let mut state = self.write();
        if state.fail_apply {
            return Err(SagaError::service(SERVICE, "network error"));
        }
        let rule = state
            .rules
            .get_mut(code)
            .ok_or_else(|| SagaError::service(SERVICE, format!("unknown code {code}")))?;
        rule.remaining_uses = rule.remaining_uses.saturating_sub(1);
        state.applied.push((booking_id, code.to_string()));
        Ok(())
    }
}
