//! Slot reservation: time-bounded exclusive holds.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use domain::SlotKey;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{ReservationError, SagaError};
use crate::services::SlotAuthority;

/// A granted hold. Returned by [`SlotReservationManager::hold`] and handed
/// back to release or consume it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldToken {
    pub hold_id: Uuid,
    pub slot: SlotKey,
    pub holder: String,
    pub expires_at: DateTime<Utc>,
}

impl HoldToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Where a hold stands, as far as this manager knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HoldStatus {
    Live,
    /// Turned into a booking. No longer releasable.
    Consumed,
    Released,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Open,
    Consumed,
    Released,
}

/// Places holds through the slot authority and keeps a ledger of the tokens
/// it issued.
///
/// The authority decides exclusivity. The ledger only tracks what happened
/// to each token so that a consumed hold is never released by a late
/// compensation.
pub struct SlotReservationManager<A: SlotAuthority> {
    authority: A,
    ttl: Duration,
    ledger: Arc<Mutex<HashMap<Uuid, (HoldToken, Settled)>>>,
}

impl<A: SlotAuthority> SlotReservationManager<A> {
    pub fn new(authority: A, ttl: Duration) -> Self {
        Self {
            authority,
            ttl,
            ledger: Arc::default(),
        }
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Places a hold on `slot` for `holder`.
    ///
    /// Every call mints a new hold id, so a holder that already holds the slot
    /// through another token gets a conflict rather than a share of it.
    #[tracing::instrument(skip(self), fields(%slot))]
    pub async fn hold(&self, slot: SlotKey, holder: &str) -> Result<HoldToken, ReservationError> {
        let holder = holder.trim();
        if holder.is_empty() {
            return Err(ReservationError::EmptyHolder);
        }

        let hold_id = Uuid::new_v4();
        let expires_at = match self.authority.hold(slot, hold_id, holder, self.ttl).await {
            Ok(expires_at) => expires_at,
            Err(SagaError::SlotHeld { slot }) => {
                metrics::counter!("slot_hold_conflicts_total").increment(1);
                tracing::info!("slot is held by someone else");
                return Err(ReservationError::Conflict { slot });
            }
            Err(e) => return Err(ReservationError::Authority(e)),
        };

        let token = HoldToken {
            hold_id,
            slot,
            holder: holder.to_string(),
            expires_at,
        };
        self.ledger
            .lock()
            .await
            .insert(token.hold_id, (token.clone(), Settled::Open));
        tracing::debug!(hold_id = %token.hold_id, %expires_at, "slot held");
        Ok(token)
    }

    /// Releases a hold. Best-effort: failures are logged, and consumed or
    /// already released holds are left alone.
    #[tracing::instrument(skip_all, fields(hold_id = %token.hold_id))]
    pub async fn release(&self, token: &HoldToken) -> Result<(), SagaError> {
        {
            let mut ledger = self.ledger.lock().await;
            match ledger.get_mut(&token.hold_id) {
                Some((_, settled @ Settled::Open)) => *settled = Settled::Released,
                Some((_, Settled::Consumed)) => {
                    tracing::debug!("hold already consumed, not releasing");
                    return Ok(());
                }
                Some((_, Settled::Released)) => return Ok(()),
                None => {}
            }
        }

        self.authority
            .release(token.slot, token.hold_id)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "slot release failed, hold will expire"))
    }

    /// Marks a hold as turned into a booking and tells the authority to
    /// commit it. After this, [`release`](Self::release) is a no-op.
    #[tracing::instrument(skip_all, fields(hold_id = %token.hold_id))]
    pub async fn consume(&self, token: &HoldToken) -> Result<(), SagaError> {
        self.ledger
            .lock()
            .await
            .entry(token.hold_id)
            .and_modify(|(_, settled)| *settled = Settled::Consumed)
            .or_insert_with(|| (token.clone(), Settled::Consumed));

        self.authority
            .commit(token.slot, token.hold_id)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "slot commit failed"))
    }

    /// Returns what became of a token this manager issued.
    pub async fn status(&self, token: &HoldToken) -> Option<HoldStatus> {
        let ledger = self.ledger.lock().await;
        let (stored, settled) = ledger.get(&token.hold_id)?;
        Some(match settled {
            Settled::Consumed => HoldStatus::Consumed,
            Settled::Released => HoldStatus::Released,
            Settled::Open if stored.is_expired_at(Utc::now()) => HoldStatus::Expired,
            Settled::Open => HoldStatus::Live,
        })
    }
}
