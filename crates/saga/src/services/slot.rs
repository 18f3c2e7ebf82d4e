//! Slot authority trait and in-memory implementation.
//!
//! The authority owns slot state: it decides who holds a slot and when a
//! hold expires.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use domain::SlotKey;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::SagaError;

const SERVICE: &str = "slot";

/// The backend's slot hold endpoints.
///
/// A hold belongs to one `hold_id`, minted per saga run. The holder string
/// names who asked and is kept for diagnostics; it never grants access to
/// another run's hold.
#[async_trait]
pub trait SlotAuthority: Send + Sync {
    /// `HoldSlot`. Fails with [`SagaError::SlotHeld`] if the slot carries a
    /// live hold under another `hold_id`, even from the same holder. A
    /// repeated call with the same `hold_id` extends the hold. Returns the
    /// expiry.
    async fn hold(
        &self,
        slot: SlotKey,
        hold_id: Uuid,
        holder: &str,
        ttl: Duration,
    ) -> Result<DateTime<Utc>, SagaError>;

    /// `ReleaseSlot`. Releasing a hold that is gone is not an error.
    async fn release(&self, slot: SlotKey, hold_id: Uuid) -> Result<(), SagaError>;

    /// Turns a hold into a permanent assignment once the booking exists.
    async fn commit(&self, _slot: SlotKey, _hold_id: Uuid) -> Result<(), SagaError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Hold {
    hold_id: Uuid,
    holder: String,
    expires_at: DateTime<Utc>,
}

impl Hold {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Default)]
struct InMemorySlotState {
    holds: HashMap<SlotKey, Hold>,
    /// Slots turned into bookings, with the holder that booked them.
    committed: HashMap<SlotKey, String>,
    fail_hold: bool,
    fail_release: bool,
}

/// In-memory slot authority for testing and the demo server.
///
/// A single mutex guards the check and the write, so two concurrent holds on
/// one slot cannot both succeed.
#[derive(Debug, Clone, Default)]
pub struct InMemorySlotAuthority {
    state: Arc<Mutex<InMemorySlotState>>,
}

impl InMemorySlotAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_hold(&self, fail: bool) {
        self.state.lock().await.fail_hold = fail;
    }

    pub async fn set_fail_on_release(&self, fail: bool) {
        self.state.lock().await.fail_release = fail;
    }

    /// Returns the holder of a live hold, if any.
    pub async fn live_holder(&self, slot: &SlotKey) -> Option<String> {
        let state = self.state.lock().await;
        let now = Utc::now();
        state
            .holds
            .get(slot)
            .filter(|hold| hold.is_live(now))
            .map(|hold| hold.holder.clone())
    }

    /// Returns the holder that booked the slot, if any.
    pub async fn committed_to(&self, slot: &SlotKey) -> Option<String> {
        self.state.lock().await.committed.get(slot).cloned()
    }
}

#[async_trait]
impl SlotAuthority for InMemorySlotAuthority {
    async fn hold(
        &self,
        slot: SlotKey,
        hold_id: Uuid,
        holder: &str,
        ttl: Duration,
    ) -> Result<DateTime<Utc>, SagaError> {
        let mut state = self.state.lock().await;
        if state.fail_hold {
            return Err(SagaError::service(SERVICE, "hold endpoint unavailable"));
        }
        if state.committed.contains_key(&slot) {
            return Err(SagaError::SlotHeld { slot });
        }

        let now = Utc::now();
        if let Some(existing) = state.holds.get(&slot)
            && existing.is_live(now)
            && existing.hold_id != hold_id
        {
            return Err(SagaError::SlotHeld { slot });
        }

        let expires_at = now + ttl;
        state.holds.insert(
            slot,
            Hold {
                hold_id,
                holder: holder.to_string(),
                expires_at,
            },
        );
        Ok(expires_at)
    }

    async fn release(&self, slot: SlotKey, hold_id: Uuid) -> Result<(), SagaError> {
        let mut state = self.state.lock().await;
        if state.fail_release {
            return Err(SagaError::service(SERVICE, "release endpoint unavailable"));
        }
        if state.holds.get(&slot).is_some_and(|h| h.hold_id == hold_id) {
            state.holds.remove(&slot);
        }
        Ok(())
    }

    async fn commit(&self, slot: SlotKey, hold_id: Uuid) -> Result<(), SagaError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        match state.holds.get(&slot) {
            Some(hold) if hold.hold_id == hold_id && hold.is_live(now) => {
                let holder = hold.holder.clone();
                state.holds.remove(&slot);
                state.committed.insert(slot, holder);
                Ok(())
            }
            _ => Err(SagaError::service(
                SERVICE,
                format!("no live hold {hold_id} on {slot}"),
            )),
        }
    }
}
