use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::BookingId;

/// Namespace for stream ids derived from remote booking ids.
const BOOKING_STREAM_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93b7_4d0a_8e55_0c7d_b1f3_a902);

/// Identifier of an event stream in the event store.
///
/// Saga runs get a random id. Bookings get an id derived from their remote
/// [`BookingId`], so the same booking always lands in the same stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random aggregate ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an aggregate ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the stream id that holds the events of a booking.
    pub fn for_booking(booking_id: BookingId) -> Self {
        let name = format!("booking:{}", booking_id.get());
        Self(Uuid::new_v5(&BOOKING_STREAM_NAMESPACE, name.as_bytes()))
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}
