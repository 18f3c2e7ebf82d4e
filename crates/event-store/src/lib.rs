//! Append-only event storage with optimistic concurrency.
//!
//! Bookings and saga runs are both persisted as event streams. Appends carry
//! the version the writer last observed, which turns every status change into
//! a conditional update keyed on the state the writer decided from.

pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt};
