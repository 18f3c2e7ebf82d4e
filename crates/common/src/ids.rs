//! Numeric identifiers assigned by the remote booking backend.

use serde::{Deserialize, Serialize};

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a raw id value.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw id value.
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

remote_id!(
    /// Customer record id.
    CustomerId
);
remote_id!(
    /// Vehicle record id.
    VehicleId
);
remote_id!(
    /// Service center id.
    CenterId
);
remote_id!(
    /// Technician id.
    TechnicianId
);
remote_id!(
    /// Id of one technician time slot on a given day.
    TechnicianSlotId
);
remote_id!(
    /// Catalog service (maintenance package, repair type) id.
    ServiceId
);
remote_id!(
    /// Vehicle model id.
    ModelId
);
remote_id!(
    /// Booking id assigned by the backend on creation.
    BookingId
);
