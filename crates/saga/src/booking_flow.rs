//! Booking saga constants.

/// The saga type identifier for booking creation.
pub const SAGA_TYPE: &str = "BookingCreation";

/// Step name: Place a hold on the requested slot.
pub const STEP_HOLD_SLOT: &str = "hold_slot";

/// Step name: Create the booking on the backend and register it locally.
pub const STEP_CREATE_BOOKING: &str = "create_booking";

/// Step name: Apply the promotion code, if one was given.
pub const STEP_APPLY_PROMOTION: &str = "apply_promotion";

/// Hold lifetime advertised to customers ("giữ chỗ trong 15 phút").
pub const DEFAULT_HOLD_TTL_MINUTES: i64 = 15;
