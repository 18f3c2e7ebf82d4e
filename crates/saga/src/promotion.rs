//! Promotion application.

use common::BookingId;
use domain::{BookingRecordError, BookingService, DomainError, Money, RecordPromotion, RetractPromotion};
use event_store::EventStore;
use serde::Serialize;

use crate::error::PromotionError;
use crate::services::PromotionGateway;

/// A discount that is now live on a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionOutcome {
    pub code: String,
    pub discount_amount: Money,
    pub final_amount: Money,
}

/// Validates a code with the backend and attaches it to a booking.
///
/// At most one live promotion per booking. The local record is written
/// first, under the booking stream's expected version, so two concurrent
/// applications cannot both succeed. If the backend then refuses to apply
/// the code, the local record is retracted.
pub struct PromotionApplier<S: EventStore, P: PromotionGateway> {
    bookings: BookingService<S>,
    gateway: P,
}

impl<S: EventStore, P: PromotionGateway> PromotionApplier<S, P> {
    pub fn new(store: S, gateway: P) -> Self {
        Self {
            bookings: BookingService::new(store),
            gateway,
        }
    }

    pub fn gateway(&self) -> &P {
        &self.gateway
    }

    #[tracing::instrument(skip(self), fields(%booking_id))]
    pub async fn apply(
        &self,
        booking_id: BookingId,
        code: &str,
        order_amount: Money,
    ) -> Result<PromotionOutcome, PromotionError> {
        let result = self.try_apply(booking_id, code, order_amount).await;
        if let Err(e) = &result {
            metrics::counter!("promotion_failures_total").increment(1);
            tracing::warn!(error = %e, "promotion not applied");
        }
        result
    }

    async fn try_apply(
        &self,
        booking_id: BookingId,
        code: &str,
        order_amount: Money,
    ) -> Result<PromotionOutcome, PromotionError> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(PromotionError::EmptyCode);
        }

        let booking = self
            .bookings
            .get_booking(booking_id)
            .await
            .map_err(PromotionError::Record)?
            .ok_or(PromotionError::BookingNotFound(booking_id))?;
        if let Some(live) = booking.promotion() {
            return Err(PromotionError::AlreadyApplied {
                booking_id,
                existing: live.code.clone(),
            });
        }

        let quote = self
            .gateway
            .validate(&code, order_amount)
            .await
            .map_err(PromotionError::Remote)?;
        if !quote.is_valid {
            return Err(PromotionError::Invalid {
                reason: quote.message.unwrap_or_else(|| "rejected".to_string()),
                code,
            });
        }

        self.bookings
            .record_promotion(RecordPromotion::new(
                booking_id,
                &code,
                quote.discount_amount,
                quote.final_amount,
            ))
            .await
            .map_err(|e| match e {
                DomainError::Booking(BookingRecordError::PromotionAlreadyApplied { code }) => {
                    PromotionError::AlreadyApplied {
                        booking_id,
                        existing: code,
                    }
                }
                other => PromotionError::Record(other),
            })?;

        if let Err(e) = self.gateway.apply_to_booking(booking_id, &code).await {
            let reason = format!("backend refused: {e}");
            if let Err(retract) = self
                .bookings
                .retract_promotion(RetractPromotion::new(booking_id, reason))
                .await
            {
                tracing::error!(error = %retract, %code, "promotion recorded locally but could not be retracted");
            }
            return Err(PromotionError::Remote(e));
        }

        tracing::info!(%code, discount = %quote.discount_amount, "promotion applied");
        Ok(PromotionOutcome {
            code,
            discount_amount: quote.discount_amount,
            final_amount: quote.final_amount,
        })
    }
}
