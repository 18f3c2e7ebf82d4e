//! Vehicle resolution by license plate.

use common::{CustomerId, ModelId, VehicleId};
use domain::LicensePlate;
use serde::{Deserialize, Serialize};

use crate::error::VehicleResolutionError;
use crate::services::{NewVehicle, Vehicle, VehicleRegistry};

const DEFAULT_COLOR: &str = "unknown";

/// Optional data used when the vehicle has to be created, and the
/// odometer reading used to refresh an existing one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleHints {
    pub vin: Option<String>,
    pub model_id: Option<ModelId>,
    pub color: Option<String>,
    pub mileage: Option<u32>,
}

/// Finds or creates the vehicle for a plate. First success wins:
///
/// 1. the customer's own vehicles, matched on the normalized plate;
/// 2. the registry-wide search, by plate and then by VIN;
/// 3. a new vehicle built from the hints.
pub struct VehicleResolver<R: VehicleRegistry> {
    registry: R,
}

impl<R: VehicleRegistry> VehicleResolver<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    #[tracing::instrument(skip(self, hints), fields(plate = %license_plate))]
    pub async fn resolve_vehicle(
        &self,
        customer_id: CustomerId,
        license_plate: &str,
        hints: &VehicleHints,
    ) -> Result<VehicleId, VehicleResolutionError> {
        let plate = LicensePlate::parse(license_plate).ok_or(VehicleResolutionError::EmptyPlate)?;
        let mut attempts = Vec::new();

        match self.registry.list_for_customer(customer_id).await {
            Ok(vehicles) => {
                if let Some(vehicle) = vehicles.iter().find(|v| plate.matches(&v.license_plate)) {
                    self.refresh_mileage(vehicle, hints.mileage).await;
                    return Ok(vehicle.vehicle_id);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "listing customer vehicles failed");
                attempts.push(format!("list: {e}"));
            }
        }

        match self.registry.search(&plate, hints.vin.as_deref()).await {
            Ok(Some(vehicle)) => {
                if vehicle.customer_id != customer_id {
                    tracing::warn!(
                        vehicle_id = %vehicle.vehicle_id,
                        owner = %vehicle.customer_id,
                        %customer_id,
                        "plate is registered to another customer"
                    );
                }
                self.refresh_mileage(&vehicle, hints.mileage).await;
                return Ok(vehicle.vehicle_id);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "vehicle search failed");
                attempts.push(format!("search: {e}"));
            }
        }

        let new_vehicle = NewVehicle {
            customer_id,
            license_plate: plate.clone(),
            vin: hints.vin.clone(),
            color: hints
                .color
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            current_mileage: hints.mileage.unwrap_or(0),
            model_id: hints.model_id,
        };
        match self.registry.create(new_vehicle).await {
            Ok(vehicle_id) => {
                tracing::info!(%vehicle_id, "vehicle created");
                Ok(vehicle_id)
            }
            Err(e) => {
                attempts.push(format!("create: {e}"));
                Err(VehicleResolutionError::Exhausted {
                    plate: plate.to_string(),
                    attempts,
                })
            }
        }
    }

    /// Raises the stored mileage. Lower or equal readings are ignored, and a
    /// failed update does not fail resolution.
    async fn refresh_mileage(&self, vehicle: &Vehicle, reading: Option<u32>) {
        let Some(reading) = reading else {
            return;
        };
        if reading <= vehicle.current_mileage {
            return;
        }
        if let Err(e) = self.registry.update_mileage(vehicle.vehicle_id, reading).await {
            tracing::warn!(vehicle_id = %vehicle.vehicle_id, error = %e, "mileage update failed");
        }
    }
}
