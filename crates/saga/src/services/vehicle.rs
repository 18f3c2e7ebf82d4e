//! Vehicle registry trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use common::{CustomerId, ModelId, VehicleId};
use domain::LicensePlate;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

const SERVICE: &str = "vehicle";

/// A vehicle record as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub vehicle_id: VehicleId,
    pub customer_id: CustomerId,
    pub license_plate: String,
    pub vin: Option<String>,
    pub color: String,
    pub current_mileage: u32,
    pub model_id: Option<ModelId>,
}

/// Data sent when creating a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVehicle {
    pub customer_id: CustomerId,
    pub license_plate: LicensePlate,
    pub vin: Option<String>,
    pub color: String,
    pub current_mileage: u32,
    pub model_id: Option<ModelId>,
}

/// The backend's vehicle endpoints.
#[async_trait]
pub trait VehicleRegistry: Send + Sync {
    /// Lists the vehicles owned by a customer.
    async fn list_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Vehicle>, SagaError>;

    /// Searches every vehicle by plate, then by VIN when one is given.
    async fn search(
        &self,
        plate: &LicensePlate,
        vin: Option<&str>,
    ) -> Result<Option<Vehicle>, SagaError>;

    async fn create(&self, vehicle: NewVehicle) -> Result<VehicleId, SagaError>;

    async fn update_mileage(&self, vehicle_id: VehicleId, mileage: u32) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryVehicleState {
    vehicles: Vec<Vehicle>,
    next_id: u64,
    fail_list: bool,
    fail_search: bool,
    fail_create: bool,
    fail_update_mileage: bool,
}

/// In-memory vehicle registry for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVehicleRegistry {
    state: Arc<RwLock<InMemoryVehicleState>>,
}

impl InMemoryVehicleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a vehicle, stored with the plate exactly as given.
    pub fn add_vehicle(&self, customer_id: CustomerId, plate: &str, mileage: u32) -> VehicleId {
        self.add_vehicle_with_vin(customer_id, plate, None, mileage)
    }

    pub fn add_vehicle_with_vin(
        &self,
        customer_id: CustomerId,
        plate: &str,
        vin: Option<&str>,
        mileage: u32,
    ) -> VehicleId {
        let mut state = self.write();
        state.next_id += 1;
        let vehicle_id = VehicleId::new(state.next_id);
        state.vehicles.push(Vehicle {
            vehicle_id,
            customer_id,
            license_plate: plate.to_string(),
            vin: vin.map(str::to_string),
            color: "white".to_string(),
            current_mileage: mileage,
            model_id: None,
        });
        vehicle_id
    }

    pub fn vehicle(&self, vehicle_id: VehicleId) -> Option<Vehicle> {
        self.read()
            .vehicles
            .iter()
            .find(|v| v.vehicle_id == vehicle_id)
            .cloned()
    }

    pub fn vehicle_count(&self) -> usize {
        self.read().vehicles.len()
    }

    pub fn set_fail_on_list(&self, fail: bool) {
        self.write().fail_list = fail;
    }

    pub fn set_fail_on_search(&self, fail: bool) {
        self.write().fail_search = fail;
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.write().fail_create = fail;
    }

    pub fn set_fail_on_update_mileage(&self, fail: bool) {
        self.write().fail_update_mileage = fail;
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryVehicleState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryVehicleState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl VehicleRegistry for InMemoryVehicleRegistry {
    async fn list_for_customer(&self, customer_id: CustomerId) -> Result<Vec<Vehicle>, SagaError> {
        let state = self.read();
        if state.fail_list {
            return Err(SagaError::service(SERVICE, "list failed"));
        }
        Ok(state
            .vehicles
            .iter()
            .filter(|v| v.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn search(
        &self,
        plate: &LicensePlate,
        vin: Option<&str>,
    ) -> Result<Option<Vehicle>, SagaError> {
        let state = self.read();
        if state.fail_search {
            return Err(SagaError::service(SERVICE, "search failed"));
        }
        if let Some(vehicle) = state.vehicles.iter().find(|v| plate.matches(&v.license_plate)) {
            return Ok(Some(vehicle.clone()));
        }
        let Some(vin) = vin.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        Ok(state
            .vehicles
            .iter()
            .find(|v| {
                v.vin
                    .as_deref()
                    .is_some_and(|stored| stored.trim().eq_ignore_ascii_case(vin))
            })
            .cloned())
    }

    async fn create(&self, vehicle: NewVehicle) -> Result<VehicleId, SagaError> {
        let mut state = self.write();
        if state.fail_create {
            return Err(SagaError::service(SERVICE, "create rejected"));
        }
        state.next_id += 1;
        let vehicle_id = VehicleId::new(state.next_id);
        state.vehicles.push(Vehicle {
            vehicle_id,
            customer_id: vehicle.customer_id,
            license_plate: vehicle.license_plate.to_string(),
            vin: vehicle.vin,
            color: vehicle.color,
            current_mileage: vehicle.current_mileage,
            model_id: vehicle.model_id,
        });
        Ok(vehicle_id)
    }

    async fn update_mileage(&self, vehicle_id: VehicleId, mileage: u32) -> Result<(), SagaError> {
        let mut state = self.write();
        if state.fail_update_mileage {
            return Err(SagaError::service(SERVICE, "mileage update failed"));
        }
        let vehicle = state
            .vehicles
            .iter_mut()
            .find(|v| v.vehicle_id == vehicle_id)
            .ok_or_else(|| SagaError::service(SERVICE, format!("vehicle {vehicle_id} not found")))?;
        vehicle.current_mileage = mileage;
        Ok(())
    }
}
