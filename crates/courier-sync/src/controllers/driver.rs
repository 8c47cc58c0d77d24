//! Driver profile mutations and location posts.

use reqwest::multipart::Form;
use serde_json::Value;
use tracing::{debug, info, instrument};

use courier_core::validation::validate_driver;
use courier_core::{Driver, DriverInput, Id, LocationUpdate, RoleKind};

use super::{expect_entity, require_role};
use crate::error::ClientResult;
use crate::http::ApiClient;
use crate::upload::attach_image;

#[derive(Debug, Clone)]
pub struct DriverController {
    api: ApiClient,
}

impl DriverController {
    pub fn new(api: ApiClient) -> Self {
        DriverController { api }
    }

    /// Creates the vehicle profile for the signed-in driver.
    ///
    /// The owner is taken from the bearer token, not the body.
    #[instrument(skip(self, input), fields(vehicle_type = %input.vehicle_type))]
    pub async fn create(&self, input: &DriverInput) -> ClientResult<Driver> {
        require_role(&self.api, RoleKind::Driver, "create a driver profile")?;
        validate_driver(input)?;

        let form = Form::new()
            .text("vehicle_type", input.vehicle_type.trim().to_string())
            .text(
                "vehicle_license_plate",
                input.vehicle_license_plate.trim().to_string(),
            )
            .text("vehicle_color", input.vehicle_color.trim().to_string());
        let form = attach_image(form, "image", input.image.as_ref(), None).await?;

        let value: Value = self.api.post_multipart("/drivers/create", form).await?;
        let driver: Driver = expect_entity(value, "driver")?;
        info!(driver_id = driver.id, "Driver profile created");
        Ok(driver)
    }

    #[instrument(skip(self))]
    pub async fn toggle_availability(&self, driver_id: Id) -> ClientResult<Driver> {
        let value: Value = self
            .api
            .put_empty(&format!("/drivers/{driver_id}/toggle-availability"))
            .await?;
        let driver: Driver = expect_entity(value, "driver")?;
        info!(is_available = driver.is_available, "Driver availability toggled");
        Ok(driver)
    }

    pub async fn update_location(&self, update: &LocationUpdate) -> ClientResult<()> {
        let _: Value = self
            .api
            .post_json("/driver-locations/update-location", update)
            .await?;
        debug!(driver_id = update.driver_id, "Location posted");
        Ok(())
    }
}
