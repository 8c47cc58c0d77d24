//! Store mutations. Logo and banner travel as separate multipart files.

use reqwest::multipart::Form;
use serde_json::Value;
use tracing::{info, instrument};

use courier_core::validation::validate_store;
use courier_core::{RoleKind, Store, StoreInput};

use super::{expect_entity, require_role};
use crate::error::ClientResult;
use crate::http::ApiClient;
use crate::upload::attach_image;

#[derive(Debug, Clone)]
pub struct StoreController {
    api: ApiClient,
}

impl StoreController {
    pub fn new(api: ApiClient) -> Self {
        StoreController { api }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: &StoreInput) -> ClientResult<Store> {
        require_role(&self.api, RoleKind::Merchant, "create a store")?;
        validate_store(input)?;

        let form = attach_image(text_fields(input), "logo", input.logo.as_ref(), None).await?;
        let form = attach_image(form, "banner", input.banner.as_ref(), None).await?;

        let value: Value = self.api.post_multipart("/stores/create", form).await?;
        let store: Store = expect_entity(value, "store")?;
        info!(store_id = store.id, "Store created");
        Ok(store)
    }

    /// Updates `current`. Logo and banner are sent only when they changed.
    #[instrument(skip(self, current, input), fields(store_id = current.id))]
    pub async fn update(&self, current: &Store, input: &StoreInput) -> ClientResult<Store> {
        require_role(&self.api, RoleKind::Merchant, "update a store")?;
        validate_store(input)?;

        let form = attach_image(
            text_fields(input),
            "logo",
            input.logo.as_ref(),
            current.logo.as_deref(),
        )
        .await?;
        let form = attach_image(
            form,
            "banner",
            input.banner.as_ref(),
            current.banner.as_deref(),
        )
        .await?;

        let value: Value = self
            .api
            .put_multipart(&format!("/stores/update/{}", current.id), form)
            .await?;
        info!("Store updated");
        expect_entity(value, "store")
    }
}

fn text_fields(input: &StoreInput) -> Form {
    Form::new()
        .text("name", input.name.trim().to_string())
        .text("address", input.address.trim().to_string())
        .text("phone", input.phone.trim().to_string())
        .text("start_time", input.start_time.trim().to_string())
        .text("end_time", input.end_time.trim().to_string())
}
