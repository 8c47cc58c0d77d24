//! Product mutations. Create and update are multipart because of the image.

use reqwest::multipart::Form;
use serde_json::Value;
use tracing::{info, instrument};

use courier_core::validation::validate_product;
use courier_core::{scope_to_store, Id, Product, ProductInput, QueryKey};

use super::expect_entity;
use crate::error::ClientResult;
use crate::http::ApiClient;
use crate::upload::attach_image;

#[derive(Debug, Clone)]
pub struct ProductController {
    api: ApiClient,
}

impl ProductController {
    pub fn new(api: ApiClient) -> Self {
        ProductController { api }
    }

    pub async fn list(&self, store_id: Id) -> ClientResult<Vec<Product>> {
        let items: Vec<Product> = self.api.get(&QueryKey::Products(store_id).path()).await?;
        Ok(scope_to_store(items, store_id))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, store_id: Id, input: &ProductInput) -> ClientResult<Product> {
        validate_product(input)?;
        let form = attach_image(text_fields(store_id, input), "image", input.image.as_ref(), None).await?;
        let value: Value = self.api.post_multipart("/products/create", form).await?;
        let product: Product = expect_entity(value, "product")?;
        info!(product_id = product.id, "Product created");
        Ok(product)
    }

    /// Updates `current` with `input`. The image part is sent only when it
    /// differs from `current.image`.
    #[instrument(skip(self, current, input), fields(product_id = current.id))]
    pub async fn update(
        &self,
        store_id: Id,
        current: &Product,
        input: &ProductInput,
    ) -> ClientResult<Product> {
        validate_product(input)?;
        let form = attach_image(
            text_fields(store_id, input),
            "image",
            input.image.as_ref(),
            current.image.as_deref(),
        )
        .await?;
        let value: Value = self
            .api
            .put_multipart(&format!("/products/update/{}", current.id), form)
            .await?;
        info!("Product updated");
        expect_entity(value, "product")
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, product_id: Id) -> ClientResult<()> {
        let _: Value = self.api.delete(&format!("/products/{product_id}")).await?;
        info!("Product deleted");
        Ok(())
    }
}

fn text_fields(store_id: Id, input: &ProductInput) -> Form {
    let mut form = Form::new()
        .text("name", input.name.trim().to_string())
        .text("price", input.price.to_decimal_string())
        .text("store_id", store_id.to_string());
    if let Some(description) = &input.description {
        form = form.text("description", description.clone());
    }
    if let Some(category_id) = input.category_id {
        form = form.text("category_id", category_id.to_string());
    }
    form
}
