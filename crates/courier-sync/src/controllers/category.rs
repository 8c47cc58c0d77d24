//! Category mutations.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

use courier_core::validation::validate_category;
use courier_core::{scope_to_store, Category, CategoryInput, Id, QueryKey};

use super::expect_entity;
use crate::error::ClientResult;
use crate::http::ApiClient;

#[derive(Serialize)]
struct CategoryBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    store_id: Id,
}

impl<'a> CategoryBody<'a> {
    fn new(store_id: Id, input: &'a CategoryInput) -> Self {
        CategoryBody {
            name: input.name.trim(),
            description: input.description.as_deref(),
            store_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryController {
    api: ApiClient,
}

impl CategoryController {
    pub fn new(api: ApiClient) -> Self {
        CategoryController { api }
    }

    /// One-shot list, scoped to the store.
    pub async fn list(&self, store_id: Id) -> ClientResult<Vec<Category>> {
        let items: Vec<Category> = self.api.get(&QueryKey::Categories(store_id).path()).await?;
        Ok(scope_to_store(items, store_id))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, store_id: Id, input: &CategoryInput) -> ClientResult<Category> {
        validate_category(input)?;
        let value: Value = self
            .api
            .post_json("/categories/create", &CategoryBody::new(store_id, input))
            .await?;
        let category: Category = expect_entity(value, "category")?;
        info!(category_id = category.id, "Category created");
        Ok(category)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        store_id: Id,
        category_id: Id,
        input: &CategoryInput,
    ) -> ClientResult<Category> {
        validate_category(input)?;
        let value: Value = self
            .api
            .put_json(
                &format!("/categories/update/{category_id}"),
                &CategoryBody::new(store_id, input),
            )
            .await?;
        info!("Category updated");
        expect_entity(value, "category")
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, category_id: Id) -> ClientResult<()> {
        let _: Value = self.api.delete(&format!("/categories/{category_id}")).await?;
        info!("Category deleted");
        Ok(())
    }
}
