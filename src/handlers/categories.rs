use super::common::{created_response, message_response, parse_id, success_response, JsonBody};
use crate::{
    auth::AuthRouterExt,
    entities::CategoryModel,
    errors::ServiceError,
    services::categories::{CategoryWithSubcategories, CreateCategoryInput, SubcategoryRef},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for category endpoints. Categories cannot be updated.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).merge(post(create_category).with_auth()))
        .route("/:id", delete(delete_category).with_auth())
}

/// Create a category with inline subcategories
#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Missing name or store failure", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let category = state
        .services
        .categories
        .create_category(CreateCategoryInput {
            name: payload.name,
            sub_categories: payload.sub_categories,
        })
        .await?;

    Ok(created_response(CategoryResponse::from(category)))
}

/// List categories with their subcategories
#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "Categories retrieved", body = [CategoryListItem]),
        (status = 500, description = "Store failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let categories = state.services.categories.list_categories().await?;
    let body: Vec<CategoryListItem> = categories.into_iter().map(Into::into).collect();
    Ok(success_response(body))
}

/// Delete a category and its subcategories
#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(("id" = String, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category deleted", body = crate::handlers::common::MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Category still referenced by products", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Category")?;
    state.services.categories.delete_category(id).await?;
    Ok(message_response("Category deleted successfully"))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({"name": "Electronics", "subCategories": ["Phones", "Laptops"]}))]
pub struct CreateCategoryRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sub_categories: Vec<String>,
}

/// Stored category with the ordered ids of its subcategories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: Uuid,
    #[schema(example = "Electronics")]
    pub name: String,
    pub sub_category_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<CategoryModel> for CategoryResponse {
    fn from(model: CategoryModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            sub_category_ids: model.sub_category_ids.0,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubcategoryResponse {
    pub id: Uuid,
    #[schema(example = "Phones")]
    pub name: String,
}

impl From<SubcategoryRef> for SubcategoryResponse {
    fn from(sub: SubcategoryRef) -> Self {
        Self {
            id: sub.id,
            name: sub.name,
        }
    }
}

/// Category as listed, subcategories resolved in stored order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryListItem {
    pub id: Uuid,
    pub name: String,
    pub sub_categories: Vec<SubcategoryResponse>,
}

impl From<CategoryWithSubcategories> for CategoryListItem {
    fn from(category: CategoryWithSubcategories) -> Self {
        Self {
            id: category.id,
            name: category.name,
            sub_categories: category.sub_categories.into_iter().map(Into::into).collect(),
        }
    }
}
