use super::categories::CategoryResponse;
use super::common::{message_response, parse_id, success_response, FormData};
use crate::{
    auth::AuthRouterExt,
    entities::ProductModel,
    errors::ServiceError,
    services::{
        products::{ProductFields, ProductWithCategory},
        uploads::ImageUpload,
    },
    AppState,
};
use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for product endpoints
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).merge(post(create_product).with_auth()))
        .route(
            "/:id",
            get(get_product).merge(put(update_product).delete(delete_product).with_auth()),
        )
}

/// Create a product from a multipart form, optionally with an image
#[utoipa::path(
    post,
    path = "/api/products",
    request_body(content = ProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Product created", body = ProductResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Missing field or store failure", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    FormData(multipart): FormData,
) -> Result<impl IntoResponse, ServiceError> {
    let (fields, image) = read_product_form(multipart).await?;
    let product = state.services.products.create_product(fields, image).await?;
    Ok(success_response(ProductResponse::from(product)))
}

/// List products with their categories
#[utoipa::path(
    get,
    path = "/api/products",
    responses(
        (status = 200, description = "Products retrieved", body = [ProductWithCategoryResponse]),
        (status = 500, description = "Store failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state.services.products.list_products().await?;
    let body: Vec<ProductWithCategoryResponse> = products.into_iter().map(Into::into).collect();
    Ok(success_response(body))
}

/// Get a product by id
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product retrieved", body = ProductWithCategoryResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Product")?;
    let product = state.services.products.get_product(id).await?;
    Ok(success_response(ProductWithCategoryResponse::from(product)))
}

/// Update the supplied fields of a product
#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    request_body(content = ProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    FormData(multipart): FormData,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Product")?;
    let (fields, image) = read_product_form(multipart).await?;
    let product = state
        .services
        .products
        .update_product(id, fields, image)
        .await?;
    Ok(success_response(ProductResponse::from(product)))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted", body = crate::handlers::common::MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Product")?;
    state.services.products.delete_product(id).await?;
    Ok(message_response("Product deleted successfully"))
}

/// Collects the known form fields; unknown fields are ignored.
async fn read_product_form(
    mut multipart: Multipart,
) -> Result<(ProductFields, Option<ImageUpload>), ServiceError> {
    let mut fields = ProductFields::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => image = read_image(field).await?,
            "name" => fields.name = Some(field.text().await.map_err(malformed)?),
            "description" => fields.description = Some(field.text().await.map_err(malformed)?),
            "price" => {
                let raw = field.text().await.map_err(malformed)?;
                fields.price = Some(parse_price(&raw)?);
            }
            "stock" => {
                let raw = field.text().await.map_err(malformed)?;
                fields.stock = Some(parse_stock(&raw)?);
            }
            "category" | "categoryId" => {
                let raw = field.text().await.map_err(malformed)?;
                fields.category_id = Some(parse_category(&raw)?);
            }
            other => debug!(field = other, "Ignoring unknown product form field"),
        }
    }

    Ok((fields, image))
}

async fn read_image(field: Field<'_>) -> Result<Option<ImageUpload>, ServiceError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let bytes = field.bytes().await.map_err(malformed)?;

    // Browsers submit an empty, unnamed part when no file was chosen.
    if file_name.is_empty() && bytes.is_empty() {
        return Ok(None);
    }

    Ok(Some(ImageUpload {
        file_name,
        bytes: bytes.to_vec(),
    }))
}

fn malformed(err: axum::extract::multipart::MultipartError) -> ServiceError {
    ServiceError::ValidationError(format!("Malformed form data: {}", err))
}

fn parse_price(raw: &str) -> Result<Decimal, ServiceError> {
    Decimal::from_str(raw.trim())
        .map_err(|_| ServiceError::ValidationError(format!("Invalid price '{}'", raw)))
}

fn parse_stock(raw: &str) -> Result<i32, ServiceError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| ServiceError::ValidationError(format!("Invalid stock '{}'", raw)))
}

/// An empty value clears the category
fn parse_category(raw: &str) -> Result<Option<Uuid>, ServiceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(raw)
        .map(Some)
        .map_err(|_| ServiceError::ValidationError(format!("Invalid category id '{}'", raw)))
}

/// Multipart form accepted by create and update
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct ProductForm {
    #[schema(example = "Smartphone X")]
    name: Option<String>,
    #[schema(example = "6.5 inch display")]
    description: Option<String>,
    #[schema(example = "499.99")]
    price: Option<String>,
    #[schema(example = "25")]
    stock: Option<String>,
    /// Category id; an empty value clears it. `categoryId` is accepted as well.
    category: Option<Uuid>,
    #[schema(value_type = Option<String>, format = Binary)]
    image: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: Uuid,
    #[schema(example = "Smartphone X")]
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64, example = 499.99)]
    pub price: Decimal,
    #[schema(example = 25)]
    pub stock: i32,
    /// Stored path of the uploaded image, e.g. `uploads/1700000000000-phone.png`
    pub image_url: Option<String>,
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductModel> for ProductResponse {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            stock: model.stock,
            image_url: model.image_url,
            category_id: model.category_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Product with its category record resolved; `category` is null when unset
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductWithCategoryResponse {
    #[serde(flatten)]
    pub product: ProductResponse,
    pub category: Option<CategoryResponse>,
}

impl From<ProductWithCategory> for ProductWithCategoryResponse {
    fn from(row: ProductWithCategory) -> Self {
        Self {
            product: row.product.into(),
            category: row.category.map(Into::into),
        }
    }
}
