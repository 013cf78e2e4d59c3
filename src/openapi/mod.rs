use crate::AppState;
use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Catalog Admin API",
        version = "0.1.0",
        description = r#"
# Catalog Admin API

Administration backend for a storefront catalog: categories with inline
subcategories, products with image uploads, and administrator accounts.

## Authentication

Read endpoints are public. Creating, updating and deleting categories or
products requires a bearer token obtained from `POST /api/auth/login`:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Failures share one body format:

```json
{
  "error": "Not Found",
  "message": "Not found: Category not found",
  "request_id": "9f4c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development")
    ),
    tags(
        (name = "Categories", description = "Category and subcategory management"),
        (name = "Products", description = "Product management and image uploads"),
        (name = "Auth", description = "Registration and login"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Categories
        crate::handlers::categories::create_category,
        crate::handlers::categories::list_categories,
        crate::handlers::categories::delete_category,

        // Products
        crate::handlers::products::create_product,
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,

        // Auth
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::me,

        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::handlers::categories::CreateCategoryRequest,
            crate::handlers::categories::CategoryResponse,
            crate::handlers::categories::CategoryListItem,
            crate::handlers::categories::SubcategoryResponse,
            crate::handlers::products::ProductForm,
            crate::handlers::products::ProductResponse,
            crate::handlers::products::ProductWithCategoryResponse,
            crate::handlers::common::MessageResponse,
            crate::handlers::health::HealthResponse,
            crate::auth::Credentials,
            crate::auth::TokenResponse,
            crate::auth::UserResponse,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Serves the generated document at `/api-docs/openapi.json`
pub fn openapi_routes() -> Router<AppState> {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
