pub mod auth;
pub mod categories;
pub mod common;
pub mod health;
pub mod products;

use crate::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db::DbPool,
    services::{CategoryService, ProductService, UploadStore},
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub categories: Arc<CategoryService>,
    pub products: Arc<ProductService>,
    pub auth: Arc<AuthService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig) -> Self {
        let uploads = UploadStore::new(config.upload_dir.clone());

        Self {
            categories: Arc::new(CategoryService::new(db_pool.clone())),
            products: Arc::new(ProductService::new(db_pool.clone(), uploads)),
            auth: Arc::new(AuthService::new(AuthConfig::from(config), db_pool)),
        }
    }
}
