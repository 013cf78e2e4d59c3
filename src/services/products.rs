use crate::{
    entities::{category, product, CategoryModel, ProductModel},
    errors::ServiceError,
    services::uploads::{ImageUpload, UploadStore},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryOrder, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Product manager: CRUD over products and their uploaded images
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    uploads: UploadStore,
}

/// Product fields as submitted by a form; `None` means "not supplied".
#[derive(Debug, Clone, Default)]
pub struct ProductFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    /// `Some(None)` clears the category reference
    pub category_id: Option<Option<Uuid>>,
}

/// A product with its category reference resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductWithCategory {
    pub product: ProductModel,
    pub category: Option<CategoryModel>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, uploads: UploadStore) -> Self {
        Self { db, uploads }
    }

    /// Creates a product; name, description, price and stock are required.
    #[instrument(skip(self, image))]
    pub async fn create_product(
        &self,
        fields: ProductFields,
        image: Option<ImageUpload>,
    ) -> Result<ProductModel, ServiceError> {
        let name = required(fields.name, "name")?;
        let description = required(fields.description, "description")?;
        let price = required(fields.price, "price")?;
        let stock = required(fields.stock, "stock")?;

        let image_url = match image {
            Some(upload) => Some(self.uploads.save(&upload).await?),
            None => None,
        };

        let now = Utc::now();
        let inserted = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            description: Set(description),
            price: Set(price),
            stock: Set(stock),
            image_url: Set(image_url.clone()),
            category_id: Set(fields.category_id.flatten()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await;

        let product = match inserted {
            Ok(product) => product,
            Err(e) => {
                self.discard_upload(image_url.as_deref()).await;
                return Err(e.into());
            }
        };

        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Lists all products in creation order with their categories resolved
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<ProductWithCategory>, ServiceError> {
        let rows = product::Entity::find()
            .find_also_related(category::Entity)
            .order_by_asc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(product, category)| ProductWithCategory { product, category })
            .collect())
    }

    /// Fetches one product with its category resolved
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> Result<ProductWithCategory, ServiceError> {
        let (product, category) = product::Entity::find_by_id(id)
            .find_also_related(category::Entity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        Ok(ProductWithCategory { product, category })
    }

    /// Overwrites the supplied fields only. The image URL changes only when a
    /// new image is uploaded; the previous file stays on disk.
    #[instrument(skip(self, image))]
    pub async fn update_product(
        &self,
        id: Uuid,
        fields: ProductFields,
        image: Option<ImageUpload>,
    ) -> Result<ProductModel, ServiceError> {
        let existing = product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let mut product: product::ActiveModel = existing.into();
        if let Some(name) = fields.name {
            product.name = Set(name);
        }
        if let Some(description) = fields.description {
            product.description = Set(description);
        }
        if let Some(price) = fields.price {
            product.price = Set(price);
        }
        if let Some(stock) = fields.stock {
            product.stock = Set(stock);
        }
        if let Some(category_id) = fields.category_id {
            product.category_id = Set(category_id);
        }
        let new_image_url = match image {
            Some(upload) => Some(self.uploads.save(&upload).await?),
            None => None,
        };
        if let Some(url) = &new_image_url {
            product.image_url = Set(Some(url.clone()));
        }
        product.updated_at = Set(Utc::now());

        let updated = match product.update(&*self.db).await {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_upload(new_image_url.as_deref()).await;
                return Err(e.into());
            }
        };
        info!(product_id = %id, "Product updated");
        Ok(updated)
    }

    /// Deletes a product; categories are left untouched
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let product = product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        product.delete(&*self.db).await?;
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// A stored image whose record was rejected would never be referenced.
    async fn discard_upload(&self, image_url: Option<&str>) {
        if let Some(url) = image_url {
            self.uploads.discard(url).await;
        }
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, ServiceError> {
    value.ok_or_else(|| ServiceError::ValidationError(format!("Product {} is required", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::categories::{CategoryService, CreateCategoryInput};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use sea_orm::PaginatorTrait;

    struct Fixture {
        products: ProductService,
        categories: CategoryService,
        db: Arc<DatabaseConnection>,
        store: UploadStore,
        _uploads: tempfile::TempDir,
    }

    async fn setup() -> Fixture {
        let db = Arc::new(crate::db::test_support::memory_db().await);
        let uploads = tempfile::tempdir().unwrap();
        let store = UploadStore::new(uploads.path());
        Fixture {
            products: ProductService::new(db.clone(), store.clone()),
            categories: CategoryService::new(db.clone()),
            db,
            store,
            _uploads: uploads,
        }
    }

    fn fields(name: &str, category_id: Option<Uuid>) -> ProductFields {
        ProductFields {
            name: Some(name.to_string()),
            description: Some(format!("{} description", name)),
            price: Some(dec!(19.99)),
            stock: Some(7),
            category_id: Some(category_id),
        }
    }

    fn image(name: &str, bytes: &[u8]) -> ImageUpload {
        ImageUpload {
            file_name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn create_requires_core_fields() {
        let f = setup().await;
        let mut missing_price = fields("Phone", None);
        missing_price.price = None;

        assert_matches!(
            f.products.create_product(missing_price, None).await,
            Err(ServiceError::ValidationError(msg)) if msg.contains("price")
        );
        assert_eq!(product::Entity::find().count(&*f.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_with_image_sets_image_url() {
        let f = setup().await;
        let created = f
            .products
            .create_product(fields("Phone", None), Some(image("phone.png", b"png")))
            .await
            .unwrap();

        let url = created.image_url.expect("image url");
        assert!(url.starts_with("uploads/"));
        assert!(url.ends_with("-phone.png"));
        let path = f.store.path_for(&url).unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn list_resolves_category_exactly() {
        let f = setup().await;
        let category = f
            .categories
            .create_category(CreateCategoryInput {
                name: "Electronics".to_string(),
                sub_categories: vec!["Phones".to_string()],
            })
            .await
            .unwrap();
        f.products
            .create_product(fields("Phone", Some(category.id)), None)
            .await
            .unwrap();
        f.products
            .create_product(fields("Loose item", None), None)
            .await
            .unwrap();

        let listed = f.products.list_products().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].category.as_ref(), Some(&category));
        assert_eq!(listed[1].category, None);
    }

    #[tokio::test]
    async fn update_keeps_image_unless_replaced() {
        let f = setup().await;
        let created = f
            .products
            .create_product(fields("Phone", None), Some(image("old.png", b"old")))
            .await
            .unwrap();
        let original_url = created.image_url.clone();

        let renamed = f
            .products
            .update_product(
                created.id,
                ProductFields {
                    name: Some("Smartphone".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Smartphone");
        assert_eq!(renamed.description, created.description);
        assert_eq!(renamed.price, created.price);
        assert_eq!(renamed.image_url, original_url);

        let reimaged = f
            .products
            .update_product(created.id, ProductFields::default(), Some(image("new.png", b"new")))
            .await
            .unwrap();
        let new_url = reimaged.image_url.expect("new image url");
        assert!(new_url.ends_with("-new.png"));
        assert_ne!(Some(new_url), original_url.clone());

        // The replaced file is not removed.
        let old_path = f.store.path_for(&original_url.unwrap()).unwrap();
        assert!(tokio::fs::metadata(&old_path).await.is_ok());
    }

    #[tokio::test]
    async fn update_and_delete_unknown_product_are_not_found() {
        let f = setup().await;

        assert_matches!(
            f.products
                .update_product(Uuid::new_v4(), ProductFields::default(), None)
                .await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            f.products.delete_product(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            f.products.get_product(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn delete_leaves_category_in_place() {
        let f = setup().await;
        let category = f
            .categories
            .create_category(CreateCategoryInput {
                name: "Books".to_string(),
                sub_categories: vec![],
            })
            .await
            .unwrap();
        let created = f
            .products
            .create_product(fields("Novel", Some(category.id)), None)
            .await
            .unwrap();

        f.products.delete_product(created.id).await.unwrap();

        assert!(f.products.list_products().await.unwrap().is_empty());
        assert!(category::Entity::find_by_id(category.id)
            .one(&*f.db)
            .await
            .unwrap()
            .is_some());
        // With no products left the category can now be removed.
        f.categories.delete_category(category.id).await.unwrap();
    }

    async fn stored_files(f: &Fixture) -> usize {
        let mut entries = match tokio::fs::read_dir(f.store.dir()).await {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn rejected_insert_removes_saved_image() {
        let f = setup().await;

        let result = f
            .products
            .create_product(
                fields("Phone", Some(Uuid::new_v4())),
                Some(image("phone.png", b"png")),
            )
            .await;

        assert_matches!(result, Err(ServiceError::DatabaseError(_)));
        assert_eq!(product::Entity::find().count(&*f.db).await.unwrap(), 0);
        assert_eq!(stored_files(&f).await, 0);
    }

    #[tokio::test]
    async fn rejected_update_removes_new_image_and_keeps_old_one() {
        let f = setup().await;
        let created = f
            .products
            .create_product(fields("Phone", None), Some(image("old.png", b"old")))
            .await
            .unwrap();

        let result = f
            .products
            .update_product(
                created.id,
                ProductFields {
                    category_id: Some(Some(Uuid::new_v4())),
                    ..Default::default()
                },
                Some(image("new.png", b"new")),
            )
            .await;

        assert_matches!(result, Err(ServiceError::DatabaseError(_)));
        assert_eq!(stored_files(&f).await, 1);
        let stored = f.products.get_product(created.id).await.unwrap();
        assert_eq!(stored.product.image_url, created.image_url);
    }
}
