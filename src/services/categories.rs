use crate::{
    db::with_transaction,
    entities::{category, product, subcategory, CategoryModel},
    errors::ServiceError,
};
use chrono::Utc;
use futures::future::try_join_all;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Category manager: owns categories and the subcategories created with them
#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Creates a category together with its subcategories.
    ///
    /// Subcategory inserts are issued concurrently on one transaction; the
    /// stored id list follows the order of `sub_categories`.
    #[instrument(skip(self))]
    pub async fn create_category(
        &self,
        input: CreateCategoryInput,
    ) -> Result<CategoryModel, ServiceError> {
        let CreateCategoryInput {
            name,
            sub_categories,
        } = input;

        if name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Category name is required".to_string(),
            ));
        }
        if sub_categories.iter().any(|sub| sub.trim().is_empty()) {
            return Err(ServiceError::ValidationError(
                "Subcategory name is required".to_string(),
            ));
        }

        let category = with_transaction::<_, _, ServiceError>(&self.db, move |txn| {
            Box::pin(async move {
                let category_id = Uuid::new_v4();
                let category = category::ActiveModel {
                    id: Set(category_id),
                    name: Set(name),
                    sub_category_ids: Set(category::SubCategoryIds::default()),
                    created_at: Set(Utc::now()),
                }
                .insert(txn)
                .await?;

                let inserts = sub_categories.into_iter().map(|sub_name| {
                    subcategory::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        name: Set(sub_name),
                        category_id: Set(category_id),
                    }
                    .insert(txn)
                });
                let subcategories = try_join_all(inserts).await?;

                let ids: Vec<Uuid> = subcategories.iter().map(|sub| sub.id).collect();
                let mut category: category::ActiveModel = category.into();
                category.sub_category_ids = Set(ids.into());
                Ok(category.update(txn).await?)
            })
        })
        .await?;

        info!(
            category_id = %category.id,
            subcategories = category.sub_category_ids.len(),
            "Category created"
        );
        Ok(category)
    }

    /// Lists categories in creation order with their subcategories resolved
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<CategoryWithSubcategories>, ServiceError> {
        let categories = category::Entity::find()
            .order_by_asc(category::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        // Every subcategory belongs to a listed category, so load them all in
        // one unparameterised query.
        let mut by_id: HashMap<Uuid, subcategory::Model> = subcategory::Entity::find()
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|sub| (sub.id, sub))
            .collect();

        Ok(categories
            .into_iter()
            .map(|category| {
                // Ids without a stored subcategory are skipped.
                let sub_categories = category
                    .sub_category_ids
                    .iter()
                    .filter_map(|id| by_id.remove(id))
                    .map(|sub| SubcategoryRef {
                        id: sub.id,
                        name: sub.name,
                    })
                    .collect();

                CategoryWithSubcategories {
                    id: category.id,
                    name: category.name,
                    sub_categories,
                }
            })
            .collect())
    }

    /// Deletes a category and every subcategory that belongs to it.
    ///
    /// Fails with `NotFound` when the category does not exist and with
    /// `Conflict` while products still reference it; in both cases nothing
    /// is removed. Returns the number of subcategories deleted.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: Uuid) -> Result<u64, ServiceError> {
        let removed = with_transaction::<_, _, ServiceError>(&self.db, move |txn| {
            Box::pin(async move {
                let category = category::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound("Category not found".to_string()))?;

                let referencing = product::Entity::find()
                    .filter(product::Column::CategoryId.eq(id))
                    .count(txn)
                    .await?;
                if referencing > 0 {
                    return Err(ServiceError::Conflict(format!(
                        "Category {} is still referenced by {} product(s)",
                        id, referencing
                    )));
                }

                let removed = subcategory::Entity::delete_many()
                    .filter(subcategory::Column::CategoryId.eq(id))
                    .exec(txn)
                    .await?
                    .rows_affected;

                category.delete(txn).await?;
                Ok(removed)
            })
        })
        .await?;

        info!(category_id = %id, subcategories_removed = removed, "Category deleted");
        Ok(removed)
    }
}

/// Input for creating a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    pub sub_categories: Vec<String>,
}

/// Subcategory reference resolved to its name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategoryRef {
    pub id: Uuid,
    pub name: String,
}

/// Category as listed, with subcategories in stored order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryWithSubcategories {
    pub id: Uuid,
    pub name: String,
    pub sub_categories: Vec<SubcategoryRef>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    async fn setup() -> (CategoryService, Arc<DatabaseConnection>) {
        let db = Arc::new(crate::db::test_support::memory_db().await);
        (CategoryService::new(db.clone()), db)
    }

    fn input(name: &str, subs: &[&str]) -> CreateCategoryInput {
        CreateCategoryInput {
            name: name.to_string(),
            sub_categories: subs.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn subcategory_count(db: &DatabaseConnection) -> u64 {
        subcategory::Entity::find().count(db).await.unwrap()
    }

    #[tokio::test]
    async fn create_stores_subcategories_in_input_order() {
        let (service, db) = setup().await;
        let names = ["Phones", "Laptops", "Tablets", "Cameras", "Audio"];

        let category = service
            .create_category(input("Electronics", &names))
            .await
            .unwrap();
        assert_eq!(category.sub_category_ids.len(), names.len());

        for (id, expected) in category.sub_category_ids.iter().zip(names) {
            let sub = subcategory::Entity::find_by_id(*id)
                .one(&*db)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(sub.name, expected);
            assert_eq!(sub.category_id, category.id);
        }
    }

    #[tokio::test]
    async fn create_without_subcategories_has_empty_list() {
        let (service, _db) = setup().await;
        let category = service.create_category(input("Books", &[])).await.unwrap();
        assert!(category.sub_category_ids.is_empty());
    }

    #[tokio::test]
    async fn blank_name_is_rejected_without_writes() {
        let (service, db) = setup().await;

        assert_matches!(
            service.create_category(input("  ", &["A"])).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            service.create_category(input("Garden", &["Tools", ""])).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(category::Entity::find().count(&*db).await.unwrap(), 0);
        assert_eq!(subcategory_count(&db).await, 0);
    }

    #[tokio::test]
    async fn list_resolves_subcategory_names_in_order() {
        let (service, _db) = setup().await;
        service
            .create_category(input("Electronics", &["Phones", "Laptops"]))
            .await
            .unwrap();
        service
            .create_category(input("Books", &["Fiction"]))
            .await
            .unwrap();

        let listed = service.list_categories().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Electronics");
        let names: Vec<_> = listed[0]
            .sub_categories
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Phones", "Laptops"]);
        assert_eq!(listed[1].name, "Books");
        assert_eq!(listed[1].sub_categories.len(), 1);
    }

    #[tokio::test]
    async fn delete_cascades_only_to_own_subcategories() {
        let (service, db) = setup().await;
        let doomed = service
            .create_category(input("Electronics", &["Phones", "Laptops"]))
            .await
            .unwrap();
        let kept = service
            .create_category(input("Books", &["Fiction"]))
            .await
            .unwrap();

        let removed = service.delete_category(doomed.id).await.unwrap();
        assert_eq!(removed, 2);

        assert!(category::Entity::find_by_id(doomed.id)
            .one(&*db)
            .await
            .unwrap()
            .is_none());
        let remaining = subcategory::Entity::find().all(&*db).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].category_id, kept.id);
    }

    #[tokio::test]
    async fn delete_unknown_category_is_not_found_and_keeps_subcategories() {
        let (service, db) = setup().await;
        service
            .create_category(input("Electronics", &["Phones"]))
            .await
            .unwrap();

        assert_matches!(
            service.delete_category(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
        assert_eq!(subcategory_count(&db).await, 1);
    }

    #[tokio::test]
    async fn delete_referenced_category_conflicts_and_removes_nothing() {
        let (service, db) = setup().await;
        let category = service
            .create_category(input("Electronics", &["Phones"]))
            .await
            .unwrap();

        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Handset".to_string()),
            description: Set("A phone".to_string()),
            price: Set(dec!(199.5)),
            stock: Set(3),
            image_url: Set(None),
            category_id: Set(Some(category.id)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*db)
        .await
        .unwrap();

        assert_matches!(
            service.delete_category(category.id).await,
            Err(ServiceError::Conflict(_))
        );
        assert!(category::Entity::find_by_id(category.id)
            .one(&*db)
            .await
            .unwrap()
            .is_some());
        assert_eq!(subcategory_count(&db).await, 1);
    }

    #[tokio::test]
    async fn list_handles_more_categories_than_bind_parameters() {
        let (service, db) = setup().await;
        let electronics = service
            .create_category(input("Electronics", &["Phones"]))
            .await
            .unwrap();

        // SQLite accepts at most 32766 bound parameters per statement.
        let created_at = Utc::now();
        for _ in 0..33 {
            let batch = (0..1_000).map(|i| category::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(format!("Bulk {}", i)),
                sub_category_ids: Set(category::SubCategoryIds::default()),
                created_at: Set(created_at),
            });
            category::Entity::insert_many(batch).exec(&*db).await.unwrap();
        }

        let listed = service.list_categories().await.unwrap();
        assert_eq!(listed.len(), 33_001);
        let first = listed.iter().find(|c| c.id == electronics.id).unwrap();
        assert_eq!(first.sub_categories.len(), 1);
        assert_eq!(first.sub_categories[0].name, "Phones");
    }
}
