/*!
 * Transaction Helper Utilities
 *
 * Runs a unit of work inside a database transaction: commit on `Ok`, rollback
 * on `Err`, with the caller's error type passed through untouched.
 */

use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionError, TransactionTrait};
use std::future::Future;
use std::pin::Pin;

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Execute a function within a database transaction
///
/// ```rust,ignore
/// let category = with_transaction(&db, |txn| {
///     Box::pin(async move {
///         let category = category::ActiveModel { .. }.insert(txn).await?;
///         subcategory::ActiveModel { .. }.insert(txn).await?;
///         Ok(category)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T, E>(db: &DatabaseConnection, f: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: From<DbErr> + std::error::Error + Send,
{
    db.transaction::<F, T, E>(f).await.map_err(|e| match e {
        TransactionError::Connection(db_err) => E::from(db_err),
        TransactionError::Transaction(err) => err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::category;
    use crate::errors::ServiceError;
    use assert_matches::assert_matches;
    use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
    use uuid::Uuid;

    async fn migrated_db() -> DatabaseConnection {
        crate::db::test_support::memory_db().await
    }

    fn new_category(name: &str) -> category::ActiveModel {
        category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            sub_category_ids: Set(category::SubCategoryIds::default()),
            created_at: Set(chrono::Utc::now()),
        }
    }

    #[tokio::test]
    async fn commits_on_success() {
        let db = migrated_db().await;

        let inserted = with_transaction::<_, _, ServiceError>(&db, |txn| {
            Box::pin(async move { Ok(new_category("Books").insert(txn).await?) })
        })
        .await
        .unwrap();

        let stored = category::Entity::find_by_id(inserted.id)
            .one(&db)
            .await
            .unwrap();
        assert_eq!(stored, Some(inserted));
    }

    #[tokio::test]
    async fn rolls_back_and_preserves_error_on_failure() {
        let db = migrated_db().await;

        let result = with_transaction::<_, (), ServiceError>(&db, |txn| {
            Box::pin(async move {
                new_category("Garden").insert(txn).await?;
                Err(ServiceError::NotFound("late failure".into()))
            })
        })
        .await;

        assert_matches!(result, Err(ServiceError::NotFound(_)));
        assert_eq!(category::Entity::find().count(&db).await.unwrap(), 0);
    }
}
