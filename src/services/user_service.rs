use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::models::user::{NewUser, User, UserChanges};

/// Local user table keyed by the identity provider's user id.
///
/// Uniqueness of `external_id` and `email` is enforced by the storage layer;
/// violations surface as [`Error::Conflict`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User>;

    /// Fails with [`Error::NotFound`] when no row carries `external_id`.
    async fn update_by_external_id(&self, external_id: &str, changes: UserChanges) -> Result<User>;

    /// Fails with [`Error::NotFound`] when no row carries `external_id`.
    async fn delete_by_external_id(&self, external_id: &str) -> Result<()>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>>;
}

#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, external_id, email, first_name, last_name)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, external_id, email, first_name, last_name
            "#,
        )
        .bind(&user.id)
        .bind(&user.external_id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match Error::from(e) {
            Error::Conflict(_) => Error::Conflict(format!(
                "user with external id {} or email already exists",
                user.external_id
            )),
            other => other,
        })?;
        Ok(row)
    }

    async fn update_by_external_id(&self, external_id: &str, changes: UserChanges) -> Result<User> {
        let row = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = ?1,
                first_name = COALESCE(?2, first_name),
                last_name = COALESCE(?3, last_name)
            WHERE external_id = ?4
            RETURNING id, external_id, email, first_name, last_name
            "#,
        )
        .bind(&changes.email)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("no user with external id {}", external_id)))
    }

    async fn delete_by_external_id(&self, external_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE external_id = ?1")
            .bind(external_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "no user with external id {}",
                external_id
            )));
        }
        Ok(())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, User>(
            r#"SELECT id, external_id, email, first_name, last_name FROM users WHERE external_id = ?1"#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::pool::{create_memory_pool, run_migrations};

    async fn setup_store() -> (SqliteUserStore, SqlitePool) {
        let pool = create_memory_pool().await.expect("pool");
        run_migrations(&pool).await.expect("migrations");
        (SqliteUserStore::new(pool.clone()), pool)
    }

    async fn count_users(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .expect("count")
    }

    #[tokio::test]
    async fn insert_and_find() {
        let (store, _pool) = setup_store().await;
        let created = store
            .insert(NewUser::new("ext_1", "a@example.com", Some("A".into()), None))
            .await
            .unwrap();
        assert_eq!(created.external_id, "ext_1");
        assert_eq!(created.last_name, "");

        let found = store.find_by_external_id("ext_1").await.unwrap();
        assert_eq!(found, Some(created));
        assert_eq!(store.find_by_external_id("ext_2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_external_id_is_conflict() {
        let (store, pool) = setup_store().await;
        let first = store
            .insert(NewUser::new("ext_1", "a@example.com", None, None))
            .await
            .unwrap();
        let err = store
            .insert(NewUser::new("ext_1", "b@example.com", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(count_users(&pool).await, 1);
        assert_eq!(store.find_by_external_id("ext_1").await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let (store, pool) = setup_store().await;
        store
            .insert(NewUser::new("ext_1", "a@example.com", None, None))
            .await
            .unwrap();
        let err = store
            .insert(NewUser::new("ext_2", "a@example.com", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(count_users(&pool).await, 1);
    }

    #[tokio::test]
    async fn update_keeps_names_when_absent() {
        let (store, _pool) = setup_store().await;
        store
            .insert(NewUser::new("ext_1", "a@example.com", Some("Alice".into()), Some("Smith".into())))
            .await
            .unwrap();

        let updated = store
            .update_by_external_id("ext_1", UserChanges::new("new@example.com", None, Some("Jones".into())))
            .await
            .unwrap();
        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.first_name, "Alice");
        assert_eq!(updated.last_name, "Jones");
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let (store, _pool) = setup_store().await;
        let err = store
            .update_by_external_id("ext_missing", UserChanges::new("a@example.com", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn update_into_taken_email_is_conflict() {
        let (store, _pool) = setup_store().await;
        store
            .insert(NewUser::new("ext_1", "a@example.com", None, None))
            .await
            .unwrap();
        store
            .insert(NewUser::new("ext_2", "b@example.com", None, None))
            .await
            .unwrap();
        let err = store
            .update_by_external_id("ext_2", UserChanges::new("a@example.com", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        let untouched = store.find_by_external_id("ext_2").await.unwrap().unwrap();
        assert_eq!(untouched.email, "b@example.com");
    }

    #[tokio::test]
    async fn delete_is_exact_match() {
        let (store, pool) = setup_store().await;
        store
            .insert(NewUser::new("ext_1", "a@example.com", None, None))
            .await
            .unwrap();
        store
            .insert(NewUser::new("ext_2", "b@example.com", None, None))
            .await
            .unwrap();

        let err = store.delete_by_external_id("ext_3").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(count_users(&pool).await, 2);

        store.delete_by_external_id("ext_1").await.unwrap();
        assert_eq!(count_users(&pool).await, 1);
        assert!(store.find_by_external_id("ext_2").await.unwrap().is_some());
    }
}
