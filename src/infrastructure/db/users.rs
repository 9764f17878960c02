use crate::domain::error::{AppError, Result};
use crate::domain::user::{User, UserRole};
use sqlx::sqlite::SqlitePool;

pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts the profile or refreshes its contact fields. The stored role
    /// is never overwritten here.
    pub async fn upsert(&self, user: &User) -> Result<User> {
        sqlx::query(
            "INSERT INTO users (id, email, name, company, role, created_at, last_active)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                name = excluded.name,
                company = excluded.company,
                last_active = excluded.last_active",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.company)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.last_active)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to save user: {e}")))?;

        self.get(&user.id).await
    }

    pub async fn get(&self, user_id: &str) -> Result<User> {
        self.find(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User not found: {}", user_id)))
    }

    pub async fn find(&self, user_id: &str) -> Result<Option<User>> {
        let entity = sqlx::query_as::<_, UserEntity>(
            "SELECT id, email, name, company, role, created_at, last_active FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch user: {e}")))?;

        Ok(entity.map(Into::into))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let entities = sqlx::query_as::<_, UserEntity>(
            "SELECT id, email, name, company, role, created_at, last_active
             FROM users ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list users: {e}")))?;

        Ok(entities.into_iter().map(Into::into).collect())
    }

    pub async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        let entities = sqlx::query_as::<_, UserEntity>(
            "SELECT id, email, name, company, role, created_at, last_active
             FROM users WHERE role = ? ORDER BY created_at ASC",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list users: {e}")))?;

        Ok(entities.into_iter().map(Into::into).collect())
    }

    pub async fn update_role(&self, user_id: &str, role: UserRole) -> Result<User> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to update user role: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User not found: {}", user_id)));
        }
        self.get(user_id).await
    }

    pub async fn touch(&self, user_id: &str, now: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_active = ? WHERE id = ?")
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to touch user: {e}")))?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct UserEntity {
    id: String,
    email: String,
    name: String,
    company: Option<String>,
    role: String,
    created_at: i64,
    last_active: i64,
}

impl From<UserEntity> for User {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            email: entity.email,
            name: entity.name,
            company: entity.company,
            role: entity.role.parse().unwrap_or_default(),
            created_at: entity.created_at,
            last_active: entity.last_active,
        }
    }
}
