use crate::domain::error::{AppError, Result};
use crate::domain::user::{RegisterUser, User, UserRole};
use crate::infrastructure::db::UserRepository;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub struct UserUseCase {
    repository: Arc<UserRepository>,
}

impl UserUseCase {
    pub fn new(repository: Arc<UserRepository>) -> Self {
        Self { repository }
    }

    /// Creates or refreshes the caller's own profile. The first profile ever
    /// registered becomes the global admin so the deployment can be managed.
    pub async fn register(&self, user_id: &str, request: RegisterUser) -> Result<User> {
        if user_id.trim().is_empty() {
            return Err(AppError::Unauthorized("Missing caller identity.".to_string()));
        }
        request.validate()?;

        let now = chrono::Utc::now().timestamp_millis();
        let existing = self.repository.find(user_id).await?;
        let role = match &existing {
            Some(user) => user.role,
            None => {
                let admins = self.repository.list_by_role(UserRole::Admin).await?;
                if admins.is_empty() {
                    UserRole::Admin
                } else {
                    UserRole::User
                }
            }
        };

        let user = User {
            id: user_id.to_string(),
            email: request.email.trim().to_string(),
            name: request.name.trim().to_string(),
            company: request.company.filter(|c| !c.trim().is_empty()),
            role,
            created_at: existing.as_ref().map(|u| u.created_at).unwrap_or(now),
            last_active: now,
        };
        let stored = self.repository.upsert(&user).await?;
        if existing.is_none() {
            info!(user_id = %stored.id, role = stored.role.as_str(), "Registered user");
        }
        Ok(stored)
    }

    /// Resolves the caller and records activity. Unknown ids are rejected.
    pub async fn authenticate(&self, user_id: &str) -> Result<User> {
        if user_id.trim().is_empty() {
            return Err(AppError::Unauthorized("Missing caller identity.".to_string()));
        }
        let mut user = self
            .repository
            .find(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(format!("Unknown user: {}", user_id)))?;

        let now = chrono::Utc::now().timestamp_millis();
        self.repository.touch(&user.id, now).await?;
        user.last_active = now;
        Ok(user)
    }

    pub async fn list(&self, caller: &User) -> Result<Vec<User>> {
        require_admin(caller)?;
        self.repository.list().await
    }

    pub async fn set_role(&self, caller: &User, user_id: &str, role: UserRole) -> Result<User> {
        require_admin(caller)?;
        if caller.id == user_id && role != UserRole::Admin {
            return Err(AppError::ValidationError(
                "Admins cannot remove their own admin role.".to_string(),
            ));
        }
        let user = self.repository.update_role(user_id, role).await?;
        info!(user_id = %user.id, role = role.as_str(), changed_by = %caller.id, "Updated user role");
        Ok(user)
    }
}

pub fn require_admin(caller: &User) -> Result<()> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin role required.".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::connection::memory_pool;

    async fn use_case() -> UserUseCase {
        UserUseCase::new(Arc::new(UserRepository::new(memory_pool().await)))
    }

    fn request(email: &str) -> RegisterUser {
        RegisterUser {
            email: email.to_string(),
            name: "Dana".to_string(),
            company: Some("Acme".to_string()),
        }
    }

    #[tokio::test]
    async fn test_first_registration_becomes_admin() {
        let users = use_case().await;
        let first = users.register("u1", request("a@example.com")).await.unwrap();
        let second = users.register("u2", request("b@example.com")).await.unwrap();

        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(second.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_reregistration_keeps_role_and_created_at() {
        let users = use_case().await;
        let first = users.register("u1", request("a@example.com")).await.unwrap();
        let again = users.register("u1", request("new@example.com")).await.unwrap();

        assert_eq!(again.role, UserRole::Admin);
        assert_eq!(again.created_at, first.created_at);
        assert_eq!(again.email, "new@example.com");
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let users = use_case().await;
        let result = users.register("u1", request("not-an-email")).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_authenticate_unknown_is_unauthorized() {
        let users = use_case().await;
        assert!(matches!(
            users.authenticate("ghost").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(users.authenticate("").await, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_role_changes_need_admin() {
        let users = use_case().await;
        let admin = users.register("u1", request("a@example.com")).await.unwrap();
        let trainee = users.register("u2", request("b@example.com")).await.unwrap();

        assert!(matches!(
            users.set_role(&trainee, "u1", UserRole::User).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            users.set_role(&admin, "u1", UserRole::User).await,
            Err(AppError::ValidationError(_))
        ));
        let promoted = users.set_role(&admin, "u2", UserRole::Admin).await.unwrap();
        assert!(promoted.is_admin());
        assert_eq!(users.list(&admin).await.unwrap().len(), 2);
    }
}
