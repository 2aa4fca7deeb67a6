//! Authentication and user management service

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use super::{
    activities::ActivityRecorder,
    cache::{keys, CacheService},
};
use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        user::{CreateUser, RegisterUser, Role, UpdateUser, User, UserClaims},
        ActivityType, NewActivity, PageQuery,
    },
    repository::{AccountStore, NewUser},
};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Sign a JWT for the user
pub fn issue_token(user: &User, config: &AuthConfig) -> AppResult<String> {
    let now = Utc::now().timestamp();
    let claims = UserClaims {
        sub: user.email.clone(),
        user_id: user.id,
        role: user.role,
        exp: now + (config.jwt_expiration_hours as i64 * 3600),
        iat: now,
    };

    claims
        .create_token(&config.jwt_secret)
        .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
}

#[derive(Clone)]
pub struct UsersService {
    users: Arc<dyn AccountStore>,
    config: AuthConfig,
    cache: CacheService,
    activities: ActivityRecorder,
}

impl UsersService {
    pub fn new(
        users: Arc<dyn AccountStore>,
        config: AuthConfig,
        cache: CacheService,
        activities: ActivityRecorder,
    ) -> Self {
        Self {
            users,
            config,
            cache,
            activities,
        }
    }

    pub fn token_lifetime_seconds(&self) -> i64 {
        self.config.jwt_expiration_hours as i64 * 3600
    }

    /// Authenticate by email and password, returning a JWT
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !verify_password(&user.password, password)? {
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        let token = issue_token(&user, &self.config)?;
        tracing::info!("User {} logged in", user.id);

        Ok((token, user))
    }

    /// Self-registration; the account is always a reader
    pub async fn register(&self, input: RegisterUser) -> AppResult<User> {
        input.validate()?;
        self.insert(&input.name, &input.email, &input.password, None, None, Role::Reader)
            .await
    }

    pub async fn get_user(&self, id: i32) -> AppResult<User> {
        self.users.get_by_id(id).await
    }

    pub async fn get_by_email(&self, email: &str) -> AppResult<User> {
        self.users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with email {} not found", email)))
    }

    pub async fn list_users(&self, page: &PageQuery) -> AppResult<(Vec<User>, i64)> {
        self.users.list(page).await
    }

    /// Create a user with any role
    pub async fn create_user(&self, input: CreateUser) -> AppResult<User> {
        input.validate()?;
        self.insert(
            &input.name,
            &input.email,
            &input.password,
            input.phone.as_deref(),
            input.address.as_deref(),
            input.role.unwrap_or(Role::Reader),
        )
        .await
    }

    /// Update a user; the password is re-hashed when supplied
    pub async fn update_user(&self, id: i32, input: UpdateUser) -> AppResult<User> {
        input.validate()?;
        self.users.get_by_id(id).await?;

        if let Some(ref email) = input.email {
            if self.users.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
        }

        let password_hash = match input.password {
            Some(ref password) => Some(hash_password(password)?),
            None => None,
        };

        let user = self.users.update(id, &input, password_hash).await?;

        self.activities
            .record(
                NewActivity::new(ActivityType::UserUpdated, format!("User updated: {}", user.name))
                    .user(&user.name),
            )
            .await;
        self.cache.invalidate(&keys::statistics()).await;

        Ok(user)
    }

    /// Create the configured administrator account if it does not exist yet
    pub async fn ensure_admin(&self) -> AppResult<()> {
        let (Some(email), Some(password)) = (&self.config.admin_email, &self.config.admin_password) else {
            return Ok(());
        };

        if self.users.email_exists(email, None).await? {
            return Ok(());
        }

        self.insert("Administrator", email, password, None, None, Role::Admin)
            .await?;
        tracing::info!("Bootstrap administrator {} created", email);
        Ok(())
    }

    /// Soft delete
    pub async fn delete_user(&self, id: i32) -> AppResult<()> {
        let user = self.users.get_by_id(id).await?;
        self.users.delete(id).await?;
        tracing::info!("User {} deleted", id);

        self.activities
            .record(
                NewActivity::new(ActivityType::UserDeleted, format!("User deleted: {}", user.name))
                    .user(&user.name),
            )
            .await;
        self.cache.invalidate(&keys::statistics()).await;

        Ok(())
    }

    async fn insert(
        &self,
        name: &str,
        email: &str,
        password: &str,
        phone: Option<&str>,
        address: Option<&str>,
        role: Role,
    ) -> AppResult<User> {
        if self.users.email_exists(email, None).await? {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let user = self
            .users
            .create(&NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash: hash_password(password)?,
                phone: phone.map(str::to_string),
                address: address.map(str::to_string),
                role,
            })
            .await?;
        tracing::info!("User {} created with role {}", user.id, user.role);

        self.activities
            .record(
                NewActivity::new(ActivityType::UserCreated, format!("New user registered: {}", user.name))
                    .user(&user.name),
            )
            .await;
        self.cache.invalidate(&keys::statistics()).await;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::user::fixtures::user,
        repository::{memory::MemoryStore, MockAccountStore},
        services::cache::MemoryCache,
    };

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_hours: 2,
            admin_email: None,
            admin_password: None,
        }
    }

    fn service(accounts: MockAccountStore, config: AuthConfig) -> (UsersService, Arc<MemoryStore>) {
        let log = Arc::new(MemoryStore::new());
        let service = UsersService::new(
            Arc::new(accounts),
            config,
            CacheService::new(Arc::new(MemoryCache::new()), 60),
            ActivityRecorder::new(log.clone()),
        );
        (service, log)
    }

    /// Echo the insert back as a stored user with id 1
    fn created(new_user: &NewUser) -> AppResult<User> {
        let mut stored = user(1, new_user.role);
        stored.name = new_user.name.clone();
        stored.email = new_user.email.clone();
        stored.password = new_user.password_hash.clone();
        Ok(stored)
    }

    fn admin_config() -> AuthConfig {
        AuthConfig {
            admin_email: Some("admin@library.local".to_string()),
            admin_password: Some("admin123".to_string()),
            ..auth_config()
        }
    }

    #[tokio::test]
    async fn test_register_always_creates_reader() {
        let mut accounts = MockAccountStore::new();
        accounts.expect_email_exists().returning(|_, _| Ok(false));
        accounts
            .expect_create()
            .withf(|new_user| new_user.role == Role::Reader && new_user.password_hash != "secret123")
            .times(1)
            .returning(created);
        let (service, log) = service(accounts, auth_config());

        let user = service
            .register(RegisterUser {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(user.role, Role::Reader);
        assert!(verify_password(&user.password, "secret123").unwrap());
        assert_eq!(log.activity_types(), vec![ActivityType::UserCreated]);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_email_exists()
            .withf(|email, exclude| email == "ada@example.com" && exclude.is_none())
            .returning(|_, _| Ok(true));
        accounts.expect_create().never();
        let (service, log) = service(accounts, auth_config());

        let result = service
            .register(RegisterUser {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                password: "secret123".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(log.activity_types().is_empty());
    }

    #[tokio::test]
    async fn test_update_to_taken_email() {
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_get_by_id()
            .returning(|id| Ok(user(id, Role::Reader)));
        accounts
            .expect_email_exists()
            .withf(|_, exclude| *exclude == Some(4))
            .returning(|_, _| Ok(true));
        accounts.expect_update().never();
        let (service, _) = service(accounts, auth_config());

        let result = service
            .update_user(
                4,
                UpdateUser {
                    name: None,
                    email: Some("taken@example.com".to_string()),
                    password: None,
                    phone: None,
                    address: None,
                    role: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_ensure_admin_creates_missing_account() {
        let mut accounts = MockAccountStore::new();
        accounts.expect_email_exists().returning(|_, _| Ok(false));
        accounts
            .expect_create()
            .withf(|new_user| new_user.role == Role::Admin && new_user.email == "admin@library.local")
            .times(1)
            .returning(created);
        let (service, _) = service(accounts, admin_config());

        service.ensure_admin().await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_admin_keeps_existing_account() {
        let mut accounts = MockAccountStore::new();
        accounts
            .expect_email_exists()
            .times(1)
            .returning(|_, _| Ok(true));
        accounts.expect_create().never();
        let (service, log) = service(accounts, admin_config());

        service.ensure_admin().await.unwrap();
        assert!(log.activity_types().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_admin_without_credentials() {
        let mut accounts = MockAccountStore::new();
        accounts.expect_email_exists().never();
        accounts.expect_create().never();
        let (service, _) = service(accounts, auth_config());

        service.ensure_admin().await.unwrap();
    }

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password(&hash, "correct horse").unwrap());
        assert!(!verify_password(&hash, "battery staple").unwrap());
    }

    #[test]
    fn test_garbage_hash_is_internal_error() {
        assert!(matches!(
            verify_password("not-a-hash", "x"),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn test_issued_token_carries_role_and_lifetime() {
        let config = auth_config();
        let token = issue_token(&user(7, Role::Librarian), &config).unwrap();

        let claims = UserClaims::from_token(&token, &config.jwt_secret).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "user7@example.com");
        assert_eq!(claims.role, Role::Librarian);
        assert_eq!(claims.exp - claims.iat, 2 * 3600);
    }
}
