//! User model, roles and JWT claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgTypeInfo, Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Librarian,
    Reader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Librarian => "LIBRARIAN",
            Role::Reader => "READER",
        }
    }

    /// Admins and librarians run the circulation desk
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Librarian)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "LIBRARIAN" => Ok(Role::Librarian),
            "READER" => Ok(Role::Reader),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// Stored as a VARCHAR column
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Role,
    #[sqlx(rename = "is_deleted")]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// User as exposed by the API (never carries the password hash)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserDetails {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<User> for UserDetails {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            address: user.address,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Create user request (admin)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Option<Role>,
}

/// Update user request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Only administrators may change roles
    pub role: Option<Role>,
}

/// Self-registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require ADMIN or LIBRARIAN
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Librarian privileges required".to_string()))
        }
    }

    /// Require ADMIN
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Allow the user themselves, or staff acting on their behalf
    pub fn require_self_or_staff(&self, user_id: i32) -> Result<(), AppError> {
        if self.user_id == user_id || self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Access to another user's data denied".to_string()))
        }
    }

    /// Only administrators may set a role
    pub fn require_role_change(&self, role: Option<Role>) -> Result<(), AppError> {
        match role {
            Some(_) if !self.is_admin() => Err(AppError::Authorization(
                "Only administrators can change roles".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub fn user(id: i32, role: Role) -> User {
        User {
            id,
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            password: String::new(),
            phone: None,
            address: None,
            role,
            deleted: false,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(user_id: i32, role: Role) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: format!("user{}@example.com", user_id),
            user_id,
            role,
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("librarian".parse::<Role>().unwrap(), Role::Librarian);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("guest".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::Reader).unwrap(), "\"READER\"");
    }

    #[test]
    fn test_token_round_trip() {
        let original = claims(42, Role::Librarian);
        let token = original.create_token("secret").unwrap();
        let decoded = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(decoded.user_id, 42);
        assert_eq!(decoded.role, Role::Librarian);
        assert!(UserClaims::from_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_role_checks() {
        let reader = claims(1, Role::Reader);
        let librarian = claims(2, Role::Librarian);
        let admin = claims(3, Role::Admin);

        assert!(reader.require_staff().is_err());
        assert!(librarian.require_staff().is_ok());
        assert!(librarian.require_admin().is_err());
        assert!(admin.require_admin().is_ok());

        assert!(reader.require_self_or_staff(1).is_ok());
        assert!(reader.require_self_or_staff(2).is_err());
        assert!(librarian.require_self_or_staff(1).is_ok());
    }

    #[test]
    fn test_role_change_is_admin_only() {
        let reader = claims(1, Role::Reader);
        let librarian = claims(2, Role::Librarian);
        let admin = claims(3, Role::Admin);

        assert!(reader.require_role_change(None).is_ok());
        assert!(matches!(
            reader.require_role_change(Some(Role::Admin)),
            Err(AppError::Authorization(_))
        ));
        assert!(librarian.require_role_change(Some(Role::Reader)).is_err());
        assert!(admin.require_role_change(Some(Role::Librarian)).is_ok());
    }
}
