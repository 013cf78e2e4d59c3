/*!
 * # Authentication Module
 *
 * Password registration and login for catalog administrators, HS256 bearer
 * token issuance, and the middleware that guards mutating routes.
 */

use crate::config::AppConfig;
use crate::errors::ServiceError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

pub mod user;

pub use user::UserResponse;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at time
    pub iat: i64,
    /// Expiration time, only present when a token lifetime is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Authenticated user data extracted from the bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_lifetime: Option<Duration>,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, token_lifetime: Option<Duration>) -> Self {
        Self {
            jwt_secret,
            token_lifetime,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.jwt_expiration_secs.map(Duration::from_secs),
        )
    }
}

/// Username/password pair accepted by register and login
#[derive(Debug, Clone, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct Credentials {
    #[serde(default)]
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Token returned by a successful login
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Authentication service that handles accounts, token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
    db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Creates a user with a salted argon2 hash of the password.
    /// A duplicate username is rejected by the unique index as a database error.
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn register(&self, credentials: Credentials) -> Result<UserResponse, ServiceError> {
        credentials.validate()?;

        let password_hash = hash_password(&credentials.password)?;
        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(credentials.username),
            password_hash: Set(password_hash),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = %user.id, "User registered");
        Ok(user.into())
    }

    /// Verifies the credentials and issues a bearer token for the user.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ServiceError> {
        let user = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                debug!("Login attempt for unknown user");
                ServiceError::InvalidCredentials
            })?;

        verify_password(password, &user.password_hash)?;

        let token = self.issue_token(user.id)?;
        info!(user_id = %user.id, "User logged in");
        Ok(TokenResponse { token })
    }

    /// Signs an HS256 token whose subject is the user id
    pub fn issue_token(&self, user_id: Uuid) -> Result<String, ServiceError> {
        let now = Utc::now();
        let exp = match self.config.token_lifetime {
            Some(lifetime) => {
                let lifetime = chrono::Duration::from_std(lifetime).map_err(|_| {
                    ServiceError::InternalError("Invalid token lifetime".to_string())
                })?;
                Some((now + lifetime).timestamp())
            }
            None => None,
        };

        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )?)
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is checked whenever present but not demanded.
        validation.required_spec_claims.clear();

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::Unauthorized("Token has expired".to_string())
            }
            _ => ServiceError::Unauthorized("Invalid token".to_string()),
        })
    }

    /// Resolves the bearer token into the authenticated user
    pub fn authenticate(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("Invalid token".to_string()))?;
        Ok(AuthUser { user_id })
    }

    /// Get a user by ID
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserResponse, ServiceError> {
        user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), ServiceError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        warn!("Stored password hash is unreadable: {}", e);
        ServiceError::InvalidCredentials
    })?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ServiceError::InvalidCredentials)
}

/// Authentication middleware that extracts and validates bearer tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return ServiceError::InternalError("Authentication service not available".to_string())
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, ServiceError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?;

    auth_service.authenticate(token)
}

/// Extension methods for method routers to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
}

impl<S> AuthRouterExt for axum::routing::MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Guards the registered methods only, so unsupported methods still get 405.
    fn with_auth(self) -> Self {
        self.route_layer(axum::middleware::from_fn(auth_middleware))
    }
}
