use super::common::{success_response, JsonBody};
use crate::{
    auth::{AuthRouterExt, AuthUser, Credentials, TokenResponse, UserResponse},
    errors::ServiceError,
    AppState,
};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Extension, Router,
};

/// Creates the router for registration, login and the current user
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me).with_auth())
}

/// Register an administrator account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = Credentials,
    responses(
        (status = 200, description = "User registered", body = UserResponse),
        (status = 500, description = "Duplicate username or store failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state.services.auth.register(credentials).await?;
    Ok(success_response(user))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Login succeeded", body = TokenResponse),
        (status = 400, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> Result<impl IntoResponse, ServiceError> {
    let token = state
        .services
        .auth
        .login(&credentials.username, &credentials.password)
        .await?;
    Ok(success_response(token))
}

/// The user the bearer token was issued to
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ServiceError> {
    // A token that outlived its account no longer authenticates anyone.
    let user = state
        .services
        .auth
        .get_user(user.user_id)
        .await
        .map_err(|e| match e {
            ServiceError::NotFound(_) => ServiceError::Unauthorized("Unknown user".to_string()),
            other => other,
        })?;
    Ok(success_response(user))
}
