//! REST API for auth-service

mod security_headers;

pub use security_headers::security_headers_middleware;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::{AuthRequest, AuthenticationService, Error, ExternalAssertion};

/// Shared state for the handlers
#[derive(Clone)]
pub struct ApiState {
    pub auth_service: Arc<AuthenticationService>,
}

/// Create the REST API router
pub fn create_router(auth_service: Arc<AuthenticationService>) -> Router {
    create_router_with_state(ApiState { auth_service })
}

pub fn create_router_with_state(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/session", get(session))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error wrapper mapping the service taxonomy onto HTTP statuses
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.0 {
            Error::DuplicateIdentity(_) => (
                StatusCode::CONFLICT,
                "duplicate_identity",
                "Email already registered".to_string(),
            ),
            Error::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid credentials".to_string(),
            ),
            Error::MalformedToken(_) => {
                (StatusCode::UNAUTHORIZED, "invalid_token", "Invalid token".to_string())
            }
            Error::ExternalIdentityRejected(_) => (
                StatusCode::UNAUTHORIZED,
                "external_identity_rejected",
                "External identity rejected".to_string(),
            ),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

/// Deliver a token as `Authorization: Bearer <token>` on an empty 200.
pub fn bearer_response(token: &str) -> Result<Response, ApiError> {
    let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
        ApiError(Error::Internal(format!("Token is not a valid header value: {}", e)))
    })?;

    let mut response = StatusCode::OK.into_response();
    response.headers_mut().insert(header::AUTHORIZATION, value);
    Ok(response)
}

/// Success callback for an identity provider integration. Not routed by
/// `create_router`: the provider integration calls it once it holds a
/// verified assertion.
pub async fn external_identity_success(
    auth_service: &AuthenticationService,
    assertion: &ExternalAssertion,
) -> Response {
    match auth_service.onboard_external(assertion).await {
        Ok(outcome) => bearer_response(&outcome.token).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

async fn register(
    State(state): State<ApiState>,
    Json(request): Json<AuthRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.auth_service.register(request).await?;
    Ok(Json(response))
}

async fn login(
    State(state): State<ApiState>,
    Json(request): Json<AuthRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.auth_service.authenticate(request).await?;
    Ok(Json(response))
}

async fn logout(State(state): State<ApiState>, headers: HeaderMap) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError(Error::InvalidCredentials))?;
    state.auth_service.logout(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn session(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError(Error::InvalidCredentials))?;
    match state.auth_service.authorize(token).await? {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError(Error::InvalidCredentials)),
    }
}
