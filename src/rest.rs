//! REST API layer for DomusEye using Axum.
//!
//! Public routes cover health, account registration and login, property
//! browsing and the AI and media proxies. Everything else sits behind a
//! Bearer JWT checked by `auth_middleware`; handlers then check the
//! caller's role.

mod ai;
mod applications;
mod board;
mod dashboards;
mod media;
mod messaging;
mod properties;
mod users;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{hash_password, verify_password, AuthError, TokenIssuer};
use crate::error::ApiError;
use crate::imagekit::ImageHost;
use crate::llm::LanguageModel;
use crate::models::{PublicUser, Role, User};
use crate::storage::Storage;
use crate::validation;

/// Shared app state for REST handlers.
pub struct AppState {
    pub storage: Arc<Storage>,
    pub tokens: Arc<TokenIssuer>,
    pub model: Arc<dyn LanguageModel>,
    pub images: Arc<dyn ImageHost>,
    pub max_upload_bytes: usize,
}

pub type SharedState = Arc<AppState>;

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_in: u64,
    pub user: PublicUser,
}

/// Generic acknowledgement body.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RestResponse {
    pub success: bool,
    pub message: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        register_handler,
        login_handler,
        properties::search_properties,
        properties::nearby_properties,
        properties::get_property,
        ai::chat_handler,
        ai::completion_handler,
        ai::multi_modal_chat_handler,
        media::imagekit_auth_handler,
        media::upload_handler,
    ),
    components(schemas(
        RestResponse,
        RegisterRequest,
        LoginRequest,
        AuthResponse,
        PublicUser,
        crate::models::Address,
        Role,
        crate::models::Property,
        crate::models::PropertyStatus,
        properties::NearbyProperty,
        ai::ChatRequest,
        ai::CompletionRequest,
        crate::ui_stream::UiMessage,
        crate::ui_stream::UiRole,
        crate::imagekit::AuthParameters,
        media::UploadForm,
        media::UploadResponse,
    )),
    tags((name = "domuseye", description = "DomusEye property management API"))
)]
pub struct ApiDoc;

async fn auth_middleware(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingToken)?;
    let claims = state.tokens.validate(token)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Tags every request with an id and logs method, path, status and latency.
async fn request_tracing(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert("x-request-id", value);
    }

    let span = tracing::info_span!(
        "http.request",
        %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let started = Instant::now();

    let mut response = next.run(req).instrument(span.clone()).await;

    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    span.in_scope(|| {
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), elapsed_ms, "request failed");
        } else {
            tracing::info!(status = status.as_u16(), elapsed_ms, "request handled");
        }
    });
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Create the Axum router with every DomusEye endpoint.
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.max_upload_bytes;
    let state = Arc::new(state);

    let auth_routes = Router::new()
        .route("/users/me", get(users::me_handler).put(users::update_me_handler))
        .route("/users/:uid", get(users::get_user_handler))
        .route("/properties", post(properties::create_property))
        .route("/properties/:id", put(properties::update_property))
        .route("/properties/:id/status", put(properties::set_property_status))
        .route(
            "/properties/:id/applications",
            post(applications::apply_handler).get(applications::list_for_property),
        )
        .route(
            "/properties/:id/applications/:aid/status",
            put(applications::update_status_handler),
        )
        .route("/applications/mine", get(applications::my_applications))
        .route("/properties/:id/tenants", get(properties::list_tenants))
        .route(
            "/properties/:id/community-board",
            post(board::create_post).get(board::list_posts),
        )
        .route(
            "/properties/:id/payments",
            post(board::record_payment).get(board::list_payments),
        )
        .route("/payments/mine", get(board::my_payments))
        .route(
            "/conversations",
            post(messaging::start_conversation).get(messaging::list_conversations),
        )
        .route(
            "/conversations/:id/messages",
            get(messaging::list_messages).post(messaging::send_message),
        )
        .route("/notifications/unread", get(dashboards::unread_handler))
        .route("/notifications/stream", get(dashboards::unread_stream_handler))
        .route("/analytics/agent", get(dashboards::agent_handler))
        .route("/analytics/landlord", get(dashboards::landlord_handler))
        .route("/analytics/admin", get(dashboards::admin_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api_routes = Router::new()
        .route("/api/chat", post(ai::chat_handler))
        .route("/api/completion", post(ai::completion_handler))
        .route("/api/multi-modal-chat", post(ai::multi_modal_chat_handler))
        .route("/api/imagekit-auth", post(media::imagekit_auth_handler))
        .route(
            "/api/upload",
            post(media::upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        );

    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/health", get(health_handler))
        .route("/properties", get(properties::search_properties))
        .route("/properties/nearby", get(properties::nearby_properties))
        .route("/properties/:id", get(properties::get_property))
        .merge(api_routes)
        .merge(auth_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(request_tracing))
        .with_state(state)
}

/// Health check handler
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = RestResponse))
)]
async fn health_handler() -> Json<RestResponse> {
    Json(RestResponse {
        success: true,
        message: "DomusEye API healthy".to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Admin accounts cannot self-register"),
        (status = 409, description = "Email already registered")
    )
)]
async fn register_handler(
    State(state): State<SharedState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let name = validation::required("name", &payload.name)?;
    let email = validation::email(&payload.email)?;
    validation::password(&payload.password)?;
    if payload.role == Role::Admin {
        return Err(ApiError::forbidden("admin accounts cannot self-register"));
    }

    let now = Utc::now();
    let user = User {
        uid: uuid::Uuid::new_v4().to_string(),
        name,
        email,
        phone: payload.phone.filter(|p| !p.trim().is_empty()),
        role: payload.role,
        address: Default::default(),
        profile_picture: None,
        password_hash: hash_password(&payload.password)?,
        created_at: now,
        updated_at: now,
    };
    state.storage.create_user(&user)?;
    tracing::info!(uid = %user.uid, role = %user.role, "user registered");

    let token = state.tokens.issue(&user.uid, user.role)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            expires_in: state.tokens.ttl_secs(),
            user: PublicUser::from(&user),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
async fn login_handler(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    let user = state
        .storage
        .find_user_by_email(&email)?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(&payload.password, &user.password_hash).unwrap_or(false) {
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state.tokens.issue(&user.uid, user.role)?;
    Ok(Json(AuthResponse {
        token,
        expires_in: state.tokens.ttl_secs(),
        user: PublicUser::from(&user),
    }))
}
