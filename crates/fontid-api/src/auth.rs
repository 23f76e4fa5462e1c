use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::info;

use fontid_db::{CredentialStore, UserRow};
use fontid_model::{InferenceBackend, ModelContext, Preprocessor};
use fontid_types::api::{Claims, LoginRequest, LoginResponse, SignupRequest, SignupResponse};
use fontid_types::models::{Account, Plan};

use crate::billing::PaymentGateway;
use crate::error::ApiError;
use crate::middleware::create_token;
use crate::recordings::RecordingLibrary;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: CredentialStore,
    pub models: ModelContext<InferenceBackend>,
    pub preprocessor: Box<dyn Preprocessor>,
    pub gateway: Box<dyn PaymentGateway>,
    pub recordings: RecordingLibrary,
    pub secret_key: String,
}

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    state.store.create_user(&req.username, &req.password)?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            username: req.username,
            message: "Account created successfully! Please log in.".into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    if !state.store.authenticate(&req.username, &req.password) {
        return Err(ApiError::InvalidCredentials);
    }

    let plan = state
        .store
        .get_user(&req.username)?
        .and_then(|row| row.plan)
        .unwrap_or_else(|| Plan::default().to_string());

    let token = create_token(&state.secret_key, &req.username)
        .map_err(|e| ApiError::internal("Token signing failed", e))?;

    info!("User {} logged in", req.username);
    Ok(Json(LoginResponse {
        username: req.username,
        plan,
        token,
    }))
}

pub async fn account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Account>, ApiError> {
    let row = state
        .store
        .get_user(&claims.sub)?
        .ok_or_else(|| ApiError::NotFound(format!("No account named {}", claims.sub)))?;

    Ok(Json(account_from_row(row)?))
}

fn account_from_row(row: UserRow) -> Result<Account, ApiError> {
    let expiry_date = row.expiry_date.as_deref().map(parse_timestamp).transpose()?;

    Ok(Account {
        created_at: parse_timestamp(&row.created_at)?,
        expiry_date,
        plan: row.plan.unwrap_or_else(|| Plan::default().to_string()),
        username: row.username,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ApiError::internal("Unreadable timestamp in users table", e))
}
