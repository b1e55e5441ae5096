use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};

use crate::app::dto::{self, ApiJson};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::CurrentPrincipal;

pub fn router() -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(me))
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::LoginRequest>,
) -> ApiResult {
    let session = services.accounts.login(&body.email, &body.password).await?;
    Ok(dto::ok(session))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<dto::RegisterRequest>,
) -> ApiResult {
    let session = services.accounts.register(body.into()).await?;
    Ok(dto::created(session))
}

pub async fn me(CurrentPrincipal(principal): CurrentPrincipal) -> ApiResult {
    Ok(dto::ok(principal))
}
