use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header::USER_AGENT, HeaderMap},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use devdeck_core::{
    domain::{ClientInfo, Document, Resource, ResourceInput, UserSession},
    errors::Error,
    formatting, ops,
};

use crate::{errors::ApiError, AppState};

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    code: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    #[serde(default)]
    user: String,
    #[serde(default)]
    pass: String,
}

#[derive(Debug, serde::Serialize)]
pub struct LiveDrop {
    cc: String,
}

/// Client IP from the proxy header (first hop) and the user agent.
fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let ip = header("x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .or_else(|| header("x-real-ip"));
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    ClientInfo { ip, user_agent }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<UserSession> {
    let Json(req) = payload?;
    let client = client_info(&headers);
    let code = req.code.trim().to_string();

    let result = state
        .store
        .apply(|doc| ops::login_by_code(doc, &code, Utc::now(), &client))
        .await;

    match result {
        Ok((session, event)) => {
            info!(user_id = %session.user_id, credits = session.credits, "user login");
            state.notifier.notify_event(event);
            Ok(Json(session))
        }
        Err(Error::UserNotFound) => {
            warn!(ip = ?client.ip, "login with unknown access code");
            state
                .notifier
                .notify(formatting::failed_login(&code, &client));
            Err(ApiError::from(Error::UserNotFound).with_key("error"))
        }
        Err(e) => Err(ApiError::from(e).with_key("error")),
    }
}

/// Whole document, unauthenticated.
pub async fn data(State(state): State<Arc<AppState>>) -> ApiResult<Document> {
    let doc = state.store.read().await?;
    Ok(Json(doc))
}

pub async fn live_drop(State(state): State<Arc<AppState>>) -> ApiResult<LiveDrop> {
    let doc = state.store.read().await?;
    let cc = ops::draw_live_drop(&doc, &mut rand::thread_rng())?;
    Ok(Json(LiveDrop { cc }))
}

pub async fn upsert_resource(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ResourceInput>, JsonRejection>,
) -> ApiResult<Resource> {
    let Json(input) = payload?;
    let (resource, event) = state
        .store
        .apply(|doc| ops::upsert_resource(doc, input))
        .await?;
    info!(id = resource.id, title = %resource.title, "resource saved");
    state.notifier.notify_event(event);
    Ok(Json(resource))
}

pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Value> {
    let Path(id) = path?;
    let (removed, event) = state
        .store
        .apply(|doc| ops::delete_resource(doc, id))
        .await?;
    info!(id = removed.id, title = %removed.title, "resource deleted");
    state.notifier.notify_event(event);
    Ok(Json(json!({ "message": "Deleted" })))
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Map<String, Value>> {
    let Json(body) = payload?;
    let Value::Object(patch) = body else {
        return Err(ApiError::validation("settings patch must be a JSON object"));
    };

    let keys = patch.keys().cloned().collect::<Vec<_>>();
    let (settings, event) = state
        .store
        .apply(|doc| ops::merge_settings(doc, patch))
        .await?;
    info!(?keys, "settings updated");
    state.notifier.notify_event(event);
    Ok(Json(settings))
}

pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<AdminLoginRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(req) = payload?;
    let client = client_info(&headers);

    let result = state
        .store
        .apply(|doc| ops::admin_login(doc, &state.admin, &req.user, &req.pass, &client))
        .await;

    match result {
        Ok(((), event)) => {
            info!(user = %req.user, "admin login");
            state.notifier.notify_event(event);
            Ok(Json(json!({ "message": "Admin login successful" })))
        }
        Err(Error::InvalidCredentials) => {
            warn!(user = %req.user, ip = ?client.ip, "failed admin login");
            state
                .notifier
                .notify(formatting::failed_admin_login(&req.user, &client));
            Err(Error::InvalidCredentials.into())
        }
        Err(e) => Err(e.into()),
    }
}
