use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use civictrack_common::Status;
use civictrack_domains::{Issue, IssueStats, User, ValueCount};

use crate::auth::require_admin;
use crate::rest::error_response;
use crate::AppState;

#[derive(Deserialize)]
pub struct SetStatusRequest {
    status: String,
    notes: Option<String>,
}

fn counts_to_map(counts: &[ValueCount]) -> serde_json::Map<String, serde_json::Value> {
    counts
        .iter()
        .map(|c| (c.value.clone(), serde_json::json!(c.count)))
        .collect()
}

pub async fn api_flagged_issues(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(e) = require_admin(&state, &headers).await {
        return error_response(e);
    }

    match Issue::find_flagged(&state.pool).await {
        Ok(issues) => Json(serde_json::json!({ "issues": issues })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_analytics(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(e) = require_admin(&state, &headers).await {
        return error_response(e);
    }

    match IssueStats::compute(&state.pool).await {
        Ok(stats) => Json(serde_json::json!({
            "total_issues": stats.total_issues,
            "issues_by_category": counts_to_map(&stats.issues_by_category),
            "issues_by_status": counts_to_map(&stats.issues_by_status),
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<SetStatusRequest>,
) -> Response {
    let admin = match require_admin(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return error_response(e),
    };

    let status = match body.status.parse::<Status>() {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };

    match Issue::set_status(id, status, Some(admin.id), body.notes.as_deref(), &state.pool).await {
        Ok(issue) => Json(issue).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_hide_issue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    if let Err(e) = require_admin(&state, &headers).await {
        return error_response(e);
    }

    match Issue::hide(id, &state.pool).await {
        Ok(()) => Json(serde_json::json!({ "hidden": true })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_ban_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    if let Err(e) = require_admin(&state, &headers).await {
        return error_response(e);
    }

    match User::set_banned(id, true, &state.pool).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_unban_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    if let Err(e) = require_admin(&state, &headers).await {
        return error_response(e);
    }

    match User::set_banned(id, false, &state.pool).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => error_response(e),
    }
}
