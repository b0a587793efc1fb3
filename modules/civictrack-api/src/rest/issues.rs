use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use civictrack_common::{Category, CivicTrackError, Status, MAX_PHOTOS};
use civictrack_domains::{Flag, Issue, IssueWithDistance, NearbyFilter, NewIssue, StatusLogEntry, Vote};

use crate::auth::require_user;
use crate::rate_limit::{check_rate_limit, prune_empty_entries, MAX_REPORTS_PER_HOUR};
use crate::rest::error_response;
use crate::AppState;

/// Per-photo cap; enforced while reading the multipart stream.
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

// --- Query structs ---

#[derive(Deserialize)]
pub struct NearbyQuery {
    lat: f64,
    lng: f64,
    radius: Option<f64>,
    category: Option<String>,
    status: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct FlagRequest {
    reason: Option<String>,
}

// --- Helpers ---

fn parse_nearby_filter(params: &NearbyQuery) -> Result<NearbyFilter, CivicTrackError> {
    let category: Option<Category> = params.category.as_deref().map(str::parse).transpose()?;
    let status: Option<Status> = params.status.as_deref().map(str::parse).transpose()?;

    Ok(NearbyFilter {
        lat: params.lat,
        lng: params.lng,
        radius_km: params.radius.unwrap_or(5.0).min(50.0),
        category,
        status,
        limit: params.limit.unwrap_or(50).clamp(1, 200),
        offset: params.offset.unwrap_or(0).max(0),
    })
}

pub fn issues_to_geojson(issues: &[IssueWithDistance]) -> serde_json::Value {
    let features: Vec<serde_json::Value> = issues
        .iter()
        .map(|issue| {
            serde_json::json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [issue.longitude, issue.latitude]
                },
                "properties": {
                    "id": issue.id.to_string(),
                    "title": issue.title,
                    "category": issue.category,
                    "status": issue.status,
                    "report_count": issue.report_count,
                    "distance_km": issue.distance_km,
                    "created_at": issue.created_at.to_rfc3339(),
                }
            })
        })
        .collect();

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn photo_extension(content_type: Option<&str>) -> Result<&'static str, CivicTrackError> {
    match content_type {
        Some("image/jpeg") => Ok("jpg"),
        Some("image/png") => Ok("png"),
        Some("image/webp") => Ok("webp"),
        other => Err(CivicTrackError::Validation(format!(
            "Unsupported photo type: {}",
            other.unwrap_or("unknown")
        ))),
    }
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, CivicTrackError> {
    field
        .text()
        .await
        .map_err(|e| CivicTrackError::Validation(format!("Malformed field: {e}")))
}

// --- Handlers ---

pub async fn api_create_issue(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let user = match require_user(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return error_response(e),
    };
    if user.is_banned {
        return error_response(CivicTrackError::Forbidden(
            "Banned users may not create issues".into(),
        ));
    }

    // Rate limit: 10 reports per hour per IP
    {
        let mut limiter = state.rate_limiter.lock().await;
        // Periodically prune empty entries to prevent unbounded HashMap growth
        if limiter.len() > 1000 {
            prune_empty_entries(&mut limiter);
        }
        let entries = limiter.entry(addr.ip()).or_default();
        if !check_rate_limit(entries, Instant::now(), MAX_REPORTS_PER_HOUR) {
            return error_response(CivicTrackError::RateLimited);
        }
    }

    match create_issue_from_multipart(&state, user.id, multipart).await {
        Ok(issue) => (StatusCode::CREATED, Json(issue)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_issue_from_multipart(
    state: &AppState,
    reporter_id: Uuid,
    mut multipart: Multipart,
) -> Result<Issue, CivicTrackError> {
    let mut title = None;
    let mut description = None;
    let mut category = None;
    let mut latitude = None;
    let mut longitude = None;
    let mut address = None;
    let mut photos: Vec<(&'static str, axum::body::Bytes)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CivicTrackError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = Some(read_text(field).await?),
            "description" => description = Some(read_text(field).await?),
            "category" => category = Some(read_text(field).await?.parse::<Category>()?),
            "latitude" => {
                latitude = Some(read_text(field).await?.trim().parse::<f64>().map_err(|_| {
                    CivicTrackError::Validation("latitude must be a number".into())
                })?)
            }
            "longitude" => {
                longitude = Some(read_text(field).await?.trim().parse::<f64>().map_err(|_| {
                    CivicTrackError::Validation("longitude must be a number".into())
                })?)
            }
            "address" => address = Some(read_text(field).await?),
            "photos" => {
                if photos.len() >= MAX_PHOTOS {
                    return Err(CivicTrackError::Validation(format!(
                        "At most {MAX_PHOTOS} photos per issue"
                    )));
                }
                let ext = photo_extension(field.content_type())?;
                let data = field.bytes().await.map_err(|e| {
                    CivicTrackError::Validation(format!("Failed to read photo: {e}"))
                })?;
                if data.len() > MAX_PHOTO_BYTES {
                    return Err(CivicTrackError::Validation("Photo exceeds the 5 MB limit".into()));
                }
                photos.push((ext, data));
            }
            // Unknown fields are ignored
            _ => {}
        }
    }

    let title = title.ok_or_else(|| CivicTrackError::Validation("Title is required".into()))?;
    let description =
        description.ok_or_else(|| CivicTrackError::Validation("Description is required".into()))?;
    let category =
        category.ok_or_else(|| CivicTrackError::Validation("Category is required".into()))?;
    let latitude =
        latitude.ok_or_else(|| CivicTrackError::Validation("Latitude is required".into()))?;
    let longitude =
        longitude.ok_or_else(|| CivicTrackError::Validation("Longitude is required".into()))?;

    // All fields validated; only now touch disk.
    let mut stored = Vec::with_capacity(photos.len());
    for (ext, data) in photos {
        let filename = format!("{}.{ext}", Uuid::new_v4());
        tokio::fs::write(state.upload_dir.join(&filename), &data)
            .await
            .map_err(|e| CivicTrackError::Other(anyhow::anyhow!("Failed to store photo: {e}")))?;
        stored.push(filename);
    }

    Issue::create(
        NewIssue {
            title,
            description,
            category,
            latitude,
            longitude,
            address,
            photos: stored,
            reporter_id: Some(reporter_id),
        },
        &state.pool,
    )
    .await
}

pub async fn api_issues_nearby(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyQuery>,
) -> Response {
    let filter = match parse_nearby_filter(&params) {
        Ok(f) => f,
        Err(e) => return error_response(e),
    };

    match Issue::find_nearby(&filter, &state.pool).await {
        Ok(issues) => Json(serde_json::json!({ "issues": issues })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_issues_map(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearbyQuery>,
) -> Response {
    let filter = match parse_nearby_filter(&params) {
        Ok(f) => f,
        Err(e) => return error_response(e),
    };

    match Issue::find_nearby(&filter, &state.pool).await {
        Ok(issues) => Json(issues_to_geojson(&issues)).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_issue_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match Issue::find_by_id(id, &state.pool).await {
        Ok(Some(issue)) if !issue.hidden => Json(issue).into_response(),
        Ok(_) => error_response(CivicTrackError::NotFound(format!("Issue {id}"))),
        Err(e) => error_response(e),
    }
}

pub async fn api_issue_status_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match Issue::find_by_id(id, &state.pool).await {
        Ok(Some(issue)) if !issue.hidden => {
            match StatusLogEntry::find_for_issue(issue.id, &state.pool).await {
                Ok(logs) => Json(serde_json::json!({ "status_logs": logs })).into_response(),
                Err(e) => error_response(e),
            }
        }
        Ok(_) => error_response(CivicTrackError::NotFound(format!("Issue {id}"))),
        Err(e) => error_response(e),
    }
}

pub async fn api_flag_issue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let user = match require_user(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return error_response(e),
    };

    // The body is optional; a reason only arrives as JSON.
    let reason = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice::<FlagRequest>(&body) {
            Ok(req) => req.reason,
            Err(e) => {
                return error_response(CivicTrackError::Validation(format!(
                    "Malformed JSON body: {e}"
                )))
            }
        }
    };

    match Flag::create(id, user.id, reason.as_deref(), &state.pool).await {
        Ok(issue) => Json(serde_json::json!({
            "flag_count": issue.flag_count,
            "hidden": issue.hidden,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn api_vote_issue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let user = match require_user(&state, &headers).await {
        Ok(u) => u,
        Err(e) => return error_response(e),
    };

    match Vote::create(id, user.id, &state.pool).await {
        Ok(issue) => Json(serde_json::json!({
            "report_count": issue.report_count,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(lat: f64, lng: f64) -> NearbyQuery {
        NearbyQuery {
            lat,
            lng,
            radius: None,
            category: None,
            status: None,
            limit: None,
            offset: None,
        }
    }

    #[test]
    fn nearby_filter_defaults_and_caps() {
        let mut params = query(37.7749, -122.4194);
        let filter = parse_nearby_filter(&params).unwrap();
        assert_eq!(filter.radius_km, 5.0);
        assert_eq!(filter.limit, 50);
        assert_eq!(filter.offset, 0);

        params.radius = Some(500.0);
        params.limit = Some(100_000);
        let filter = parse_nearby_filter(&params).unwrap();
        assert_eq!(filter.radius_km, 50.0);
        assert_eq!(filter.limit, 200);
    }

    #[test]
    fn nearby_filter_rejects_unknown_category() {
        let mut params = query(37.7749, -122.4194);
        params.category = Some("graffiti".to_string());
        assert!(parse_nearby_filter(&params).is_err());
    }

    #[test]
    fn nearby_filter_parses_filters() {
        let mut params = query(37.7749, -122.4194);
        params.category = Some("roads".to_string());
        params.status = Some("in_progress".to_string());
        let filter = parse_nearby_filter(&params).unwrap();
        assert_eq!(filter.category, Some(Category::Roads));
        assert_eq!(filter.status, Some(Status::InProgress));
    }

    #[test]
    fn photo_extension_allowlist() {
        assert_eq!(photo_extension(Some("image/jpeg")).unwrap(), "jpg");
        assert_eq!(photo_extension(Some("image/png")).unwrap(), "png");
        assert_eq!(photo_extension(Some("image/webp")).unwrap(), "webp");
        assert!(photo_extension(Some("application/pdf")).is_err());
        assert!(photo_extension(None).is_err());
    }

    #[test]
    fn geojson_feature_collection_shape() {
        let issues = vec![];
        let geojson = issues_to_geojson(&issues);
        assert_eq!(geojson["type"], "FeatureCollection");
        assert!(geojson["features"].as_array().unwrap().is_empty());
    }
}
