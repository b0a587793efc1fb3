pub mod admin;
pub mod issues;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tracing::warn;

use civictrack_common::CivicTrackError;

/// Map the error taxonomy onto HTTP. Store failures are opaque 500s; the
/// details go to the log, not the caller.
pub fn error_response(err: CivicTrackError) -> Response {
    let (status, message) = match &err {
        CivicTrackError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
        CivicTrackError::Conflict(m) => (StatusCode::BAD_REQUEST, m.clone()),
        CivicTrackError::Unauthenticated => (
            StatusCode::UNAUTHORIZED,
            "Authentication required".to_string(),
        ),
        CivicTrackError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
        CivicTrackError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
        CivicTrackError::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded: max 10 reports per hour".to_string(),
        ),
        CivicTrackError::Database(e) => {
            warn!(error = %e, "Database failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
        }
        CivicTrackError::Other(e) => {
            warn!(error = %e, "Unexpected failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
        }
    };

    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_status_codes() {
        let cases = [
            (CivicTrackError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CivicTrackError::Conflict("dup".into()), StatusCode::BAD_REQUEST),
            (CivicTrackError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (CivicTrackError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (CivicTrackError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (CivicTrackError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
        ];
        for (err, expected) in cases {
            assert_eq!(error_response(err).status(), expected);
        }
    }
}
