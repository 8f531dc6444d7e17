use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::LibrarianError;
use crate::history::HistoryError;
use crate::reconcile::ImportStats;

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightParams {
    pub book_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    #[serde(default)]
    pub new_title: String,
    #[serde(default)]
    pub new_author: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub stats: ImportStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverResponse {
    pub message: String,
    pub cover_url: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(msg: &str) -> Self {
        MessageResponse {
            message: msg.to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn success<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse { data })).into_response()
}

pub fn error_response(status: StatusCode, msg: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

pub fn bad_request(msg: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, msg)
}

pub fn unauthorized() -> Response {
    error_response(StatusCode::UNAUTHORIZED, "Unauthorized")
}

impl IntoResponse for LibrarianError {
    fn into_response(self) -> Response {
        let status = match &self {
            LibrarianError::Persistence(_) | LibrarianError::Cover(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            LibrarianError::Validation(_) => StatusCode::BAD_REQUEST,
            LibrarianError::History(e) => match e {
                HistoryError::BookNotFound(_)
                | HistoryError::HighlightNotFound { .. }
                | HistoryError::EntryNotFound(_) => StatusCode::NOT_FOUND,
                HistoryError::ParentBookMissing { .. } => StatusCode::CONFLICT,
                HistoryError::NotRestorable(_) | HistoryError::Validation(_) => {
                    StatusCode::BAD_REQUEST
                }
            },
        };

        // Storage internals stay in the logs.
        let msg = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => self.to_string(),
        };
        error_response(status, &msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                LibrarianError::History(HistoryError::BookNotFound("b".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                LibrarianError::History(HistoryError::ParentBookMissing {
                    entry_id: "e".into(),
                    book_id: "b".into(),
                }),
                StatusCode::CONFLICT,
            ),
            (
                LibrarianError::History(HistoryError::NotRestorable("e".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                LibrarianError::Persistence(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                LibrarianError::Validation("no".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_rename_request_camel_case() {
        let req: RenameRequest =
            serde_json::from_str(r#"{"newTitle":"T","newAuthor":"A"}"#).unwrap();
        assert_eq!(req.new_title, "T");
        assert_eq!(req.new_author, "A");
    }
}
