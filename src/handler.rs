use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use tracing::info;

use crate::api::{
    CoverResponse, HighlightParams, MessageResponse, QueryParams, RenameRequest, UploadResponse,
    bad_request, error_response, success, unauthorized,
};
use crate::auth::AuthGate;
use crate::history::RenameOutcome;
use crate::librarian::Librarian;

#[derive(Clone)]
pub struct AppState {
    pub librarian: Arc<Librarian>,
    pub auth: AuthGate,
}

struct UploadedFile {
    name: String,
    content_type: String,
    data: Vec<u8>,
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Option<UploadedFile>, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::error!("Failed to read multipart body: {}", e);
                return Err(bad_request("Malformed upload"));
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| mime_guess::from_path(&name).first_or_octet_stream().to_string());

        return match field.bytes().await {
            Ok(bytes) => Ok(Some(UploadedFile {
                name,
                content_type,
                data: bytes.to_vec(),
            })),
            Err(e) => {
                tracing::error!("Failed to read field bytes: {}", e);
                Err(bad_request("Malformed upload"))
            }
        };
    }
}

pub async fn healthcheck() -> impl IntoResponse {
    info!("got healthcheck request");
    success(MessageResponse::new("ok"))
}

pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let file = match read_file_field(&mut multipart).await {
        Ok(Some(file)) => file,
        Ok(None) => return bad_request("No file uploaded"),
        Err(response) => return response,
    };

    let Ok(text) = String::from_utf8(file.data) else {
        return bad_request("Clippings file must be UTF-8 text");
    };

    info!("Processing clippings file: {} ({} bytes)", file.name, text.len());
    match state.librarian.import(&text).await {
        Ok(stats) => success(UploadResponse {
            message: "Upload successful".to_string(),
            stats,
        }),
        Err(e) => e.into_response(),
    }
}

pub async fn list_books(State(state): State<AppState>, Query(qp): Query<QueryParams>) -> Response {
    match state.librarian.list_books(qp.q.as_deref()).await {
        Ok(books) => success(books),
        Err(e) => e.into_response(),
    }
}

pub async fn get_book(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.librarian.get_book(&id).await {
        Ok(Some(book)) => success(book),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Book not found"),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !state.auth.allows(&headers) {
        return unauthorized();
    }

    match state.librarian.delete_book(&id).await {
        Ok(_) => success(MessageResponse::new("Book deleted")),
        Err(e) => e.into_response(),
    }
}

pub async fn rename_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<RenameRequest>,
) -> Response {
    if !state.auth.allows(&headers) {
        return unauthorized();
    }

    match state
        .librarian
        .rename_book(&id, &payload.new_title, &payload.new_author)
        .await
    {
        Ok(RenameOutcome::Renamed(book)) => success(book),
        Ok(RenameOutcome::Unchanged(_)) => success(MessageResponse::new("No changes made")),
        Err(e) => e.into_response(),
    }
}

pub async fn upload_cover(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    if !state.auth.allows(&headers) {
        return unauthorized();
    }

    let file = match read_file_field(&mut multipart).await {
        Ok(Some(file)) => file,
        Ok(None) => return bad_request("No file uploaded"),
        Err(response) => return response,
    };

    let extension = std::path::Path::new(&file.name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("jpg")
        .to_lowercase();

    match state
        .librarian
        .replace_cover(&id, file.data, &file.content_type, &extension)
        .await
    {
        Ok(cover_url) => success(CoverResponse {
            message: "Cover updated".to_string(),
            cover_url,
        }),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_highlight(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<HighlightParams>,
) -> Response {
    if !state.auth.allows(&headers) {
        return unauthorized();
    }

    let Some(book_id) = params.book_id.filter(|b| !b.is_empty()) else {
        return bad_request("Book ID required");
    };

    match state.librarian.delete_highlight(&book_id, &id).await {
        Ok(_) => success(MessageResponse::new("Highlight deleted")),
        Err(e) => e.into_response(),
    }
}

pub async fn list_history(State(state): State<AppState>) -> Response {
    match state.librarian.history().await {
        Ok(history) => success(history),
        Err(e) => e.into_response(),
    }
}

pub async fn restore_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !state.auth.allows(&headers) {
        return unauthorized();
    }

    match state.librarian.restore(&id).await {
        Ok(_) => success(MessageResponse::new("Item restored")),
        Err(e) => e.into_response(),
    }
}
