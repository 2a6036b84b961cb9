//! Media proxies: browser upload signatures and server-side uploads.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use super::SharedState;
use crate::imagekit::UploadFile;

pub const DEFAULT_FOLDER: &str = "/";

/// Fields of the `/api/upload` multipart form.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub file_name: Option<String>,
    pub folder: Option<String>,
    /// Filename the browser sent with the `file` part.
    #[serde(skip)]
    pub original_name: Option<String>,
    #[serde(skip)]
    pub content_type: Option<String>,
}

impl UploadForm {
    async fn read(multipart: &mut Multipart) -> Result<Self, MultipartError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    form.original_name = field.file_name().map(str::to_owned);
                    form.content_type = field.content_type().map(str::to_owned);
                    form.file = field.bytes().await?.to_vec();
                }
                "fileName" => form.file_name = Some(field.text().await?),
                "folder" => form.folder = Some(field.text().await?),
                _ => {}
            }
        }
        Ok(form)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub file_id: String,
    pub name: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[utoipa::path(
    post,
    path = "/api/imagekit-auth",
    responses(
        (status = 200, description = "Signature for a direct browser upload", body = crate::imagekit::AuthParameters),
        (status = 500, description = "Failed to generate authentication parameters")
    )
)]
pub(super) async fn imagekit_auth_handler(State(state): State<SharedState>) -> Response {
    match state.images.authentication_parameters() {
        Ok(params) => Json(params).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "upload signature failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate authentication parameters",
            )
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Stored on the media host", body = UploadResponse),
        (status = 400, description = "No file provided"),
        (status = 413, description = "File exceeds the upload limit"),
        (status = 500, description = "Upload failed")
    )
)]
pub(super) async fn upload_handler(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Response {
    let form = match UploadForm::read(&mut multipart).await {
        Ok(form) => form,
        Err(err) => {
            let status = err.status();
            tracing::warn!(error = %err, %status, "upload form rejected");
            let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
                "File too large"
            } else {
                "Malformed multipart body"
            };
            return error_response(status, message);
        }
    };

    if form.file.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No file provided");
    }

    let file_name = form
        .file_name
        .filter(|n| !n.trim().is_empty())
        .or(form.original_name)
        .unwrap_or_else(|| "upload".to_string());
    let upload = UploadFile {
        bytes: form.file,
        file_name,
        folder: form
            .folder
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FOLDER.to_string()),
        content_type: form.content_type,
    };

    match state.images.upload(upload).await {
        Ok(image) => {
            tracing::info!(file_id = %image.file_id, "image uploaded");
            Json(UploadResponse {
                success: true,
                url: image.url,
                file_id: image.file_id,
                name: image.name,
            })
            .into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "image upload failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Upload failed")
        }
    }
}
