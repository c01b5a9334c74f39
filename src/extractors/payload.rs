//! Write payload from either a JSON object or a multipart form.

use crate::error::AppError;
use crate::storage::UploadedFile;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde_json::{Map, Value};

/// Attributes and uploaded files of a create or update request.
///
/// Multipart text fields named `field[]`, or repeated, are collected into arrays so id lists
/// such as `categories_id[]` arrive the same way as in JSON.
#[derive(Clone, Debug, Default)]
pub struct WritePayload {
    pub attributes: Map<String, Value>,
    pub files: Vec<UploadedFile>,
}

#[async_trait]
impl<S> FromRequest<S> for WritePayload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"))
            .unwrap_or(false);

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return from_multipart(multipart).await;
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(WritePayload::default());
        }
        match serde_json::from_slice(&bytes) {
            Ok(Value::Object(attributes)) => Ok(WritePayload {
                attributes,
                files: Vec::new(),
            }),
            Ok(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
            Err(e) => Err(AppError::BadRequest(format!("invalid JSON body: {}", e))),
        }
    }
}

async fn from_multipart(mut multipart: Multipart) -> Result<WritePayload, AppError> {
    let mut payload = WritePayload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name.is_empty() {
            continue;
        }
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            // Browsers send an empty part for an untouched file input.
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }
            payload.files.push(UploadedFile {
                field: name,
                file_name: Some(file_name),
                content_type,
                bytes,
            });
            continue;
        }
        let text = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        push_text(&mut payload.attributes, &name, text);
    }
    Ok(payload)
}

fn push_text(attributes: &mut Map<String, Value>, name: &str, text: String) {
    let (key, is_list) = match name.strip_suffix("[]") {
        Some(key) => (key, true),
        None => (name, false),
    };
    let value = Value::String(text);
    match attributes.get_mut(key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None if is_list => {
            attributes.insert(key.to_string(), Value::Array(vec![value]));
        }
        None => {
            attributes.insert(key.to_string(), value);
        }
    }
}
