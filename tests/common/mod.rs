#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use media_catalog::config::{builtin, resolve, ResolvedRelation, DEFAULT_VIDEO_MAX_KB};
use media_catalog::{build_router, AppState, EntityStore, LocalFileStorage, MemoryStore, UuidV4Assigner};

pub const MULTIPART_BOUNDARY: &str = "catalog-test-boundary";

/// Router over an in-memory store with uploads going to a temporary directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: MemoryStore,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_video_max_kb(DEFAULT_VIDEO_MAX_KB)
    }

    pub fn with_video_max_kb(video_max_kb: u64) -> Self {
        let upload_dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let model = resolve(&builtin(video_max_kb), "catalog").unwrap();
        let state = AppState {
            store: Arc::new(store.clone()),
            model: Arc::new(model),
            files: Arc::new(LocalFileStorage::new(upload_dir.path())),
            ids: Arc::new(UuidV4Assigner),
        };
        let router = build_router(state.clone(), 16 * 1024 * 1024);
        TestApp {
            router,
            state,
            store,
            upload_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value) -> Response {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response {
        self.json(Method::POST, uri, body).await
    }

    pub async fn multipart(&self, method: Method, uri: &str, parts: &[Part<'_>]) -> Response {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(
                    CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
                )
                .body(Body::from(multipart_body(parts)))
                .unwrap(),
        )
        .await
    }

    /// POST and return the created record, asserting 201.
    pub async fn create(&self, resource: &str, body: Value) -> Value {
        let response = self.post_json(&format!("/api/{}", resource), body).await;
        let status = response.status();
        let json = body_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "create {} failed: {}", resource, json);
        json
    }

    pub async fn create_category(&self, name: &str) -> String {
        id_of(&self.create("categories", json!({ "name": name })).await)
    }

    pub async fn create_genre(&self, name: &str) -> String {
        id_of(&self.create("genres", json!({ "name": name })).await)
    }

    pub async fn count(&self, resource: &str) -> u64 {
        let json = body_json(self.get(&format!("/api/{}", resource)).await).await;
        json.as_array().unwrap().len() as u64
    }

    /// Current pivot membership of `owner` for the relation written through `field`.
    pub async fn members(&self, resource: &str, field: &str, owner: &str) -> Vec<String> {
        let relation = self.relation(resource, field);
        let mut tx = self.store.begin().await.unwrap();
        let mut ids: Vec<String> = tx
            .related_ids(&relation, Uuid::parse_str(owner).unwrap())
            .await
            .unwrap()
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        ids.sort();
        ids
    }

    pub fn relation(&self, resource: &str, field: &str) -> ResolvedRelation {
        self.state
            .model
            .entity_by_path(resource)
            .unwrap()
            .relations
            .iter()
            .find(|r| r.field == field)
            .unwrap()
            .clone()
    }
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

/// Response body as JSON; `Null` for empty bodies.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

pub fn id_of(record: &Value) -> String {
    record["id"].as_str().unwrap().to_string()
}

pub fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}
