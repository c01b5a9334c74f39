//! HTTP-level tests for categories, genres and cast members: CRUD, validation, soft delete.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, id_of, sorted, TestApp};
use serde_json::{json, Value};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_category_applies_defaults() {
    let app = TestApp::new();
    let category = app.create("categories", json!({ "name": "Documentary" })).await;

    assert_eq!(category["name"], "Documentary");
    assert_eq!(category["description"], Value::Null);
    assert_eq!(category["is_active"], true);
    assert_eq!(category["deleted_at"], Value::Null);
    assert_eq!(id_of(&category).len(), 36);
    assert!(category["created_at"].is_string());
}

#[tokio::test]
async fn create_category_reports_every_violation() {
    let app = TestApp::new();
    let response = app
        .post_json("/api/categories", json!({ "is_active": "maybe" }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "validation_error");
    assert_eq!(json["error"]["details"]["name"][0], "name is required");
    assert!(json["error"]["details"]["is_active"].is_array());
    assert_eq!(app.count("categories").await, 0);
}

#[tokio::test]
async fn create_category_rejects_long_name() {
    let app = TestApp::new();
    let response = app
        .post_json("/api/categories", json!({ "name": "a".repeat(256) }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(
        json["error"]["details"]["name"][0],
        "name must be at most 255 characters"
    );
}

#[tokio::test]
async fn update_category_description_to_empty_or_null_stores_null() {
    let app = TestApp::new();
    let category = app
        .create("categories", json!({ "name": "Kids", "description": "For children" }))
        .await;
    let uri = format!("/api/categories/{}", id_of(&category));

    let response = app
        .json(Method::PUT, &uri, json!({ "name": "Kids", "description": "" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["description"], Value::Null);

    app.json(Method::PATCH, &uri, json!({ "description": "again" })).await;
    let response = app
        .json(Method::PATCH, &uri, json!({ "description": null }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await;
    assert_eq!(data["description"], Value::Null);
    assert_eq!(data["name"], "Kids");
}

#[tokio::test]
async fn put_validates_full_rule_set_patch_does_not() {
    let app = TestApp::new();
    let category = app.create("categories", json!({ "name": "Horror" })).await;
    let uri = format!("/api/categories/{}", id_of(&category));

    let response = app.json(Method::PUT, &uri, json!({ "is_active": false })).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app.json(Method::PATCH, &uri, json!({ "is_active": false })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await;
    assert_eq!(data["is_active"], false);
    assert_eq!(data["name"], "Horror");
}

#[tokio::test]
async fn list_returns_array_in_creation_order() {
    let app = TestApp::new();
    app.create_category("First").await;
    app.create_category("Second").await;

    let response = app.get("/api/categories").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(json[0]["name"], "First");
    assert_eq!(json[1]["name"], "Second");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_are_all_persisted() {
    let app = TestApp::new();
    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let router = app.router.clone();
            tokio::spawn(async move {
                let request = axum::http::Request::builder()
                    .method(Method::POST)
                    .uri("/api/categories")
                    .header(axum::http::header::CONTENT_TYPE, "application/json")
                    .body(axum::body::Body::from(
                        json!({ "name": format!("Category {}", i) }).to_string(),
                    ))
                    .unwrap();
                router.oneshot(request).await.unwrap().status()
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::CREATED);
    }
    assert_eq!(app.count("categories").await, 20);
}

// ---------------------------------------------------------------------------
// Soft delete and restore
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deleted_record_is_hidden_but_retrievable_and_restorable() {
    let app = TestApp::new();
    let category = app
        .create("categories", json!({ "name": "Anime", "description": "Japanese animation" }))
        .await;
    let id = id_of(&category);
    let uri = format!("/api/categories/{}", id);

    let response = app.delete(&uri).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.count("categories").await, 0);
    assert_eq!(app.delete(&uri).await.status(), StatusCode::NOT_FOUND);

    let response = app.get(&format!("{}?with_trashed", uri)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["deleted_at"].is_string());

    let json = body_json(app.get("/api/categories?only_trashed=1").await).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["id"], id.as_str());

    let response = app
        .send(
            axum::http::Request::builder()
                .method(Method::POST)
                .uri(format!("{}/restore", uri))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let restored = body_json(response).await;
    assert_eq!(restored["description"], "Japanese animation");
    assert_eq!(restored["deleted_at"], Value::Null);
    assert_eq!(app.get(&uri).await.status(), StatusCode::OK);
    assert_eq!(app.count("categories").await, 1);
}

#[tokio::test]
async fn updating_a_deleted_record_is_not_found() {
    let app = TestApp::new();
    let id = app.create_category("Gone").await;
    let uri = format!("/api/categories/{}", id);
    app.delete(&uri).await;
    let response = app.json(Method::PATCH, &uri, json!({ "name": "Back" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn restoring_a_live_record_is_not_found() {
    let app = TestApp::new();
    let id = app.create_category("Live").await;
    let response = app
        .json(Method::POST, &format!("/api/categories/{}/restore", id), json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Routing errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_resource_and_malformed_id() {
    let app = TestApp::new();
    let response = app.get("/api/genders").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "not_found");

    let response = app.get("/api/categories/not-a-uuid").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .get("/api/categories/6f1c3c4e-4b8a-4c1e-9d55-1c2b3a4d5e6f")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = TestApp::new();
    let response = app
        .send(
            axum::http::Request::builder()
                .method(Method::POST)
                .uri("/api/categories")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from("{\"name\":"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_and_ready() {
    let app = TestApp::new();
    assert_eq!(app.get("/health").await.status(), StatusCode::OK);
    let json = body_json(app.get("/ready").await).await;
    assert_eq!(json["status"], "ok");
    let json = body_json(app.get("/version").await).await;
    assert_eq!(json["name"], "media-catalog");
}

// ---------------------------------------------------------------------------
// Cast members
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cast_member_type_must_be_director_or_actor() {
    let app = TestApp::new();
    let member = app
        .create("cast_members", json!({ "name": "Agnès Varda", "type": 1 }))
        .await;
    assert_eq!(member["type"], 1);

    let response = app
        .post_json("/api/cast_members", json!({ "name": "Nobody", "type": 3 }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(response).await["error"]["details"]["type"].is_array());

    let response = app
        .post_json("/api/cast_members", json!({ "name": "No type" }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// Genres
// ---------------------------------------------------------------------------

#[tokio::test]
async fn genre_categories_are_optional_and_replaced_on_update() {
    let app = TestApp::new();
    let genre = app.create("genres", json!({ "name": "Thriller" })).await;
    let genre_id = id_of(&genre);
    assert!(app.members("genres", "categories_id", &genre_id).await.is_empty());

    let a = app.create_category("A").await;
    let b = app.create_category("B").await;
    let c = app.create_category("C").await;
    let uri = format!("/api/genres/{}", genre_id);

    let response = app
        .json(Method::PATCH, &uri, json!({ "categories_id": [a, b] }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        app.members("genres", "categories_id", &genre_id).await,
        sorted(vec![a.clone(), b.clone()])
    );

    let response = app
        .json(Method::PATCH, &uri, json!({ "categories_id": [b, c] }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        app.members("genres", "categories_id", &genre_id).await,
        sorted(vec![b.clone(), c.clone()])
    );

    // Omitting the field leaves membership alone.
    app.json(Method::PATCH, &uri, json!({ "name": "Suspense" })).await;
    assert_eq!(app.members("genres", "categories_id", &genre_id).await.len(), 2);
}

#[tokio::test]
async fn genre_with_deleted_category_is_rejected() {
    let app = TestApp::new();
    let category = app.create_category("Old").await;
    app.delete(&format!("/api/categories/{}", category)).await;

    let response = app
        .post_json("/api/genres", json!({ "name": "Noir", "categories_id": [category] }))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(response).await["error"]["details"]["categories_id"].is_array());
    assert_eq!(app.count("genres").await, 0);
}

#[tokio::test]
async fn membership_survives_soft_delete_of_related_record() {
    let app = TestApp::new();
    let category = app.create_category("Kept").await;
    let genre = app
        .create("genres", json!({ "name": "Drama", "categories_id": [category] }))
        .await;
    app.delete(&format!("/api/categories/{}", category)).await;
    assert_eq!(
        app.members("genres", "categories_id", &id_of(&genre)).await,
        vec![category]
    );
}
