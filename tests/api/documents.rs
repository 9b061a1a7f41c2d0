use serde_json::{json, Value};
use uuid::Uuid;

use crate::helpers::{error_code, spawn_app};

#[tokio::test]
async fn created_document_starts_at_revision_zero_with_one_slide() {
    let app = spawn_app().await;
    let token = app.signed_jwt(Uuid::new_v4());

    let response = app
        .post_document(&token, &json!({ "title": "Launch plan", "description": "Q3" }))
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Document created");
    assert_eq!(body["data"]["title"], "Launch plan");
    assert_eq!(body["data"]["isPublic"], false);

    let id = body["data"]["id"].as_str().unwrap();
    let response = app.get_document(&token, id).await;
    assert_eq!(response.status().as_u16(), 200);
    let document: Value = response.json().await.unwrap();
    assert_eq!(document["revision"], 0);
    assert_eq!(document["description"], "Q3");

    let slides = document["data"]["slides"].as_array().unwrap();
    assert_eq!(slides.len(), 1);
    assert_eq!(slides[0]["title"], "Slide 1");
    assert_eq!(slides[0]["themeId"], "dark-editorial");
    assert_eq!(slides[0]["rows"][0]["widths"], json!([100.0]));
    assert_eq!(slides[0]["rows"][0]["blocks"][0]["type"], "text");
}

#[tokio::test]
async fn blank_title_is_a_validation_error() {
    let app = spawn_app().await;
    let token = app.signed_jwt(Uuid::new_v4());
    let response = app.post_document(&token, &json!({ "title": "   " })).await;
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(error_code(response).await, "VALIDATION_ERROR");

    let response = app.post_document(&token, &json!({ "name": "x" })).await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn missing_document_is_not_found() {
    let app = spawn_app().await;
    let token = app.signed_jwt(Uuid::new_v4());
    let response = app.get_document(&token, &Uuid::new_v4().to_string()).await;
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(error_code(response).await, "NOT_FOUND");

    let response = app.get_document(&token, "not-a-uuid").await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn private_documents_are_forbidden_to_other_users() {
    let app = spawn_app().await;
    let owner = app.signed_jwt(Uuid::new_v4());
    let stranger = app.signed_jwt(Uuid::new_v4());

    let private = app.create_document(&owner, false).await;
    let response = app
        .get_document(&stranger, private["id"].as_str().unwrap())
        .await;
    assert_eq!(response.status().as_u16(), 403);
    assert_eq!(error_code(response).await, "FORBIDDEN");

    let public = app.create_document(&owner, true).await;
    let response = app
        .get_document(&stranger, public["id"].as_str().unwrap())
        .await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn readers_of_public_documents_still_cannot_write() {
    let app = spawn_app().await;
    let owner = app.signed_jwt(Uuid::new_v4());
    let stranger = app.signed_jwt(Uuid::new_v4());
    let public = app.create_document(&owner, true).await;
    let id = public["id"].as_str().unwrap();

    let response = app
        .put_snapshot(&stranger, id, &json!({ "baseRevision": 0, "data": { "slides": [] } }))
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let document: Value = app.get_document(&owner, id).await.json().await.unwrap();
    assert_eq!(document["revision"], 0);
}

#[tokio::test]
async fn public_link_serves_the_document_without_a_token() {
    let app = spawn_app().await;
    let owner = app.signed_jwt(Uuid::new_v4());

    let public = app.create_document(&owner, true).await;
    let public_token = public["publicToken"].as_str().unwrap();
    let response = app.get_public(public_token).await;
    assert_eq!(response.status().as_u16(), 200);
    let document: Value = response.json().await.unwrap();
    assert_eq!(document["id"], public["id"]);
    assert_eq!(document["revision"], 0);

    let private = app.create_document(&owner, false).await;
    assert!(private["publicToken"].is_null());

    let response = app.get_public("definitely-not-issued").await;
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(error_code(response).await, "NOT_FOUND");
}
