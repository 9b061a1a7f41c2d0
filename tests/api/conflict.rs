use serde_json::{json, Value};
use uuid::Uuid;

use crate::helpers::{error_code, spawn_app, TestApp};

fn snapshot(label: &str) -> Value {
    json!({
        "slides": [{
            "id": "slide_1",
            "title": label,
            "themeId": "dark-editorial",
            "rows": [{
                "id": "row_1",
                "blocks": [{ "id": "blk_1", "type": "text", "content": { "text": label } }],
                "widths": [100.0]
            }]
        }]
    })
}

/// Saves `count` snapshots in a row and returns the document id.
async fn document_at_revision(app: &TestApp, token: &str, count: i64) -> String {
    let created = app.create_document(token, false).await;
    let id = created["id"].as_str().unwrap().to_string();
    for revision in 0..count {
        let response = app
            .put_snapshot(
                token,
                &id,
                &json!({ "baseRevision": revision, "data": snapshot(&format!("v{revision}")) }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }
    id
}

#[tokio::test]
async fn stale_write_gets_the_winning_snapshot_back() {
    let app = spawn_app().await;
    let token = app.signed_jwt(Uuid::new_v4());
    let id = document_at_revision(&app, &token, 3).await;

    // Two sessions both loaded revision 3.
    let response = app
        .put_snapshot(&token, &id, &json!({ "baseRevision": 3, "data": snapshot("session A") }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let saved: Value = response.json().await.unwrap();
    assert_eq!(saved["revision"], 4);
    assert!(saved["savedAt"].as_str().is_some());

    let response = app
        .put_snapshot(&token, &id, &json!({ "baseRevision": 3, "data": snapshot("session B") }))
        .await;
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert_eq!(body["error"]["details"]["currentRevision"], 4);
    assert_eq!(body["error"]["details"]["data"], snapshot("session A"));

    let document: Value = app.get_document(&token, &id).await.json().await.unwrap();
    assert_eq!(document["revision"], 4);
    assert_eq!(document["data"], snapshot("session A"));
}

#[tokio::test]
async fn concurrent_writes_on_one_revision_accept_exactly_one() {
    let app = spawn_app().await;
    let token = app.signed_jwt(Uuid::new_v4());
    let id = document_at_revision(&app, &token, 0).await;

    let mut handles = Vec::new();
    for writer in 0..5 {
        let client = app.api_client.clone();
        let url = format!("{}/documents/{}", app.address, id);
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            client
                .put(url)
                .bearer_auth(token)
                .json(&json!({ "baseRevision": 0, "data": snapshot(&format!("writer {writer}")) }))
                .send()
                .await
                .unwrap()
                .status()
                .as_u16()
        }));
    }

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.unwrap());
    }
    statuses.sort();
    assert_eq!(statuses, vec![200, 409, 409, 409, 409]);

    let document: Value = app.get_document(&token, &id).await.json().await.unwrap();
    assert_eq!(document["revision"], 1);
}

#[tokio::test]
async fn negative_base_revision_is_rejected() {
    let app = spawn_app().await;
    let token = app.signed_jwt(Uuid::new_v4());
    let id = document_at_revision(&app, &token, 0).await;

    let response = app
        .put_snapshot(&token, &id, &json!({ "baseRevision": -1, "data": snapshot("x") }))
        .await;
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(error_code(response).await, "VALIDATION_ERROR");

    let response = app
        .put_snapshot(&token, &id, &json!({ "data": snapshot("x") }))
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn writing_a_missing_document_is_not_found() {
    let app = spawn_app().await;
    let token = app.signed_jwt(Uuid::new_v4());
    let response = app
        .put_snapshot(
            &token,
            &Uuid::new_v4().to_string(),
            &json!({ "baseRevision": 0, "data": snapshot("x") }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(error_code(response).await, "NOT_FOUND");
}
