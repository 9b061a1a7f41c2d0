use uuid::Uuid;

use crate::helpers::{error_code, spawn_app};

#[tokio::test]
async fn missing_token_is_rejected() {
    let app = spawn_app().await;
    let response = app
        .api_client
        .get(format!("{}/documents/{}", app.address, Uuid::new_v4()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(error_code(response).await, "UNAUTHORIZED");
}

#[tokio::test]
async fn token_signed_with_another_key_is_rejected() {
    let app = spawn_app().await;
    let forged = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &serde_json::json!({
            "exp": 4_102_444_800u64,
            "user_id": Uuid::new_v4().to_string(),
            "username": "mallory"
        }),
        &jsonwebtoken::EncodingKey::from_secret(b"some other key"),
    )
    .unwrap();

    let response = app.get_document(&forged, &Uuid::new_v4().to_string()).await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn health_check_is_public() {
    let app = spawn_app().await;
    let response = app
        .api_client
        .get(format!("{}/health_check", app.address))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}
