use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use deck::auth::Claims;
use deck::configuration::{get_configuration, StoreKind};
use deck::startup::Application;
use deck::store::InMemoryStore;
use deck::telemetry::{get_subscriber, init_subscriber};
use once_cell::sync::Lazy;
use reqwest::Response;
use secrecy::{ExposeSecret, Secret};
use serde_json::{json, Value};
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter = "info";
    if std::env::var("TEST_LOG").is_ok() {
        init_subscriber(get_subscriber(default_filter, std::io::stdout));
    } else {
        init_subscriber(get_subscriber(default_filter, std::io::sink));
    }
});

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub signing_key: Secret<String>,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub fn signed_jwt(&self, user_id: Uuid) -> String {
        let claims = Claims {
            user_id: user_id.to_string(),
            username: Uuid::new_v4().to_string(),
            exp: SystemTime::now()
                .duration_since(UNIX_EPOCH - Duration::from_secs(3600))
                .unwrap()
                .as_secs(),
        };

        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(self.signing_key.expose_secret().as_ref()),
        )
        .expect("token encoded")
    }

    pub async fn post_document(&self, token: &str, body: &Value) -> Response {
        self.api_client
            .post(format!("{}/documents", self.address))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("request sent")
    }

    /// Creates a document and returns its id.
    pub async fn create_document(&self, token: &str, is_public: bool) -> Value {
        let response = self
            .post_document(token, &json!({ "title": "Quarterly review", "isPublic": is_public }))
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.expect("json body");
        body["data"].clone()
    }

    pub async fn get_document(&self, token: &str, document_id: &str) -> Response {
        self.api_client
            .get(format!("{}/documents/{}", self.address, document_id))
            .bearer_auth(token)
            .send()
            .await
            .expect("request sent")
    }

    pub async fn put_snapshot(&self, token: &str, document_id: &str, body: &Value) -> Response {
        self.api_client
            .put(format!("{}/documents/{}", self.address, document_id))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("request sent")
    }

    pub async fn get_public(&self, public_token: &str) -> Response {
        self.api_client
            .get(format!("{}/public/{}", self.address, public_token))
            .send()
            .await
            .expect("request sent")
    }
}

pub async fn spawn_app() -> TestApp {
    // Only initialize tracer once instead of every test
    Lazy::force(&TRACING);

    let settings = {
        let mut c = get_configuration().expect("configuration fetched");
        c.application.port = 0;
        c.store = StoreKind::Memory;
        c
    };

    let store = Arc::new(InMemoryStore::new());
    let application = Application::build_with_store(settings.clone(), store)
        .await
        .expect("application built");
    let application_port = application.port();
    let _ = tokio::spawn(application.run_until_stopped());

    TestApp {
        address: format!("http://127.0.0.1:{}", application_port),
        port: application_port,
        signing_key: settings.application.signing_key,
        api_client: reqwest::Client::new(),
    }
}

pub async fn error_code(response: Response) -> String {
    let body: Value = response.json().await.expect("json error body");
    body["error"]["code"]
        .as_str()
        .expect("error code present")
        .to_string()
}
