use std::{net::SocketAddr, sync::Arc};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use secrecy::Secret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::{
    auth::auth_middleware,
    configuration::{DatabaseSettings, Settings, StoreKind},
    routes::{create_document, get_document, get_public_document, health_check, update_snapshot},
    store::{DocumentStore, InMemoryStore, PgDocumentStore},
};

pub struct Application {
    listener: TcpListener,
    router: Router,
    port: u16,
}

#[derive(Clone)]
pub struct ApplicationState {
    pub store: Arc<dyn DocumentStore>,
}

impl Application {
    pub async fn build(settings: Settings) -> Result<Self, std::io::Error> {
        let store: Arc<dyn DocumentStore> = match settings.store {
            StoreKind::Postgres => {
                let store = PgDocumentStore::new(get_connection_pool(&settings.database));
                store.migrate().await.map_err(std::io::Error::other)?;
                Arc::new(store)
            }
            StoreKind::Memory => {
                tracing::warn!("using the in-memory store, documents are lost on shutdown");
                Arc::new(InMemoryStore::new())
            }
        };
        Self::build_with_store(settings, store).await
    }

    pub async fn build_with_store(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, std::io::Error> {
        let address = format!(
            "{}:{}",
            settings.application.host, settings.application.port
        );

        let listener = TcpListener::bind(address).await?;
        let port = listener.local_addr()?.port();

        let router = router(ApplicationState { store }, settings.application.signing_key);

        Ok(Self {
            listener,
            router,
            port,
        })
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        tracing::info!("listening on {}", self.listener.local_addr()?);
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Authenticated document routes, then the public ones.
pub fn router(state: ApplicationState, signing_key: Secret<String>) -> Router {
    Router::new()
        .route("/documents", post(create_document))
        .route(
            "/documents/:document_id",
            get(get_document).put(update_snapshot),
        )
        .route_layer(middleware::from_fn_with_state(signing_key, auth_middleware))
        .route("/public/:token", get(get_public_document))
        .route("/health_check", get(health_check))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .with_state(state)
}

pub fn get_connection_pool(settings: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new().connect_lazy_with(settings.with_db())
}
