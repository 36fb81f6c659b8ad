use axum::{routing::get, routing::post, Router};
use std::future::Future;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::api::outbound as outbound_handlers;
use super::api::tnc as tnc_handlers;
use super::api_doc::ApiDoc;
use super::auth::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Link health and received traffic
        .route("/api/tnc/status", get(tnc_handlers::status))
        .route("/api/packets/recent", get(tnc_handlers::recent))
        .route("/api/position", get(tnc_handlers::position))
        .route("/api/stations", get(tnc_handlers::stations))
        .route("/api/stations/{callsign}", get(tnc_handlers::station))
        // Outbound queues
        .route("/api/beacon", post(outbound_handlers::beacon))
        .route("/api/messages", post(outbound_handlers::message))
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(
    bind_addr: &str,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
