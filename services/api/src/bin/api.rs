//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{auth::SqliteAuthAdapter, db::SqliteStore},
    config::Config,
    error::ApiError,
    web::{
        create_conversation_handler, health_handler, list_conversations_handler,
        list_messages_handler, mark_read_handler, presence_handler, require_auth,
        rest::ApiDoc, send_message_handler, state::AppState, unread_count_handler, ws_handler,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use forum_chat_core::{
    delivery::DeliveryCoordinator,
    ports::{ConversationStore, MessageStore},
    presence::PresenceTracker,
    registry::ConnectionRegistry,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Create Schema ---
    info!("Connecting to database...");
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(SqliteStore::new(db_pool.clone()));
    store.init_schema().await?;
    info!("Database schema ready.");

    // --- 3. Wire the Messaging Core ---
    // The registry and trackers are explicit instances owned by the state;
    // their lifecycle ends with the process.
    let auth = Arc::new(SqliteAuthAdapter::new(db_pool.clone()));
    let conversations: Arc<dyn ConversationStore> = store.clone();
    let messages: Arc<dyn MessageStore> = store.clone();
    let presence = Arc::new(PresenceTracker::new(conversations.clone()));
    let registry = Arc::new(ConnectionRegistry::new(presence.clone()));
    let delivery = Arc::new(DeliveryCoordinator::new(
        conversations.clone(),
        messages.clone(),
        registry.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        auth,
        conversations,
        messages,
        presence,
        registry,
        delivery,
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new().route("/healthz", get(health_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/conversations",
            post(create_conversation_handler).get(list_conversations_handler),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            post(send_message_handler).get(list_messages_handler),
        )
        .route("/conversations/{conversation_id}/read", post(mark_read_handler))
        .route("/conversations/{conversation_id}/unread", get(unread_count_handler))
        .route("/presence/{user_id}", get(presence_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
