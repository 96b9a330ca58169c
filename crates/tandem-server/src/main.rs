mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tandem_api::auth::{self, AppState, AppStateInner};
use tandem_api::chat;
use tandem_api::middleware::require_auth;
use tandem_api::users;
use tandem_chat::ChatClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem=debug,tower_http=debug".into()),
        )
        .init();

    let config = config::Config::from_env()?;

    // Init database
    let db = tandem_db::Database::open(&config.db_path)?;

    // Shared state
    let chat_client = ChatClient::new(
        config.chat_base_url.clone(),
        config.chat_api_key.clone(),
        config.chat_api_secret.clone(),
    );
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        chat: chat_client,
        secure_cookies: config.production,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/onboarding", post(auth::onboarding))
        .route("/users", get(users::get_recommended_users))
        .route("/users/friends", get(users::get_my_friends))
        .route("/users/friend-request/{id}", post(users::send_friend_request))
        .route("/users/friend-request/{id}/accept", put(users::accept_friend_request))
        .route("/users/friend-requests", get(users::get_friend_requests))
        .route("/users/outgoing-friend-requests", get(users::get_outgoing_friend_requests))
        .route("/chat/token", get(chat::get_chat_token))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    // Browser clients send the session cookie, so CORS is pinned to one
    // origin with credentials rather than left permissive.
    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    let app = Router::new()
        .route("/", get(root_handler))
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Tandem server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root_handler() -> &'static str {
    "Tandem language-exchange API"
}
