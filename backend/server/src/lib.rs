//! Backend of the house points and events tracker.
//!
//!
//!
//! # General Infrastructure
//! - axum server in front of a Redis container
//! - Roster mapping file mounted next to the binary, produced by the `compile`
//!   crate or by `POST /roster/compile`
//! - Login happens upstream; the frontend posts the identity provider's
//!   profile to `POST /users` to get or create the account
//!
//!
//!
//! # Routes
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/identity?name=&email=` | resolve a descriptor without creating anything |
//! | POST | `/roster/compile` | recompile the roster, then reload |
//! | POST | `/roster/reload` | reload the mapping file |
//! | GET, POST | `/users` | list, provision |
//! | GET | `/users/search?name=` | case-insensitive name search |
//! | PATCH | `/users/promote` | 9 -> 10 -> 11 -> 12 |
//! | DELETE | `/users/graduate` | remove seniors and their events |
//! | GET, PUT, DELETE | `/users/{id}` | |
//! | GET | `/houses` | all four houses with points |
//! | GET, PUT | `/houses/{name}` | profile |
//! | GET | `/houses/{name}/members`, `/houses/{name}/leaders` | |
//! | PATCH | `/houses/{name}/points` | atomic `{ "points": delta }` |
//! | GET, POST | `/events` | `?status=upcoming\|waiting-result\|result-posted\|past` |
//! | GET, DELETE | `/events/{slug}` | |
//! | PUT | `/events/{slug}/result` | post or take down a result |
//!
//!
//!
//! # Roster Reloads
//! The resolver holds an immutable snapshot of the mapping. Reloading reads the
//! file and swaps the snapshot; requests already resolving finish against the
//! old one. A reload that fails leaves the old snapshot in place.
use std::time::Duration;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, patch, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod houses;
pub mod routes;
pub mod state;
pub mod users;

use config::Config;
use error::AppError;
use routes::{
    compile_handler, create_event_handler, delete_event_handler, delete_user_handler,
    event_handler, events_handler, graduate_handler, house_handler, houses_handler,
    identity_handler, leaders_handler, members_handler, points_handler, post_result_handler,
    promote_handler, provision_handler, reload_handler, search_users_handler,
    update_house_handler, update_user_handler, user_handler, users_handler,
};
use state::AppState;

pub fn init_tracing() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
}

/// Compiles the configured roster once, before any server state exists.
pub async fn compile_roster() -> Result<(), AppError> {
    let config = Config::load()?;
    let naming = state::naming(&config);

    let compiled = state::compile_roster(&config, naming.as_ref()).await?;
    info!(
        "Startup compile wrote {} keys ({} collisions)",
        compiled.mapping.len(),
        compiled.collisions.len()
    );

    Ok(())
}

pub fn router(state: std::sync::Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/identity", get(identity_handler))
        .route("/roster/compile", post(compile_handler))
        .route("/roster/reload", post(reload_handler))
        .route("/users", get(users_handler).post(provision_handler))
        .route("/users/search", get(search_users_handler))
        .route("/users/promote", patch(promote_handler))
        .route("/users/graduate", axum::routing::delete(graduate_handler))
        .route(
            "/users/{id}",
            get(user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        )
        .route("/houses", get(houses_handler))
        .route("/houses/{name}", get(house_handler).put(update_house_handler))
        .route("/houses/{name}/members", get(members_handler))
        .route("/houses/{name}/leaders", get(leaders_handler))
        .route("/houses/{name}/points", patch(points_handler))
        .route("/events", get(events_handler).post(create_event_handler))
        .route(
            "/events/{slug}",
            get(event_handler).delete(delete_event_handler),
        )
        .route("/events/{slug}/result", put(post_result_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<(), AppError> {
    info!("Initializing state...");
    let state = AppState::new().await?;

    info!("Starting server...");
    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| AppError::InternalError(Box::new(e)))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::InternalError(Box::new(e)))?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
