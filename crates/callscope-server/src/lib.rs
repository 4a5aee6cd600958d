//! CallScope Server: REST API over the CallScope services.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    agents, auth, call_types, health, master_admin, organizations, transcripts, users,
};
use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/change-password", post(auth::change_password));

    let user_routes = Router::new()
        .route("/", get(users::list).post(users::create))
        .route(
            "/{id}",
            get(users::get).put(users::update).delete(users::delete),
        );

    let agent_routes = Router::new()
        .route("/", get(agents::list).post(agents::create))
        .route(
            "/analytics/performance",
            get(agents::organization_performance),
        )
        .route("/analytics/update-all", post(agents::update_all))
        .route("/analytics/rebuild", post(agents::rebuild))
        .route(
            "/{id}",
            get(agents::get).put(agents::update).delete(agents::delete),
        )
        .route("/{id}/performance", get(agents::performance))
        .route("/{id}/performance-trends", get(agents::performance_trends))
        .route("/{id}/performance/recompute", post(agents::recompute));

    let transcript_routes = Router::new()
        .route("/", get(transcripts::list).post(transcripts::create))
        .route(
            "/{id}",
            get(transcripts::get)
                .put(transcripts::update)
                .delete(transcripts::delete),
        );

    let call_type_routes = Router::new()
        .route("/", get(call_types::list).post(call_types::create))
        .route(
            "/{id}",
            get(call_types::get)
                .put(call_types::update)
                .delete(call_types::delete),
        );

    let organization_routes = Router::new()
        .route(
            "/current",
            get(organizations::current).put(organizations::update_current),
        )
        .route("/current/stats", get(organizations::stats))
        .route(
            "/current/api-keys",
            get(organizations::list_api_keys).post(organizations::create_api_key),
        )
        .route(
            "/current/api-keys/{id}",
            axum::routing::delete(organizations::revoke_api_key),
        );

    let master_admin_routes = Router::new()
        .route(
            "/organizations",
            get(master_admin::list_organizations).post(master_admin::create_organization),
        )
        .route(
            "/organizations/{id}",
            get(master_admin::get_organization)
                .put(master_admin::update_organization)
                .delete(master_admin::delete_organization),
        )
        .route(
            "/users",
            get(master_admin::list_users).post(master_admin::create_user),
        )
        .route(
            "/users/{id}/master-admin",
            put(master_admin::set_master_admin),
        );

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/agents", agent_routes)
        .nest("/api/transcripts", transcript_routes)
        .nest("/api/call-types", call_type_routes)
        .nest("/api/organizations", organization_routes)
        .nest("/api/master-admin", master_admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
