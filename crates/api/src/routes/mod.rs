//! API routes

pub mod auth;
pub mod health;
pub mod invites;
pub mod orders;
pub mod referrals;
pub mod sign_links;
pub mod stripe;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::{optional_auth, require_auth},
    security::security_headers_middleware,
    state::AppState,
};

/// Global request body limit
const MAX_BODY_BYTES: usize = 1024 * 1024;

fn cors_layer(public_url: &str) -> CorsLayer {
    let origin = match HeaderValue::from_str(public_url.trim_end_matches('/')) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(public_url = %public_url, "PUBLIC_URL is not a valid origin, allowing any");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public routes (no session required)
    let public_api_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/invites/verify", get(invites::verify_invite))
        .route("/referrals/validate", post(referrals::validate_referral))
        // Customers only; an attached session is rejected inside the handler
        .route(
            "/referrals/redeem",
            post(referrals::redeem_referral).route_layer(middleware::from_fn_with_state(
                state.clone(),
                optional_auth,
            )),
        )
        .route("/stripe/setup-intent", post(stripe::create_setup_intent))
        // Authenticated by Stripe-Signature
        .route("/stripe/webhook", post(stripe::webhook))
        .route("/sign-links/:token", get(sign_links::get_sign_link))
        .route("/sign-links/:token/consume", post(sign_links::consume_sign_link));

    // Internal user routes (admin checks inside handlers)
    let protected_api_routes = Router::new()
        .route("/orders", post(orders::create_order))
        .route(
            "/orders/:id",
            get(orders::get_order).delete(orders::delete_order),
        )
        .route("/orders/:id/charge", post(orders::charge_order))
        .route("/orders/:id/status", post(orders::update_status))
        .route("/orders/:id/events", get(orders::list_events))
        .route("/invites/create", post(invites::create_invite))
        .route("/sign-links", post(sign_links::create_sign_link))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api_routes = Router::new()
        .merge(health_routes.clone())
        .merge(public_api_routes)
        .merge(protected_api_routes);

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.public_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
