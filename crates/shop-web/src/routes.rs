//! # Routes
//!
//! Axum router for the storefront pages and the JSON API.

use crate::handlers;
use crate::session::create_session_layer;
use crate::state::AppState;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Paths of the named routes, for redirects and links
pub mod paths {
    pub const HOME: &str = "/";
    pub const SEARCH: &str = "/search";
    pub const NOT_FOUND: &str = "/404";
    pub const LOGIN: &str = "/accounts/login";
    pub const LOGOUT: &str = "/accounts/logout";
    pub const CART: &str = "/cart";

    /// Login page that returns to `next` afterwards. Only local paths are
    /// kept.
    pub fn login_with_next(next: &str) -> String {
        if is_local(next) {
            format!("{}?next={}", LOGIN, next)
        } else {
            LOGIN.to_string()
        }
    }

    pub fn cart_add(product_id: u64) -> String {
        format!("/cart/add/{}", product_id)
    }

    pub fn payment(product_id: u64) -> String {
        format!("/payment/{}", product_id)
    }

    pub fn payment_pro(product_id: u64) -> String {
        format!("/payment/{}/process", product_id)
    }

    /// A same-site absolute path: no scheme, no `//host` or `/\host`, no
    /// control characters.
    pub fn is_local(path: &str) -> bool {
        let mut chars = path.chars();
        chars.next() == Some('/')
            && !matches!(chars.next(), Some('/' | '\\'))
            && !path.contains("://")
            && !path.chars().any(char::is_control)
    }
}

/// `302 Found` redirect to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Create the main application router
///
/// Routes:
/// - Pages:
///   - GET  / - Home, active products
///   - GET  /search?q= - Search results (redirects to /404 when nothing is in stock)
///   - GET  /404 - Not found page
///   - GET  /cart - Cart of the logged-in client
///   - POST /cart/add/{product_id} - Add one unit to the cart
///   - GET  /payment/{product_id} - Checkout page
///   - POST /payment/{product_id}/process - Charge the `stripeToken`
///
/// - Accounts:
///   - GET/POST /accounts/login
///   - POST     /accounts/logout
///
/// - API:
///   - GET /health
///   - GET /api/v1/products
///   - GET /api/v1/products/{product_id}
pub fn create_router(state: AppState) -> Router {
    // The JSON API is public and read-only
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/products", get(handlers::list_products))
        .route("/products/{product_id}", get(handlers::get_product))
        .layer(cors);

    let account_routes = Router::new()
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route("/logout", post(handlers::logout));

    let payment_routes = Router::new()
        .route("/{product_id}", get(handlers::payment_page))
        .route("/{product_id}/process", post(handlers::payment_pro));

    Router::new()
        .route(paths::HOME, get(handlers::home))
        .route(paths::SEARCH, get(handlers::search))
        .route(paths::NOT_FOUND, get(handlers::not_found))
        .route(paths::CART, get(handlers::cart))
        .route("/cart/add/{product_id}", post(handlers::cart_add))
        .route("/health", get(handlers::health))
        .nest("/accounts", account_routes)
        .nest("/payment", payment_routes)
        .nest("/api/v1", api_routes)
        .fallback(handlers::fallback)
        .layer(create_session_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
