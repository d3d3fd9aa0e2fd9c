//! # Sessions
//!
//! Server-side sessions via tower-sessions. The cookie carries only the
//! session id; the logged-in client's id lives in the store under
//! [`CLIENT_ID_KEY`].

use crate::config::AppConfig;
use crate::routes::{found, paths};
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
    response::Response,
};
use shop_core::{Client, ShopError};
use tower_sessions::{
    cookie::{time::Duration, SameSite},
    Expiry, MemoryStore, Session, SessionManagerLayer,
};
use tracing::debug;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "eshop_session";

/// Session key holding the logged-in client's id.
pub const CLIENT_ID_KEY: &str = "client_id";

/// Sessions expire after 14 days without a request.
const SESSION_EXPIRY_SECONDS: i64 = 14 * 24 * 60 * 60;

/// Create the session layer over an in-memory store.
///
/// The cookie is marked `Secure` whenever the storefront is served over
/// https.
#[must_use]
pub fn create_session_layer(config: &AppConfig) -> SessionManagerLayer<MemoryStore> {
    let is_secure = config.base_url.starts_with("https://");

    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(SESSION_EXPIRY_SECONDS)))
        .with_secure(is_secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Bind `client` to the session, rotating its id first.
pub async fn log_in(session: &Session, client: &Client) -> Result<(), ShopError> {
    session
        .cycle_id()
        .await
        .map_err(|e| ShopError::Internal(format!("session error: {}", e)))?;
    session
        .insert(CLIENT_ID_KEY, client.id)
        .await
        .map_err(|e| ShopError::Internal(format!("session error: {}", e)))
}

/// Drop everything stored for this session and expire its cookie.
pub async fn log_out(session: &Session) -> Result<(), ShopError> {
    session
        .flush()
        .await
        .map_err(|e| ShopError::Internal(format!("session error: {}", e)))
}

async fn resolve_client(parts: &Parts, state: &AppState) -> Option<Client> {
    let session = parts.extensions.get::<Session>()?;
    let client_id: u64 = session.get(CLIENT_ID_KEY).await.ok().flatten()?;

    let client = state.clients.get(client_id).await;
    if client.is_none() {
        debug!(client_id, "session refers to an unknown client");
    }
    client
}

/// A logged-in client. Rejects with a redirect to the login page.
pub struct CurrentClient(pub Client);

impl FromRequestParts<AppState> for CurrentClient {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve_client(parts, state).await {
            Some(client) => Ok(CurrentClient(client)),
            None => {
                // Nested routers strip their prefix from `parts.uri`
                let next = parts
                    .extensions
                    .get::<OriginalUri>()
                    .map(|uri| uri.path().to_string())
                    .unwrap_or_else(|| parts.uri.path().to_string());
                Err(found(&paths::login_with_next(&next)))
            }
        }
    }
}

/// The logged-in client, if any. Never rejects.
pub struct MaybeClient(pub Option<Client>);

impl FromRequestParts<AppState> for MaybeClient {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeClient(resolve_client(parts, state).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use axum_test::TestServer;

    async fn set_cookie_for(config: &AppConfig) -> String {
        let app = Router::new()
            .route(
                "/",
                get(|session: Session| async move {
                    session.insert(CLIENT_ID_KEY, 1u64).await.unwrap();
                }),
            )
            .layer(create_session_layer(config));

        let server = TestServer::new(app).unwrap();
        let response = server.get("/").await;
        response.header("set-cookie").to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_cookie_attributes() {
        let cookie = set_cookie_for(&AppConfig::for_testing()).await;

        assert!(cookie.starts_with("eshop_session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(!cookie.contains("Secure"));
    }

    #[tokio::test]
    async fn test_https_base_url_sets_secure() {
        let config = AppConfig {
            base_url: "https://shop.example.com".to_string(),
            ..AppConfig::for_testing()
        };
        let cookie = set_cookie_for(&config).await;

        assert!(cookie.contains("Secure"));
    }
}
