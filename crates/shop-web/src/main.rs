//! # eshop
//!
//! Storefront server.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_PUBLISHABLE_KEY=pk_test_...
//! export SMTP_HOST=smtp.example.com  # plus SMTP_USERNAME, SMTP_PASSWORD, SMTP_FROM
//!
//! # Run the server
//! eshop
//! ```

use shop_web::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    print_banner();

    let state = AppState::new().await?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Products loaded: {}", state.inventory.len().await);
    info!("Payment provider: {}", state.payments.provider_name());
    info!("Mail transport: {}", state.mailer.transport_name());

    let app = routes::create_router(state);

    info!("E-Shop starting on http://{}", addr);

    if !is_prod {
        info!("Storefront: http://{}/", addr);
        info!("Health: http://{}/health", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to JSON lines. Read before the config so
/// config errors are logged in the chosen format.
fn init_tracing() {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

fn print_banner() {
    println!(
        r#"
  E-Shop
  ━━━━━━━━━━━━━━━━━━━━━━━
  Storefront and checkout
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
