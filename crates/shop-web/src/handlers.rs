//! # Request Handlers
//!
//! Storefront pages, account views, checkout and the JSON API.

use crate::error::{shop_error_to_json, ErrorResponse, WebError};
use crate::mail::{load_product_image, EmailContext, EmailProduct};
use crate::routes::{found, paths};
use crate::session::{log_in, log_out, CurrentClient, MaybeClient};
use crate::state::AppState;
use crate::templates::{
    CartLineView, CartTemplate, HomeTemplate, LoginTemplate, NotFoundTemplate,
    PaymentFailedTemplate, PaymentSuccessTemplate, PaymentTemplate, ProductView,
    SearchResultsTemplate,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use shop_core::{total_stock, Cart, Client, Currency, Price, Product, ShopError};
use std::collections::HashMap;
use tower_sessions::Session;
use tracing::{debug, info, instrument, warn};

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Form posted by Stripe Checkout
#[derive(Debug, Deserialize)]
pub struct PaymentForm {
    #[serde(rename = "stripeToken", default)]
    pub stripe_token: Option<String>,
}

fn user_name(client: &Option<Client>) -> Option<String> {
    client.as_ref().map(Client::display_name)
}

/// Redirect target after login; anything off-site falls back to home.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if paths::is_local(path) => path,
        _ => paths::HOME,
    }
}

/// Fetch a product that is listed in the storefront.
async fn listed_product(state: &AppState, product_id: u64) -> Result<Product, WebError> {
    match state.inventory.get(product_id).await {
        Some(product) if product.active => Ok(product),
        _ => Err(WebError::NotFound),
    }
}

// =============================================================================
// Pages
// =============================================================================

/// Active products, sold-out ones included
#[instrument(skip_all)]
pub async fn home(State(state): State<AppState>, MaybeClient(client): MaybeClient) -> impl IntoResponse {
    let products = state
        .inventory
        .active_products()
        .await
        .iter()
        .map(ProductView::from)
        .collect();

    HomeTemplate {
        user: user_name(&client),
        products,
    }
}

/// Search active products. Sends the visitor to the not-found page when no
/// match has any stock.
#[instrument(skip(state, client))]
pub async fn search(
    State(state): State<AppState>,
    MaybeClient(client): MaybeClient,
    Query(params): Query<SearchQuery>,
) -> Response {
    let query = params.q.unwrap_or_default();
    let results = state.inventory.search(&query).await;

    if results.is_empty() || total_stock(&results) == 0 {
        debug!(matches = results.len(), "nothing purchasable found");
        return found(paths::NOT_FOUND);
    }

    SearchResultsTemplate {
        user: user_name(&client),
        query,
        products: results.iter().map(ProductView::from).collect(),
    }
    .into_response()
}

/// The page search sends visitors to. A normal page, so it answers 200.
pub async fn not_found(MaybeClient(client): MaybeClient) -> impl IntoResponse {
    NotFoundTemplate {
        user: user_name(&client),
    }
}

/// Router fallback for unknown paths
pub async fn fallback() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NotFoundTemplate { user: None })
}

// =============================================================================
// Accounts
// =============================================================================

pub async fn login_page(
    MaybeClient(client): MaybeClient,
    Query(params): Query<NextQuery>,
) -> Response {
    let next = safe_next(params.next.as_deref()).to_string();
    if client.is_some() {
        return found(&next);
    }

    LoginTemplate {
        user: None,
        next,
        username: String::new(),
        error: None,
    }
    .into_response()
}

#[instrument(skip(state, form), fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    let next = safe_next(form.next.as_deref()).to_string();

    let client = match state.clients.authenticate(&form.username, &form.password).await {
        Ok(client) => client,
        Err(ShopError::InvalidCredentials) => {
            info!("login refused");
            let page = LoginTemplate {
                user: None,
                next,
                username: form.username,
                error: Some(ShopError::InvalidCredentials.to_string()),
            };
            return Ok((StatusCode::UNAUTHORIZED, page).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    log_in(&session, &client).await?;

    info!(client_id = client.id, "logged in");
    Ok(found(&next))
}

pub async fn logout(session: Session) -> Result<Response, WebError> {
    log_out(&session).await?;
    Ok(found(paths::HOME))
}

// =============================================================================
// Cart
// =============================================================================

#[instrument(skip_all, fields(client_id = client.id))]
pub async fn cart(State(state): State<AppState>, CurrentClient(client): CurrentClient) -> impl IntoResponse {
    let cart: Cart = state.carts.cart_for(client.id).await;

    let mut lookup = HashMap::new();
    for line in &cart.products {
        if !lookup.contains_key(&line.product_id) {
            if let Some(product) = state.inventory.get(line.product_id).await {
                lookup.insert(product.id, product);
            }
        }
    }

    let lines = cart.lines(&lookup);
    let totals = Cart::totals(&lines);
    let total = if totals.is_empty() {
        Price::from_cents(0, Currency::default()).display()
    } else {
        totals.iter().map(Price::display).collect::<Vec<_>>().join(" + ")
    };

    CartTemplate {
        user: Some(client.display_name()),
        lines: lines
            .iter()
            .map(|(line, product)| CartLineView::new(line, product))
            .collect(),
        total,
    }
}

#[instrument(skip(state, client), fields(client_id = client.id))]
pub async fn cart_add(
    State(state): State<AppState>,
    CurrentClient(client): CurrentClient,
    Path(product_id): Path<u64>,
) -> Result<Response, WebError> {
    let product = listed_product(&state, product_id).await?;
    let line = state.carts.add_product(client.id, product.id).await;
    debug!(line_id = line.id, "added to cart");
    Ok(found(paths::CART))
}

// =============================================================================
// Payment
// =============================================================================

#[instrument(skip(state, client), fields(client_id = client.id))]
pub async fn payment_page(
    State(state): State<AppState>,
    CurrentClient(client): CurrentClient,
    Path(product_id): Path<u64>,
) -> Result<impl IntoResponse, WebError> {
    let product = listed_product(&state, product_id).await?;

    Ok(PaymentTemplate {
        user: Some(client.display_name()),
        publishable_key: state.stripe_publishable_key.clone(),
        amount_cents: product.price.amount,
        currency: product.price.currency.as_str().to_string(),
        email: client.email.clone(),
        product: ProductView::from(&product),
    })
}

/// Charge the posted `stripeToken` for one unit of the product.
#[instrument(skip(state, client, form), fields(client_id = client.id))]
pub async fn payment_pro(
    State(state): State<AppState>,
    CurrentClient(client): CurrentClient,
    Path(product_id): Path<u64>,
    Form(form): Form<PaymentForm>,
) -> Result<Response, WebError> {
    let product = listed_product(&state, product_id).await?;

    let token = form
        .stripe_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| WebError::BadRequest("Missing payment token.".to_string()))?;

    let user = Some(client.display_name());

    match state.payments.process_payment(&product, &token, &client).await {
        Ok(charge) => {
            if !state.carts.remove_product(client.id, product.id).await {
                debug!("paid product was not in the cart");
            }
            send_purchase_email(&state, &client, &product).await;

            Ok(PaymentSuccessTemplate {
                user,
                product: ProductView::from(&product),
                charge_id: charge.id,
                amount: charge.amount.display(),
                receipt_url: charge.receipt_url,
            }
            .into_response())
        }
        Err(e) if e.is_payment_refusal() => {
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::PAYMENT_REQUIRED);
            let page = PaymentFailedTemplate {
                user,
                product: ProductView::from(&product),
                error: e.to_string(),
            };
            Ok((status, page).into_response())
        }
        Err(ShopError::ProductNotFound { .. }) => Err(WebError::NotFound),
        Err(e) => Err(WebError::Gateway(e)),
    }
}

/// Mail the purchase confirmation. Failures are logged, never surfaced: the
/// charge has already gone through.
async fn send_purchase_email(state: &AppState, client: &Client, product: &Product) {
    if client.email.is_empty() {
        debug!(client_id = client.id, "no email address, skipping purchase email");
        return;
    }

    let context = EmailContext {
        customer_name: client.display_name(),
        shop_url: state.config.base_url.clone(),
        products: vec![EmailProduct {
            id: product.id,
            name: product.name.clone(),
            image_base64: load_product_image(&state.config.media_dir, product.id).await,
        }],
    };

    if let Err(e) = state.mailer.send_inline_photo_email(&client.email, &context).await {
        warn!(error = %e, client_id = client.id, "failed to send purchase email");
    }
}

// =============================================================================
// JSON API
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "eshop",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// List active products
pub async fn list_products(State(state): State<AppState>) -> impl IntoResponse {
    let products = state.inventory.active_products().await;
    Json(serde_json::json!({
        "products": products,
        "count": products.len()
    }))
}

/// Get a product by ID
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<u64>,
) -> Result<Json<Product>, (StatusCode, Json<ErrorResponse>)> {
    match state.inventory.require(product_id).await {
        Ok(product) if product.active => Ok(Json(product)),
        Ok(_) => Err(shop_error_to_json(ShopError::ProductNotFound { product_id })),
        Err(e) => Err(shop_error_to_json(e)),
    }
}
