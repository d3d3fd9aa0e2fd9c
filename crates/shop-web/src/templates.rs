//! Page templates and the view models they render.

use askama::Template;
use askama_web::WebTemplate;
use shop_core::{CartProduct, Product};

/// Product as shown on a page.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: u64,
    pub name: String,
    pub description: String,
    /// Formatted price, e.g. `$19.99`
    pub price: String,
    pub count: u32,
    pub in_stock: bool,
    pub image_url: Option<String>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.display(),
            count: product.count,
            in_stock: product.in_stock(),
            image_url: product.image_url.clone(),
        }
    }
}

/// A cart row.
#[derive(Debug, Clone)]
pub struct CartLineView {
    pub line_id: u64,
    pub product_id: u64,
    pub name: String,
    pub price: String,
}

impl CartLineView {
    pub fn new(line: &CartProduct, product: &Product) -> Self {
        Self {
            line_id: line.id,
            product_id: product.id,
            name: product.name.clone(),
            price: product.price.display(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub user: Option<String>,
    pub products: Vec<ProductView>,
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/search_results.html")]
pub struct SearchResultsTemplate {
    pub user: Option<String>,
    pub query: String,
    pub products: Vec<ProductView>,
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/404.html")]
pub struct NotFoundTemplate {
    pub user: Option<String>,
}

/// Generic failure page used by [`crate::error::WebError`].
#[derive(Template, WebTemplate)]
#[template(path = "pages/error.html")]
pub struct ErrorTemplate {
    pub user: Option<String>,
    pub message: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "accounts/login.html")]
pub struct LoginTemplate {
    pub user: Option<String>,
    /// Where to go after logging in
    pub next: String,
    pub username: String,
    pub error: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/cart.html")]
pub struct CartTemplate {
    pub user: Option<String>,
    pub lines: Vec<CartLineView>,
    pub total: String,
}

/// Checkout page; embeds Stripe Checkout with the publishable key.
#[derive(Template, WebTemplate)]
#[template(path = "pages/payment.html")]
pub struct PaymentTemplate {
    pub user: Option<String>,
    pub product: ProductView,
    pub publishable_key: String,
    pub amount_cents: i64,
    pub currency: String,
    pub email: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/payment_success.html")]
pub struct PaymentSuccessTemplate {
    pub user: Option<String>,
    pub product: ProductView,
    pub charge_id: String,
    pub amount: String,
    pub receipt_url: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/payment_failed.html")]
pub struct PaymentFailedTemplate {
    pub user: Option<String>,
    pub product: ProductView,
    pub error: String,
}
