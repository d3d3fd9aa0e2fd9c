//! Email service for purchase notifications.
//!
//! Product photos travel inside the message as inline parts and the HTML body
//! points at them with `cid:` URLs, so the email renders without fetching
//! anything remote. Delivery goes through a [`MailTransport`]: SMTP via lettre,
//! [`LogTransport`] when no relay is configured outside production, and
//! [`MemoryTransport`] in tests.

use askama::Template;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::config::MailConfig;

pub const PURCHASE_SUBJECT: &str = "Thank you for your purchase";

/// One product shown in the email
#[derive(Debug, Clone, Deserialize)]
pub struct EmailProduct {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Base64 image bytes; a `data:` URL prefix is tolerated
    #[serde(default)]
    pub image_base64: Option<String>,
}

impl EmailProduct {
    pub fn content_id(&self) -> String {
        format!("product-{}", self.id)
    }
}

/// Data rendered into the purchase email
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailContext {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub shop_url: String,
    pub products: Vec<EmailProduct>,
}

#[derive(Template)]
#[template(path = "email/purchase.html")]
struct PurchaseEmailHtml<'a> {
    customer_name: &'a str,
    shop_url: &'a str,
    products: &'a [InlineProduct<'a>],
}

#[derive(Template)]
#[template(path = "email/purchase.txt")]
struct PurchaseEmailText<'a> {
    customer_name: &'a str,
    shop_url: &'a str,
    products: &'a [InlineProduct<'a>],
}

/// What the templates see for each product
struct InlineProduct<'a> {
    name: &'a str,
    content_id: String,
    has_image: bool,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Image data could not be decoded.
    #[error("Invalid image for product {product_id}: {reason}")]
    InvalidImage { product_id: u64, reason: String },

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A decoded inline image
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub product_id: u64,
    pub content_id: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// Rendered bodies plus the inline images they reference
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
    pub images: Vec<InlineImage>,
}

/// Guess an image MIME type from its magic bytes.
fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}

fn decode_image(product: &EmailProduct, data: &str) -> Result<InlineImage, EmailError> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| EmailError::InvalidImage {
            product_id: product.id,
            reason: e.to_string(),
        })?;
    Ok(InlineImage {
        product_id: product.id,
        content_id: product.content_id(),
        mime: sniff_mime(&bytes),
        bytes,
    })
}

/// Render the purchase email for `context`, decoding every image.
pub fn render_inline_photo_email(context: &EmailContext) -> Result<RenderedEmail, EmailError> {
    let mut images = Vec::new();
    for product in &context.products {
        if let Some(data) = product.image_base64.as_deref().filter(|d| !d.is_empty()) {
            images.push(decode_image(product, data)?);
        }
    }

    let inline: Vec<InlineProduct<'_>> = context
        .products
        .iter()
        .map(|p| InlineProduct {
            name: if p.name.is_empty() { "your item" } else { p.name.as_str() },
            content_id: p.content_id(),
            has_image: images.iter().any(|img| img.content_id == p.content_id()),
        })
        .collect();

    let customer_name: &str = if context.customer_name.is_empty() {
        "there"
    } else {
        context.customer_name.as_str()
    };

    let html = PurchaseEmailHtml {
        customer_name,
        shop_url: &context.shop_url,
        products: &inline,
    }
    .render()?;
    let text = PurchaseEmailText {
        customer_name,
        shop_url: &context.shop_url,
        products: &inline,
    }
    .render()?;

    Ok(RenderedEmail {
        subject: PURCHASE_SUBJECT.to_string(),
        html,
        text,
        images,
    })
}

/// Read a product's image from `media_dir` as base64, trying common
/// extensions. `None` when no image exists.
pub async fn load_product_image(media_dir: &str, product_id: u64) -> Option<String> {
    for ext in ["png", "jpg", "jpeg", "gif", "webp"] {
        let path = Path::new(media_dir).join(format!("{}.{}", product_id, ext));
        if let Ok(bytes) = tokio::fs::read(&path).await {
            debug!(path = %path.display(), "loaded product image");
            return Some(STANDARD.encode(bytes));
        }
    }
    None
}

/// Delivery backend
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: Message) -> Result<(), EmailError>;

    fn name(&self) -> &'static str;
}

/// SMTP delivery via lettre (STARTTLS relay)
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// Create a new SMTP transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured.
    pub fn new(config: &MailConfig) -> Result<Self, SmtpError> {
        let credentials =
            Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self { mailer })
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn deliver(&self, message: Message) -> Result<(), EmailError> {
        self.mailer.send(message).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// Logs each message and drops it
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, message: Message) -> Result<(), EmailError> {
        let to: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(|addr| addr.to_string())
            .collect();
        info!(
            to = ?to,
            subject = message.headers().get_raw("Subject").unwrap_or_default(),
            bytes = message.formatted().len(),
            "no SMTP relay configured, email dropped"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// A message captured by [`MemoryTransport`]
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: Vec<String>,
    pub subject: Option<String>,
    /// Full RFC 5322 message as sent
    pub raw: String,
}

/// Keeps every message in memory for tests to inspect. The outbox is never
/// drained.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    outbox: Arc<Mutex<Vec<SentEmail>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.outbox.lock().await.clone()
    }
}

#[async_trait]
impl MailTransport for MemoryTransport {
    async fn deliver(&self, message: Message) -> Result<(), EmailError> {
        let sent = SentEmail {
            to: message
                .envelope()
                .to()
                .iter()
                .map(|addr| addr.to_string())
                .collect(),
            subject: message.headers().get_raw("Subject").map(str::to_string),
            raw: String::from_utf8_lossy(&message.formatted()).into_owned(),
        };
        info!(to = ?sent.to, "email captured in memory outbox");
        self.outbox.lock().await.push(sent);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Sends storefront emails through a transport
#[derive(Clone)]
pub struct EmailSender {
    transport: Arc<dyn MailTransport>,
    from_address: String,
}

impl EmailSender {
    pub fn new(transport: Arc<dyn MailTransport>, from_address: impl Into<String>) -> Self {
        Self {
            transport,
            from_address: from_address.into(),
        }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Send the purchase email with each product's photo inlined.
    ///
    /// # Errors
    ///
    /// Returns error if an address or image is invalid, the template fails to
    /// render, or the transport refuses the message.
    #[instrument(skip(self, context), fields(products = context.products.len()))]
    pub async fn send_inline_photo_email(
        &self,
        recipient: &str,
        context: &EmailContext,
    ) -> Result<(), EmailError> {
        let rendered = render_inline_photo_email(context)?;

        let from: Mailbox = self
            .from_address
            .parse()
            .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?;
        let to: Mailbox = recipient
            .parse()
            .map_err(|_| EmailError::InvalidAddress(recipient.to_string()))?;

        let mut related = MultiPart::related().singlepart(SinglePart::html(rendered.html));
        for image in rendered.images {
            let content_type = ContentType::parse(image.mime).map_err(|_| {
                EmailError::InvalidImage {
                    product_id: image.product_id,
                    reason: format!("unusable content type {}", image.mime),
                }
            })?;
            related = related.singlepart(
                Attachment::new_inline(image.content_id).body(image.bytes, content_type),
            );
        }

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(rendered.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(rendered.text))
                    .multipart(related),
            )?;

        self.transport.deliver(message).await?;

        info!(to = %recipient, transport = self.transport.name(), "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PNG_BASE64: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn context() -> EmailContext {
        EmailContext {
            customer_name: "Test User".to_string(),
            shop_url: "http://localhost".to_string(),
            products: vec![EmailProduct {
                id: 1,
                name: "Test Product".to_string(),
                image_base64: Some(PNG_BASE64.to_string()),
            }],
        }
    }

    fn sender(transport: &MemoryTransport) -> EmailSender {
        EmailSender::new(Arc::new(transport.clone()), "shop@example.com")
    }

    #[test]
    fn test_render_references_inline_images() {
        let rendered = render_inline_photo_email(&context()).unwrap();

        assert_eq!(rendered.images.len(), 1);
        assert_eq!(rendered.images[0].content_id, "product-1");
        assert_eq!(rendered.images[0].mime, "image/png");
        assert!(rendered.html.contains("cid:product-1"));
        assert!(rendered.html.contains("Test Product"));
        assert!(rendered.text.contains("Test Product"));
    }

    #[test]
    fn test_data_url_prefix_accepted() {
        let mut ctx = context();
        ctx.products[0].image_base64 = Some(format!("data:image/png;base64,{}", PNG_BASE64));
        assert_eq!(render_inline_photo_email(&ctx).unwrap().images.len(), 1);
    }

    #[test]
    fn test_product_without_image_is_listed_without_cid() {
        let mut ctx = context();
        ctx.products[0].image_base64 = None;
        let rendered = render_inline_photo_email(&ctx).unwrap();

        assert!(rendered.images.is_empty());
        assert!(!rendered.html.contains("cid:"));
        assert!(rendered.html.contains("Test Product"));
    }

    #[tokio::test]
    async fn test_send_inline_photo_email() {
        let transport = MemoryTransport::new();
        sender(&transport)
            .send_inline_photo_email("test@example.com", &context())
            .await
            .unwrap();

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["test@example.com".to_string()]);
        assert_eq!(sent[0].subject.as_deref(), Some(PURCHASE_SUBJECT));
        assert!(sent[0].raw.contains("multipart/related"));
        assert!(sent[0].raw.contains("<product-1>"));
    }

    #[tokio::test]
    async fn test_each_product_gets_its_own_inline_part() {
        let transport = MemoryTransport::new();
        let mut ctx = context();
        ctx.products.push(EmailProduct {
            id: 2,
            name: "Second Product".to_string(),
            image_base64: Some(PNG_BASE64.to_string()),
        });
        ctx.products.push(EmailProduct {
            id: 3,
            name: "Photo-less Product".to_string(),
            image_base64: None,
        });

        let rendered = render_inline_photo_email(&ctx).unwrap();
        let ids: Vec<&str> = rendered.images.iter().map(|i| i.content_id.as_str()).collect();
        assert_eq!(ids, vec!["product-1", "product-2"]);
        assert!(rendered.html.contains("cid:product-1"));
        assert!(rendered.html.contains("cid:product-2"));
        assert!(!rendered.html.contains("cid:product-3"));
        assert!(rendered.html.contains("Photo-less Product"));

        sender(&transport)
            .send_inline_photo_email("test@example.com", &ctx)
            .await
            .unwrap();

        let raw = &transport.sent().await[0].raw;
        assert!(raw.contains("<product-1>"));
        assert!(raw.contains("<product-2>"));
        assert!(!raw.contains("<product-3>"));
    }

    #[tokio::test]
    async fn test_log_transport_accepts_and_keeps_nothing() {
        let sender = EmailSender::new(Arc::new(LogTransport), "shop@example.com");
        sender
            .send_inline_photo_email("test@example.com", &context())
            .await
            .unwrap();
        assert_eq!(sender.transport_name(), "log");
    }

    #[tokio::test]
    async fn test_invalid_base64_sends_nothing() {
        let transport = MemoryTransport::new();
        let mut ctx = context();
        ctx.products[0].image_base64 = Some("fake_base64_data!".to_string());

        let err = sender(&transport)
            .send_inline_photo_email("test@example.com", &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, EmailError::InvalidImage { product_id: 1, .. }));
        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_recipient() {
        let transport = MemoryTransport::new();
        let err = sender(&transport)
            .send_inline_photo_email("not an address", &context())
            .await
            .unwrap_err();
        assert!(matches!(err, EmailError::InvalidAddress(_)));
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_mime(b"GIF89a"), "image/gif");
        assert_eq!(sniff_mime(b"hello"), "application/octet-stream");
    }
}
