//! # Products
//!
//! Catalog entries, prices and the catalog itself. The storefront seeds its
//! catalog from `config/products.toml`.

use serde::{de, Deserialize, Serialize};
use std::fmt;

/// ISO 4217 currencies the shop can price in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    #[default]
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
}

impl Currency {
    /// Lowercase code, as Stripe expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
            Currency::CAD => "cad",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::CAD => "C$",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        [
            Currency::USD,
            Currency::EUR,
            Currency::GBP,
            Currency::JPY,
            Currency::CAD,
        ]
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(code))
    }

    /// Digits after the decimal point. Yen has none.
    pub fn decimal_places(&self) -> u8 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    fn minor_per_major(&self) -> i64 {
        10_i64.pow(u32::from(self.decimal_places()))
    }

    /// Decimal amount to minor units, rounded to the nearest unit.
    pub fn to_smallest_unit(&self, amount: f64) -> i64 {
        (amount * self.minor_per_major() as f64).round() as i64
    }

    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        amount as f64 / self.minor_per_major() as f64
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Money in minor units of its currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Minor units: cents for USD, yen for JPY
    pub amount: i64,
    #[serde(default)]
    pub currency: Currency,
}

impl Price {
    /// Price from a decimal amount such as `19.99`.
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self {
            amount: currency.to_smallest_unit(amount),
            currency,
        }
    }

    pub fn from_cents(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn as_decimal(&self) -> f64 {
        self.currency.from_smallest_unit(self.amount)
    }

    /// Human-readable form, e.g. `$10.00`
    pub fn display(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let places = usize::from(self.currency.decimal_places());
        write!(f, "{}{:.*}", self.currency.symbol(), places, self.as_decimal())
    }
}

/// A product in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Catalog-assigned identifier
    #[serde(default)]
    pub id: u64,

    /// Display name
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Units in stock
    #[serde(default)]
    pub count: u32,

    /// Unit price
    pub price: Price,

    /// Whether this product is listed in the storefront
    #[serde(default = "default_true")]
    pub active: bool,

    /// Optional image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// Create an active product with no stock. The catalog assigns the id.
    pub fn new(name: impl Into<String>, price: Price) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: String::new(),
            count: 0,
            price,
            active: true,
            image_url: None,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn in_stock(&self) -> bool {
        self.count > 0
    }

    /// Case-insensitive substring match on name or description.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

/// Every product the shop knows about, listed or not
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub products: Vec<Product>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self {
            products: Vec::new(),
        }
    }

    /// Add a product under the next free id, whatever id it carried.
    /// Returns the id.
    pub fn add(&mut self, mut product: Product) -> u64 {
        product.id = self.next_id();
        let id = product.id;
        self.products.push(product);
        id
    }

    fn next_id(&self) -> u64 {
        self.products.iter().map(|p| p.id).max().unwrap_or(0) + 1
    }

    pub fn get(&self, id: u64) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| p.id == id)
    }

    /// Products shown in the storefront
    pub fn active_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.active)
    }

    /// Active products whose name or description contains `query`.
    /// A blank query matches nothing.
    pub fn search<'a>(&'a self, query: &'a str) -> impl Iterator<Item = &'a Product> + 'a {
        let query = query.trim();
        self.active_products()
            .filter(move |p| !query.is_empty() && p.matches(query))
    }

    /// Load catalog from TOML string.
    ///
    /// Explicit ids are kept as written and must be unique. Products without
    /// one take the lowest unused ids, in file order.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let parsed: ProductCatalog = toml::from_str(toml_str)?;
        let (numbered, unnumbered): (Vec<Product>, Vec<Product>) =
            parsed.products.into_iter().partition(|p| p.id != 0);

        let mut catalog = ProductCatalog::new();
        for product in numbered {
            if catalog.get(product.id).is_some() {
                return Err(de::Error::custom(format!(
                    "duplicate product id {}",
                    product.id
                )));
            }
            catalog.products.push(product);
        }
        let mut next = 0;
        for mut product in unnumbered {
            next += 1;
            while catalog.get(next).is_some() {
                next += 1;
            }
            product.id = next;
            catalog.products.push(product);
        }
        Ok(catalog)
    }
}

/// Sum of stock across a set of products.
pub fn total_stock<'a>(products: impl IntoIterator<Item = &'a Product>) -> u64 {
    products.into_iter().map(|p| u64::from(p.count)).sum()
}
