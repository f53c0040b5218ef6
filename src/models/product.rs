use serde::{Deserialize, Serialize};

/// An e-book in the catalog. Prices are whole currency units (IDR has no
/// minor unit in practice).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub original_price: i64,
    pub discount_price: i64,
    /// Image file name under the static directory
    pub image: String,
    /// Archive file name under the zip directory
    #[serde(skip_serializing)]
    pub zip_path: String,
    /// At most one product is flagged as the storefront offer
    pub is_offer: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for inserting a product. Catalog management itself lives outside
/// this service; this is used by dev seeding and tests.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProduct {
    pub title: String,
    pub description: String,
    pub original_price: i64,
    pub discount_price: i64,
    pub image: String,
    pub zip_path: String,
    #[serde(default)]
    pub is_offer: bool,
}

/// Product fields embedded in transaction listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: i64,
    pub title: String,
    pub image: String,
    pub original_price: i64,
    pub discount_price: i64,
    pub description: String,
}
