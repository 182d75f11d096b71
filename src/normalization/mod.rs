//! Projection of the raw storefront payload into catalog records.

pub mod price;
pub mod product;

pub use product::normalize_product;
