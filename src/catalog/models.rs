use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Brand row, keyed by the upstream numeric brand ID (`BR` prefix stripped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub brand_id: i64,
    pub name: String,
    #[serde(default)]
    pub is_deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: i64,
    pub product_id: i64,
    pub size: String,
    pub color: Option<Color>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub is_deprecated: bool,
}

/// One row of the append-only price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceObservation {
    pub id: String,
    pub variant_id: i64,
    pub price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub in_stock: bool,
}

/// A variant as projected from the product page, before it is split into
/// a `Variant` row and a `PriceObservation` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedVariant {
    pub id: i64,
    pub size: String,
    pub product_id: i64,
    pub color: Option<Color>,
    pub assets: Vec<Asset>,
    /// Lowest price across every listed tier; `None` when no tier parsed.
    pub price: Option<f64>,
    pub has_stock: bool,
}

impl ScrapedVariant {
    pub fn to_variant(&self) -> Variant {
        Variant {
            id: self.id,
            product_id: self.product_id,
            size: self.size.clone(),
            color: self.color.clone(),
            assets: self.assets.clone(),
            is_deprecated: false,
        }
    }
}

/// Normalized product record: the unit the reconciler works on and the body
/// returned by `/read` (and each element of `/pop`'s `data`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedProduct {
    pub id: i64,
    pub name: String,
    pub brand_id: i64,
    pub brand: Brand,
    pub variants: Vec<ScrapedVariant>,
}

impl ScrapedProduct {
    pub fn product(&self) -> Product {
        Product {
            id: self.id,
            brand_id: self.brand_id,
            name: self.name.clone(),
            is_deprecated: false,
        }
    }

    pub fn variant_rows(&self) -> Vec<Variant> {
        self.variants.iter().map(ScrapedVariant::to_variant).collect()
    }
}

/// Variant plus its price history, newest observation first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantHistory {
    #[serde(flatten)]
    pub variant: Variant,
    pub prices: Vec<PriceObservation>,
}

/// Stored product with its brand and variants, as listed by `GET /products`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub product: Product,
    pub brand: Option<Brand>,
    pub variants: Vec<VariantHistory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scraped_product_serializes_camel_case() {
        let product = ScrapedProduct {
            id: 881,
            name: "Zapatilla".into(),
            brand_id: 42,
            brand: Brand {
                id: 42,
                name: "Acme".into(),
            },
            variants: vec![ScrapedVariant {
                id: 9001,
                size: "40".into(),
                product_id: 881,
                color: None,
                assets: vec![Asset {
                    kind: "image".into(),
                    url: "https://cdn.example/a.jpg".into(),
                }],
                price: Some(85.5),
                has_stock: true,
            }],
        };

        let v = serde_json::to_value(&product).unwrap();
        assert_eq!(v["brandId"], 42);
        assert_eq!(v["variants"][0]["productId"], 881);
        assert_eq!(v["variants"][0]["hasStock"], true);
        assert_eq!(v["variants"][0]["assets"][0]["type"], "image");
        assert!(v["variants"][0]["color"].is_null());
    }

    #[test]
    fn variant_rows_carry_parent_product() {
        let product = ScrapedProduct {
            id: 1,
            name: "P".into(),
            brand_id: 2,
            brand: Brand {
                id: 2,
                name: "B".into(),
            },
            variants: vec![ScrapedVariant {
                id: 3,
                size: "M".into(),
                product_id: 1,
                color: Some(Color {
                    name: "Rojo".into(),
                    code: "#ff0000".into(),
                }),
                assets: Vec::new(),
                price: None,
                has_stock: false,
            }],
        };

        let rows = product.variant_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].product_id, 1);
        assert!(!rows[0].is_deprecated);
        assert_eq!(product.product().brand_id, 2);
    }
}
