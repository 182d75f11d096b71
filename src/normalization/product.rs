use crate::catalog::extract::{ExtractError, RawAttributes, RawProductData, RawVariant};
use crate::catalog::models::{Asset, Brand, Color, ScrapedProduct, ScrapedVariant};
use crate::normalization::price::{any_in_stock, min_price};

const BRAND_ID_PREFIX: &str = "BR";

fn parse_id(field: &'static str, raw: &str) -> Result<i64, ExtractError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ExtractError::InvalidId {
            field,
            value: raw.to_string(),
        })
}

/// Upstream brand IDs look like `BR4821`.
pub fn parse_brand_id(raw: &str) -> Result<i64, ExtractError> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix(BRAND_ID_PREFIX).unwrap_or(trimmed);
    parse_id("brandId", digits).map_err(|_| ExtractError::InvalidId {
        field: "brandId",
        value: raw.to_string(),
    })
}

/// Color is kept only when both name and code are present and non-empty.
pub fn color_of(attributes: &RawAttributes) -> Option<Color> {
    let name = attributes.color_name.as_deref().filter(|s| !s.is_empty())?;
    let code = attributes.color_code.as_deref().filter(|s| !s.is_empty())?;
    Some(Color {
        name: name.to_string(),
        code: code.to_string(),
    })
}

fn normalize_variant(variant: RawVariant, product_id: i64) -> Result<ScrapedVariant, ExtractError> {
    Ok(ScrapedVariant {
        id: parse_id("variant.id", &variant.id)?,
        color: color_of(&variant.attributes),
        size: variant.attributes.size,
        product_id,
        assets: variant
            .medias
            .into_iter()
            .map(|m| Asset {
                kind: m.media_type,
                url: m.url,
            })
            .collect(),
        price: min_price(&variant.prices),
        has_stock: any_in_stock(&variant.availability),
    })
}

/// Project the raw `productData` payload into the normalized record.
pub fn normalize_product(raw: RawProductData) -> Result<ScrapedProduct, ExtractError> {
    let brand = Brand {
        id: parse_brand_id(&raw.brand_id)?,
        name: raw.brand_name,
    };
    let id = parse_id("id", &raw.id)?;
    let variants = raw
        .variants
        .into_iter()
        .map(|v| normalize_variant(v, id))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ScrapedProduct {
        id,
        name: raw.name,
        brand_id: brand.id,
        brand,
        variants,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::extract::tests::sample_product_data;

    fn raw() -> RawProductData {
        serde_json::from_value(sample_product_data()).unwrap()
    }

    #[test]
    fn normalizes_sample_payload() {
        let product = normalize_product(raw()).unwrap();
        assert_eq!(product.id, 881234567);
        assert_eq!(product.brand_id, 4821);
        assert_eq!(product.brand.name, "Acme");
        assert_eq!(product.variants.len(), 2);

        let first = &product.variants[0];
        assert_eq!(first.id, 881234568);
        assert_eq!(first.product_id, 881234567);
        assert_eq!(first.price, Some(85.50));
        assert!(first.has_stock);
        assert_eq!(
            first.color,
            Some(Color {
                name: "Negro".into(),
                code: "#000000".into()
            })
        );
        assert_eq!(first.assets.len(), 2);
        assert_eq!(first.assets[1].kind, "video");
    }

    #[test]
    fn color_is_omitted_when_name_missing() {
        let product = normalize_product(raw()).unwrap();
        assert_eq!(product.variants[1].color, None);
        assert!(!product.variants[1].has_stock);
    }

    #[test]
    fn color_is_omitted_when_code_empty() {
        let attrs = RawAttributes {
            size: "M".into(),
            color_name: Some("Azul".into()),
            color_code: Some(String::new()),
        };
        assert_eq!(color_of(&attrs), None);
    }

    #[test]
    fn brand_prefix_is_stripped() {
        assert_eq!(parse_brand_id("BR123").unwrap(), 123);
        assert_eq!(parse_brand_id("77").unwrap(), 77);
        assert!(matches!(
            parse_brand_id("BRAND").unwrap_err(),
            ExtractError::InvalidId { field: "brandId", .. }
        ));
    }

    #[test]
    fn non_numeric_variant_id_fails() {
        let mut data = raw();
        data.variants[0].id = "abc".into();
        let err = normalize_product(data).unwrap_err();
        assert!(err.to_string().contains("variant.id"));
    }
}
