//! Locates the Next.js `__NEXT_DATA__` payload embedded in a product page
//! and deserializes the `props.pageProps.productData` object.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub const NEXT_DATA_START: &str = r#"<script id="__NEXT_DATA__" type="application/json">"#;
pub const NEXT_DATA_END: &str = "</script>";

const PRODUCT_DATA_PATH: [&str; 3] = ["props", "pageProps", "productData"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("__NEXT_DATA__ start marker not found in page")]
    MissingStartMarker,
    #[error("__NEXT_DATA__ end marker not found after start marker")]
    MissingEndMarker,
    #[error("embedded payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("embedded payload has no `{0}`")]
    MissingPath(String),
    #[error("productData has unexpected shape: {0}")]
    InvalidShape(#[source] serde_json::Error),
    #[error("{field} is not numeric: {value:?}")]
    InvalidId { field: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProductData {
    pub id: String,
    pub brand_id: String,
    pub brand_name: String,
    pub name: String,
    #[serde(default)]
    pub variants: Vec<RawVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawVariant {
    pub id: String,
    pub attributes: RawAttributes,
    #[serde(default)]
    pub medias: Vec<RawMedia>,
    #[serde(default)]
    pub prices: Vec<RawPriceTier>,
    #[serde(default)]
    pub availability: Vec<RawAvailability>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttributes {
    #[serde(default)]
    pub size: String,
    pub color_name: Option<String>,
    pub color_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMedia {
    pub media_type: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPriceTier {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub price: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAvailability {
    #[serde(default)]
    pub has_stock: bool,
}

/// Returns the text between the `__NEXT_DATA__` script tag and the first
/// `</script>` that follows it.
pub fn next_data_slice(html: &str) -> Result<&str, ExtractError> {
    let start = html
        .find(NEXT_DATA_START)
        .ok_or(ExtractError::MissingStartMarker)?
        + NEXT_DATA_START.len();
    let rest = &html[start..];
    let end = rest
        .find(NEXT_DATA_END)
        .ok_or(ExtractError::MissingEndMarker)?;
    Ok(&rest[..end])
}

pub fn extract_next_data(html: &str) -> Result<Value, ExtractError> {
    let raw = next_data_slice(html)?;
    serde_json::from_str(raw).map_err(ExtractError::InvalidJson)
}

pub fn extract_product_data(html: &str) -> Result<RawProductData, ExtractError> {
    let mut root = extract_next_data(html)?;
    let mut node = &mut root;
    for (depth, key) in PRODUCT_DATA_PATH.iter().enumerate() {
        node = node
            .get_mut(*key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ExtractError::MissingPath(PRODUCT_DATA_PATH[..=depth].join(".")))?;
    }
    serde_json::from_value(node.take()).map_err(ExtractError::InvalidShape)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn page_with(next_data: &Value) -> String {
        format!(
            "<html><head><title>x</title></head><body><div id=\"__next\"></div>{}{}{}<script src=\"/app.js\"></script></body></html>",
            NEXT_DATA_START, next_data, NEXT_DATA_END
        )
    }

    pub(crate) fn sample_product_data() -> Value {
        json!({
            "id": "881234567",
            "brandId": "BR4821",
            "brandName": "Acme",
            "name": "Zapatilla Urbana",
            "variants": [
                {
                    "id": "881234568",
                    "attributes": {"size": "40", "colorName": "Negro", "colorCode": "#000000"},
                    "medias": [
                        {"mediaType": "image", "url": "https://media.example/1.jpg"},
                        {"mediaType": "video", "url": "https://media.example/1.mp4"}
                    ],
                    "prices": [
                        {"type": "normalPrice", "price": ["100.00"]},
                        {"type": "internetPrice", "price": ["85.50"]}
                    ],
                    "availability": [{"hasStock": false}, {"hasStock": true}]
                },
                {
                    "id": "881234569",
                    "attributes": {"size": "41", "colorName": null, "colorCode": "#000000"},
                    "medias": [],
                    "prices": [{"type": "normalPrice", "price": ["99.90"]}],
                    "availability": [{"hasStock": false}]
                }
            ]
        })
    }

    #[test]
    fn extracts_product_data_from_page() {
        let html = page_with(&json!({"props": {"pageProps": {"productData": sample_product_data()}}}));
        let data = extract_product_data(&html).unwrap();
        assert_eq!(data.id, "881234567");
        assert_eq!(data.brand_id, "BR4821");
        assert_eq!(data.variants.len(), 2);
        assert_eq!(data.variants[0].prices[1].price, vec!["85.50".to_string()]);
        assert!(data.variants[1].attributes.color_name.is_none());
    }

    #[test]
    fn slice_stops_at_first_closing_script() {
        let html = page_with(&json!({"a": 1}));
        assert_eq!(next_data_slice(&html).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn missing_start_marker_is_an_error() {
        let err = extract_next_data("<html><body>no data</body></html>").unwrap_err();
        assert!(matches!(err, ExtractError::MissingStartMarker));
    }

    #[test]
    fn missing_end_marker_is_an_error() {
        let html = format!("<html>{}{{\"a\":1}}", NEXT_DATA_START);
        let err = extract_next_data(&html).unwrap_err();
        assert!(matches!(err, ExtractError::MissingEndMarker));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let html = format!("{}{{not json{}", NEXT_DATA_START, NEXT_DATA_END);
        let err = extract_next_data(&html).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidJson(_)));
    }

    #[test]
    fn missing_product_data_reports_path() {
        let html = page_with(&json!({"props": {"pageProps": {}}}));
        match extract_product_data(&html).unwrap_err() {
            ExtractError::MissingPath(path) => assert_eq!(path, "props.pageProps.productData"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
