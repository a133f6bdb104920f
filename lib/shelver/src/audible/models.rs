use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use shared::catalog::{CatalogRecord, SeriesRef};

/// Cover sizes offered by the catalog, largest first.
const COVER_SIZES: &[&str] = &["2560", "1024", "500", "256", "128"];

#[derive(Debug, Deserialize)]
pub(crate) struct ProductsResponse {
    #[serde(default)]
    pub products: Value,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Product {
    pub asin: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    #[serde(default)]
    pub authors: Vec<Named>,
    #[serde(default)]
    pub narrators: Vec<Named>,
    #[serde(default)]
    pub series: Vec<ProductSeries>,
    pub release_date: Option<String>,
    pub runtime_length_min: Option<u32>,
    pub publisher_name: Option<String>,
    pub language: Option<String>,
    pub publisher_summary: Option<String>,
    #[serde(default)]
    pub product_images: HashMap<String, String>,
    #[serde(default)]
    pub categories: Vec<Named>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Named {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProductSeries {
    pub title: Option<String>,
    /// Sent as either a string or a number.
    pub sequence: Option<Value>,
}

fn names(list: Vec<Named>) -> Vec<String> {
    list.into_iter()
        .filter_map(|n| n.name)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

impl From<Product> for CatalogRecord {
    fn from(p: Product) -> Self {
        let cover_url = COVER_SIZES
            .iter()
            .find_map(|size| p.product_images.get(*size).cloned());
        let series = p
            .series
            .into_iter()
            .filter_map(|s| {
                let title = s.title?;
                let sequence = match s.sequence {
                    Some(Value::String(v)) if !v.trim().is_empty() => Some(v.trim().to_string()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                };
                Some(SeriesRef { title, sequence })
            })
            .collect();

        CatalogRecord {
            identifier: p.asin,
            title: p.title.unwrap_or_default(),
            subtitle: p.subtitle,
            authors: names(p.authors),
            narrators: names(p.narrators),
            series,
            release_date: p.release_date,
            genres: names(p.categories),
            runtime_minutes: p.runtime_length_min,
            publisher: p.publisher_name,
            language: p.language,
            description: p.publisher_summary,
            cover_url,
        }
    }
}

/// Parses the catalog's JSON output. `products` arrives either as a list or as
/// a map keyed by identifier.
pub(crate) fn parse_products(raw: &str) -> serde_json::Result<Vec<CatalogRecord>> {
    let response: ProductsResponse = serde_json::from_str(raw)?;
    let products: Vec<Product> = match response.products {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<serde_json::Result<_>>()?,
        Value::Object(map) => map
            .into_iter()
            .map(|(asin, value)| {
                let mut product: Product = serde_json::from_value(value)?;
                product.asin.get_or_insert(asin);
                Ok(product)
            })
            .collect::<serde_json::Result<_>>()?,
        _ => Vec::new(),
    };
    Ok(products
        .into_iter()
        .map(CatalogRecord::from)
        .filter(|r| !r.title.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_shaped_products() {
        let raw = r#"{
            "products": [{
                "asin": "B002V0QK4C",
                "title": "The Eye of the World",
                "authors": [{"name": "Robert Jordan"}],
                "narrators": [{"name": "Michael Kramer"}, {"name": "Kate Reading"}],
                "series": [{"title": "The Wheel of Time", "sequence": "1"}],
                "release_date": "2004-11-15",
                "runtime_length_min": 1790,
                "product_images": {"500": "https://img/500.jpg", "1024": "https://img/1024.jpg"},
                "categories": [{"name": "Fantasy"}]
            }]
        }"#;
        let records = parse_products(raw).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.primary_author(), Some("Robert Jordan"));
        assert_eq!(record.narrators.join(", "), "Michael Kramer, Kate Reading");
        assert_eq!(record.series[0].sequence.as_deref(), Some("1"));
        assert_eq!(record.cover_url.as_deref(), Some("https://img/1024.jpg"));
        assert_eq!(record.genres, vec!["Fantasy".to_string()]);
        assert_eq!(record.runtime_minutes, Some(1790));
    }

    #[test]
    fn parses_map_shaped_products_and_numeric_sequence() {
        let raw = r#"{"products": {"B0001": {"title": "Dune", "series": [{"title": "Dune", "sequence": 1}]}}}"#;
        let records = parse_products(raw).unwrap();
        assert_eq!(records[0].identifier.as_deref(), Some("B0001"));
        assert_eq!(records[0].series[0].sequence.as_deref(), Some("1"));
    }

    #[test]
    fn missing_products_is_empty() {
        assert!(parse_products("{}").unwrap().is_empty());
    }
}
