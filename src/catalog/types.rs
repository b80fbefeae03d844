//! Storefront DTOs.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// A product as returned by `/api/products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    /// Category id or slug, depending on the backend's population settings.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default, alias = "countInStock")]
    pub stock: u32,
}

impl Product {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// A product category as returned by `/api/categories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Decode a listing that is either a bare array or an object wrapping the
/// array under `field` (`{"products": [...]}`).
pub(crate) fn decode_list<T: DeserializeOwned>(value: Value, field: &str) -> Result<Vec<T>> {
    match value {
        Value::Object(mut map) if map.contains_key(field) => {
            let items = map.remove(field).unwrap_or(Value::Null);
            Ok(serde_json::from_value(items)?)
        }
        other => Ok(serde_json::from_value(other)?),
    }
}

/// Decode a single document, unwrapping `{"<field>": {...}}` if present.
pub(crate) fn decode_one<T: DeserializeOwned>(value: Value, field: &str) -> Result<T> {
    match value {
        Value::Object(mut map) if map.get(field).is_some_and(Value::is_object) => {
            let item = map.remove(field).unwrap_or(Value::Null);
            Ok(serde_json::from_value(item)?)
        }
        other => Ok(serde_json::from_value(other)?),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn product_accepts_mongo_style_fields() {
        let product: Product = serde_json::from_value(json!({
            "_id": "p1",
            "name": "Rider Jacket",
            "price": 349.0,
            "countInStock": 4,
            "images": ["/img/rider.jpg"]
        }))
        .unwrap();
        assert_eq!(product.id, "p1");
        assert_eq!(product.stock, 4);
        assert!(product.in_stock());
        assert!(product.category.is_none());
    }

    #[test]
    fn list_bare_array_or_wrapped() {
        let bare: Vec<Category> =
            decode_list(json!([{"id": "c1", "name": "Jackets"}]), "categories").unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped: Vec<Category> = decode_list(
            json!({"categories": [{"id": "c1", "name": "Jackets", "slug": "jackets"}], "total": 1}),
            "categories",
        )
        .unwrap();
        assert_eq!(wrapped[0].slug, "jackets");
    }

    #[test]
    fn one_wrapped_or_bare() {
        let wrapped: Product =
            decode_one(json!({"product": {"id": "p1", "name": "Belt"}}), "product").unwrap();
        assert_eq!(wrapped.name, "Belt");

        let bare: Product = decode_one(json!({"id": "p2", "name": "Wallet"}), "product").unwrap();
        assert_eq!(bare.id, "p2");
    }

    #[test]
    fn malformed_listing_is_json_error() {
        let err = decode_list::<Product>(json!({"oops": true}), "products").unwrap_err();
        assert!(matches!(err, crate::SaddleryError::Json(_)));
    }
}
