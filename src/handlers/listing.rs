use serde_json::Value;

use crate::models::Product;

use super::{number_field, text_field, Pagination};

pub const NO_IMAGE: &str = "No Image";

/// One decoded page of the catalog listing API.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub products: Vec<Product>,
    /// Items dropped because they carried no product id.
    pub skipped: usize,
    pub pagination: Pagination,
}

impl ListingPage {
    pub fn parse(body: &Value, review_url_template: &str) -> Self {
        let result = body.get("result");
        let items = result
            .and_then(|r| r.get("items"))
            .and_then(|i| i.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut products = Vec::with_capacity(items.len());
        let mut skipped = 0;
        for item in items {
            match extract_product(item, review_url_template) {
                Some(p) => products.push(p),
                None => {
                    tracing::warn!("Listing item without productId; skipping");
                    skipped += 1;
                }
            }
        }
        Self { products, skipped, pagination: Pagination::from_result(result) }
    }
}

pub fn extract_product(item: &Value, review_url_template: &str) -> Option<Product> {
    let product_id = text_field(item, "productId").filter(|id| !id.is_empty())?;
    let rating = item.get("rating");
    Some(Product {
        url: review_url_template.replace("{product_id}", &product_id),
        item_name: text_field(item, "name"),
        color_names: item
            .get("colors")
            .and_then(|c| c.as_array())
            .into_iter()
            .flatten()
            .filter_map(|c| text_field(c, "name"))
            .collect(),
        rating: rating.and_then(|r| r.get("average")).and_then(number_field),
        review_count: rating
            .and_then(|r| r.get("count"))
            .and_then(number_field)
            .map(|c| c as i64),
        product_image: main_image(item).unwrap_or_else(|| NO_IMAGE.to_string()),
        price: current_price(item),
        product_id,
    })
}

/// Promo price wins over the base price.
fn current_price(item: &Value) -> Option<f64> {
    let prices = item.get("prices")?;
    let value_of = |kind: &str| prices.get(kind).and_then(|p| p.get("value")).and_then(number_field);
    value_of("promo").or_else(|| value_of("base"))
}

/// `images.main` is keyed by color code; the first entry's image is used.
fn main_image(item: &Value) -> Option<String> {
    item.get("images")?
        .get("main")?
        .as_object()?
        .values()
        .next()?
        .get("image")?
        .as_str()
        .map(str::to_string)
}
