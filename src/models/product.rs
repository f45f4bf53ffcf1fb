use bson::{doc, Document};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    pub date: i64,
    pub price: f64,
}

/// A product as it appears on one listing page. `price` is the price in
/// effect at scrape time (promo if present, otherwise base).
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub product_id: String,
    pub item_name: Option<String>,
    pub color_names: Vec<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub product_image: String,
    pub url: String,
    pub price: Option<f64>,
}

impl Product {
    /// Fields overwritten on every crawl. Price history is handled separately.
    pub fn descriptive_fields(&self) -> Document {
        doc! {
            "item_name": self.item_name.clone(),
            "color_names": self.color_names.clone(),
            "rating": self.rating,
            "review_count": self.review_count,
            "product_image": self.product_image.clone(),
            "url": self.url.clone(),
        }
    }
}

/// Stored form of a product, carrying the append-only price history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductDocument {
    pub product_id: String,
    pub item_name: Option<String>,
    #[serde(default)]
    pub color_names: Vec<String>,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub product_image: String,
    pub url: String,
    #[serde(default)]
    pub prices: Vec<PricePoint>,
}

impl ProductDocument {
    pub fn first_sighting(product: &Product, now: i64) -> Self {
        Self {
            product_id: product.product_id.clone(),
            item_name: product.item_name.clone(),
            color_names: product.color_names.clone(),
            rating: product.rating,
            review_count: product.review_count,
            product_image: product.product_image.clone(),
            url: product.url.clone(),
            prices: product
                .price
                .map(|price| vec![PricePoint { date: now, price }])
                .unwrap_or_default(),
        }
    }

    pub fn last_price(&self) -> Option<&PricePoint> {
        self.prices.last()
    }
}

/// Decide whether a freshly scraped price extends the history.
///
/// An entry is produced for an empty history, or when the price differs from
/// the last entry and at least `min_interval` seconds have passed since it.
pub fn next_price_point(
    history: &[PricePoint],
    price: Option<f64>,
    now: i64,
    min_interval: i64,
) -> Option<PricePoint> {
    let price = price?;
    match history.last() {
        None => Some(PricePoint { date: now, price }),
        Some(last) if last.price != price && now - last.date >= min_interval => {
            Some(PricePoint { date: now, price })
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 86_400;

    fn history() -> Vec<PricePoint> {
        vec![PricePoint { date: 1_000, price: 1990.0 }]
    }

    #[test]
    fn unchanged_price_never_appends() {
        assert_eq!(next_price_point(&history(), Some(1990.0), 1_000 + 10 * DAY, DAY), None);
    }

    #[test]
    fn changed_price_inside_interval_is_ignored() {
        assert_eq!(next_price_point(&history(), Some(1490.0), 1_000 + DAY - 1, DAY), None);
    }

    #[test]
    fn changed_price_after_interval_appends() {
        let next = next_price_point(&history(), Some(1490.0), 1_000 + DAY, DAY);
        assert_eq!(next, Some(PricePoint { date: 1_000 + DAY, price: 1490.0 }));
    }

    #[test]
    fn missing_price_or_empty_history() {
        assert_eq!(next_price_point(&history(), None, 1_000 + 2 * DAY, DAY), None);
        assert_eq!(
            next_price_point(&[], Some(990.0), 5, DAY),
            Some(PricePoint { date: 5, price: 990.0 })
        );
    }

    #[test]
    fn first_sighting_normalizes_scalar_price() {
        let product = Product {
            product_id: "E123".into(),
            item_name: Some("Tee".into()),
            color_names: vec!["WHITE".into()],
            rating: Some(4.5),
            review_count: Some(12),
            product_image: "https://img/tee.jpg".into(),
            url: "https://shop/api/products/E123/reviews".into(),
            price: Some(1500.0),
        };
        let stored = ProductDocument::first_sighting(&product, 42);
        assert_eq!(stored.prices, vec![PricePoint { date: 42, price: 1500.0 }]);

        let no_price = ProductDocument::first_sighting(&Product { price: None, ..product }, 42);
        assert!(no_price.prices.is_empty());
    }
}
