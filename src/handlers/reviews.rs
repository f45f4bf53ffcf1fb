use serde_json::Value;

use crate::models::Review;

use super::{number_field, text_field, Pagination};

/// One decoded page of a product's review API.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPage {
    pub records: Vec<Value>,
    pub pagination: Pagination,
}

impl ReviewPage {
    pub fn parse(body: &Value) -> Self {
        let result = body.get("result");
        let records = result
            .and_then(|r| r.get("reviews"))
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();
        Self { records, pagination: Pagination::from_result(result) }
    }
}

/// Build a [`Review`] from one raw record. Records without a review id are dropped.
pub fn extract_review(raw: &Value, product_id: &str, scraped_time: i64) -> Option<Review> {
    let review_id = text_field(raw, "reviewId").filter(|id| !id.is_empty())?;
    Some(Review {
        review_id,
        product_id: product_id.to_string(),
        purchased_size: text_field(raw, "purchasedSize"),
        fit: text_field(raw, "fit"),
        gender: text_field(raw, "gender"),
        location: text_field(raw, "location"),
        age_range: text_field(raw, "ageRange"),
        height_range: text_field(raw, "heightRange"),
        weight_range: text_field(raw, "weightRange"),
        review_name: text_field(raw, "name"),
        title: text_field(raw, "title"),
        comment: text_field(raw, "comment"),
        translated_title: None,
        translated_comment: None,
        rate: raw.get("rate").and_then(number_field),
        created_date: text_field(raw, "createDate"),
        scraped_time,
        translated: false,
        translation_attempts: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_review_fields() {
        let raw = json!({
            "reviewId": 991,
            "purchasedSize": { "code": "004", "name": "L" },
            "comment": "着心地が良い",
            "fit": "ちょうどいい",
            "gender": { "name": "男性" },
            "location": "東京都",
            "name": "taro",
            "rate": 5,
            "title": "良い",
            "createDate": "2024-01-02T03:04:05Z",
            "ageRange": { "name": "30-39" }
        });
        let review = extract_review(&raw, "E1", 42).unwrap();
        assert_eq!(review.review_id, "991");
        assert_eq!(review.product_id, "E1");
        assert_eq!(review.purchased_size.as_deref(), Some("L"));
        assert_eq!(review.gender.as_deref(), Some("男性"));
        assert_eq!(review.review_name.as_deref(), Some("taro"));
        assert_eq!(review.age_range.as_deref(), Some("30-39"));
        assert_eq!(review.rate, Some(5.0));
        assert_eq!(review.scraped_time, 42);
        assert!(!review.translated);
        assert!(review.height_range.is_none());
    }

    #[test]
    fn record_without_id_is_dropped() {
        assert!(extract_review(&json!({ "title": "x" }), "E1", 0).is_none());
    }

    #[test]
    fn parses_page_and_pagination() {
        let body = json!({
            "result": {
                "reviews": [{ "reviewId": "a" }, { "reviewId": "b" }],
                "pagination": { "total": 12, "offset": 5, "count": 2 }
            }
        });
        let page = ReviewPage::parse(&body);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.pagination, Pagination { total: Some(12) });
    }
}
