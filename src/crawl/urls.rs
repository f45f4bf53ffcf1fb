use url::Url;

use crate::models::Result;

/// The path segment after `products`, e.g. `E465185-000` in
/// `.../products/E465185-000/reviews?...`.
pub fn extract_product_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    segments.find(|s| *s == "products")?;
    segments.next().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Rewrite the `offset` and `limit` query parameters of an endpoint, keeping
/// every other parameter in place.
pub fn with_pagination(url: &str, offset: u64, limit: u64) -> Result<String> {
    let mut parsed = Url::parse(url)?;
    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    for (key, value) in [("offset", offset.to_string()), ("limit", limit.to_string())] {
        match pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value,
            None => pairs.push((key.to_string(), value)),
        }
    }

    parsed.query_pairs_mut().clear().extend_pairs(pairs.iter());
    Ok(parsed.into())
}
