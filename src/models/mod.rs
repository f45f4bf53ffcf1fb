pub mod product;
pub mod review;
pub mod crawl;

pub use product::*;
pub use review::*;
pub use crawl::*;

/// Anything the crawl stage hands to the persistence merger.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawledEntity {
    Product(Product),
    Review(Review),
}

#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("BSON encode error: {0}")]
    BsonEncode(#[from] bson::ser::Error),

    #[error("BSON decode error: {0}")]
    BsonDecode(#[from] bson::de::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("URL not allowed: {0}")]
    Disallowed(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Current wall-clock time as epoch seconds.
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}
