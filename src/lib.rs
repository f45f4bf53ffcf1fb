pub mod app;
pub mod cli;
pub mod clients;
pub mod config;
pub mod crawl;
pub mod handlers;
pub mod models;
pub mod persistence;
pub mod shutdown;
pub mod storage;
pub mod translation;

// Convenient re-exports for tests and external callers
pub use app::App;
pub use clients::*;
pub use config::*;
pub use crawl::{extract_product_id, fetch_page, with_pagination, CrawlSettings, ProductCrawler, ReviewCrawler};
pub use handlers::*;
pub use models::*;
pub use persistence::*;
pub use shutdown::Shutdown;
pub use storage::*;
pub use translation::*;
