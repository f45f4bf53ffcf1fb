pub mod dispatcher;
pub mod rate_limiter;

pub use dispatcher::{DispatcherSettings, TranslationDispatcher};
pub use rate_limiter::RateLimiter;
