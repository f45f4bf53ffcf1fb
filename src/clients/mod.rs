pub mod transport;
pub mod translation;

pub use transport::*;
pub use translation::*;
