pub mod concurrency;
pub mod config;

pub use concurrency::{
    normalize_concurrency, parse_concurrency, DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY,
};
pub use config::{Credentials, TransferMode, UploaderConfig};
