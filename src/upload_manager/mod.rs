pub mod core;
pub mod events;
pub mod progress;

pub use self::core::UploadManager;
pub use events::{EventBus, Listener};
pub use progress::{format_bytes, format_speed, FileProgress, ProgressEstimator, ProgressSnapshot};
