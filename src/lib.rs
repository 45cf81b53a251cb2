//! Alist 批量上传客户端。
//!
//! 一次登录、一个目标目录，按并发上限同时上传多个文件，并通过
//! `progress` / `complete` / `error` 三个事件向宿主程序报告进度与结果。

pub mod api;
pub mod error;
pub mod file;
pub mod logging;
pub mod settings;
pub mod transfer;
pub mod upload_manager;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{AlistTransport, ReqwestTransport, Session};
pub use error::{Result, UploadError};
pub use file::{FileSource, UploadFile};
pub use settings::{Credentials, TransferMode, UploaderConfig};
pub use transfer::{TransferOutcome, TransferStrategy};
pub use upload_manager::{EventBus, FileProgress, Listener, ProgressSnapshot, UploadManager};
