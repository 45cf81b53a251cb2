//! 上传流程中的错误类型。
//!
//! `Auth` / `Directory` / `FolderCreation` 会终止整个批次；单个文件的错误
//! （`Transfer`、`Read`、`Timeout`、`Network`、`Cancelled`）只通过 `error` 事件上报。

pub type Result<T> = std::result::Result<T, UploadError>;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("login failed: {0}")]
    Auth(String),

    #[error("root folder is not accessible: {0}")]
    Directory(String),

    #[error("failed to create upload folder: {0}")]
    FolderCreation(String),

    #[error("unsupported transfer mode: {0}")]
    UnsupportedMode(String),

    #[error("upload of {file} failed: {reason}")]
    Transfer { file: String, reason: String },

    #[error("failed to read {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("upload of {file} timed out")]
    Timeout { file: String },

    #[error("network error while uploading {file}: {reason}")]
    Network { file: String, reason: String },

    #[error("upload of {file} was cancelled")]
    Cancelled { file: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UploadError {
    /// 文件级错误对应的文件名；批次级错误返回 `None`。
    pub fn file_name(&self) -> Option<&str> {
        match self {
            UploadError::Transfer { file, .. }
            | UploadError::Read { file, .. }
            | UploadError::Timeout { file }
            | UploadError::Network { file, .. }
            | UploadError::Cancelled { file } => Some(file),
            _ => None,
        }
    }

    pub fn is_batch_fatal(&self) -> bool {
        self.file_name().is_none()
    }
}
