pub mod client;
pub mod models;
pub mod path;
pub mod session;
pub mod transport;

pub use client::ReqwestTransport;
pub use models::{ApiEnvelope, PutRequest, PutResponse, UploadBody};
pub use session::{authenticate, resolve_folder, timestamp_folder_name, Session};
pub use transport::{AlistTransport, ProgressFn};

/// Alist 接口约定的成功状态码，响应体中的 `code` 与 HTTP 状态都使用该值。
pub const SUCCESS_CODE: i64 = 200;

pub const FILE_PATH_HEADER: &str = "File-Path";
pub const AS_TASK_HEADER: &str = "As-Task";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Login,
    List,
    Mkdir,
    FormUpload,
    StreamUpload,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Login => "/api/auth/login",
            Endpoint::List => "/api/fs/list",
            Endpoint::Mkdir => "/api/fs/mkdir",
            Endpoint::FormUpload => "/api/fs/form",
            Endpoint::StreamUpload => "/api/fs/put",
        }
    }
}
