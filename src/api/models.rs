use super::{Endpoint, SUCCESS_CODE};
use crate::file::UploadFile;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Alist 统一响应结构：`code` 为 200 表示成功，其余均视为失败并附带 `message`。
#[derive(Clone, Debug, Deserialize)]
pub struct ApiEnvelope {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ApiEnvelope {
    pub fn new(code: i64, message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn success(data: Option<serde_json::Value>) -> Self {
        Self::new(SUCCESS_CODE, "success", data)
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PathRequest<'a> {
    pub path: &'a str,
}

#[derive(Debug)]
pub enum UploadBody {
    /// 单个表单字段的 multipart 请求体，按块从文件源读取。
    Multipart {
        field: &'static str,
        file: UploadFile,
        len: u64,
    },
    /// 已整体读入内存的原始字节。
    Raw(Bytes),
}

impl UploadBody {
    pub fn content_len(&self) -> u64 {
        match self {
            UploadBody::Multipart { len, .. } => *len,
            UploadBody::Raw(bytes) => bytes.len() as u64,
        }
    }
}

/// 一次文件 PUT 请求。`file_path` 已经过逐段编码。
#[derive(Debug)]
pub struct PutRequest {
    pub endpoint: Endpoint,
    pub token: String,
    pub file_name: String,
    pub file_path: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: UploadBody,
}

#[derive(Clone, Debug)]
pub struct PutResponse {
    pub status: u16,
    pub reason: String,
    pub envelope: Option<ApiEnvelope>,
}

impl PutResponse {
    pub fn is_success(&self) -> bool {
        i64::from(self.status) == SUCCESS_CODE
            && self.envelope.as_ref().map_or(true, ApiEnvelope::is_success)
    }

    pub fn failure_reason(&self) -> String {
        match &self.envelope {
            Some(envelope) if !envelope.is_success() && !envelope.message.is_empty() => {
                format!("HTTP {} (code {}): {}", self.status, envelope.code, envelope.message)
            }
            _ if self.reason.is_empty() => format!("HTTP {}", self.status),
            _ => format!("HTTP {} {}", self.status, self.reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_alist_shape() {
        let envelope: ApiEnvelope = serde_json::from_str(
            r#"{"code":200,"message":"success","data":{"token":"abc"}}"#,
        )
        .unwrap();
        assert!(envelope.is_success());
        let data: LoginData = serde_json::from_value(envelope.data.unwrap()).unwrap();
        assert_eq!(data.token, "abc");
    }

    #[test]
    fn login_request_uses_pascal_case() {
        let body = serde_json::to_value(LoginRequest {
            username: "admin",
            password: "pw",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"Username": "admin", "Password": "pw"}));
    }

    #[test]
    fn put_response_checks_status_and_body_code() {
        let ok = PutResponse {
            status: 200,
            reason: "OK".into(),
            envelope: None,
        };
        assert!(ok.is_success());

        let rejected = PutResponse {
            status: 200,
            reason: "OK".into(),
            envelope: Some(ApiEnvelope::new(403, "permission denied", None)),
        };
        assert!(!rejected.is_success());
        assert_eq!(
            rejected.failure_reason(),
            "HTTP 200 (code 403): permission denied"
        );

        let server_error = PutResponse {
            status: 500,
            reason: "Internal Server Error".into(),
            envelope: None,
        };
        assert!(!server_error.is_success());
        assert_eq!(server_error.failure_reason(), "HTTP 500 Internal Server Error");
    }
}
