use super::{
    models::{LoginData, LoginRequest, PathRequest},
    path::join_remote_path,
    AlistTransport, Endpoint,
};
use crate::error::{Result, UploadError};
use crate::settings::UploaderConfig;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, info};

/// 一次批量上传期间使用的登录凭证，不持久化、不刷新。
#[derive(Clone)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}

/// 登录并校验上传根目录可访问；任一步失败都会在上传开始前终止本批次。
pub async fn authenticate(
    transport: &dyn AlistTransport,
    config: &UploaderConfig,
) -> Result<Session> {
    let credentials = config.credentials();
    let payload = serde_json::to_value(LoginRequest {
        username: &credentials.username,
        password: &credentials.password,
    })?;
    let envelope = transport
        .post_json(Endpoint::Login, None, &payload)
        .await
        .map_err(|e| UploadError::Auth(format!("login request failed: {e}")))?;
    if config.debug() {
        debug!(code = envelope.code, message = %envelope.message, "login response");
    }
    if !envelope.is_success() {
        return Err(UploadError::Auth(envelope.message));
    }

    let data: LoginData = envelope
        .data
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| UploadError::Auth(format!("malformed login response: {e}")))?
        .ok_or_else(|| UploadError::Auth("login response carried no token".to_string()))?;
    let session = Session::new(data.token);

    verify_root_folder(transport, config, &session).await?;
    Ok(session)
}

async fn verify_root_folder(
    transport: &dyn AlistTransport,
    config: &UploaderConfig,
    session: &Session,
) -> Result<()> {
    let payload = serde_json::to_value(PathRequest {
        path: config.root_folder(),
    })?;
    let envelope = transport
        .post_json(Endpoint::List, Some(session.token()), &payload)
        .await?;
    if config.debug() {
        debug!(
            code = envelope.code,
            message = %envelope.message,
            folder = config.root_folder(),
            "root folder listing"
        );
    }
    if !envelope.is_success() {
        return Err(UploadError::Directory(envelope.message));
    }
    Ok(())
}

/// 计算本批次的目标目录。开启时间戳目录时在根目录下新建 `YYYYMMDDHHMMSS` 子目录。
pub async fn resolve_folder(
    transport: &dyn AlistTransport,
    config: &UploaderConfig,
    session: &Session,
    now: DateTime<Utc>,
) -> Result<String> {
    if !config.create_timestamp_folder() {
        if config.debug() {
            debug!(
                folder = config.root_folder(),
                "timestamp folder disabled; uploading into the root folder"
            );
        }
        return Ok(config.root_folder().to_string());
    }

    let folder_name = timestamp_folder_name(now);
    let folder_path = join_remote_path(config.root_folder(), &folder_name);
    let payload = serde_json::to_value(PathRequest { path: &folder_path })?;
    let envelope = transport
        .post_json(Endpoint::Mkdir, Some(session.token()), &payload)
        .await?;
    if !envelope.is_success() {
        return Err(UploadError::FolderCreation(envelope.message));
    }
    info!(folder = %folder_path, "created timestamp folder for this batch");
    Ok(folder_path)
}

pub fn timestamp_folder_name(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiEnvelope;
    use crate::testing::MockTransport;
    use chrono::TimeZone;
    use serde_json::json;

    fn config() -> UploaderConfig {
        UploaderConfig::new("http://alist.local", "admin", "pw")
            .unwrap()
            .with_root_folder("/uploads")
    }

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap()
    }

    #[test]
    fn timestamp_name_is_fourteen_digits() {
        let name = timestamp_folder_name(fixed_clock());
        assert_eq!(name, "20240307090502");
        assert_eq!(name.len(), 14);
        assert!(name.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn login_then_lists_root_folder() {
        let transport = MockTransport::new();
        let session = authenticate(&transport, &config()).await.unwrap();
        assert_eq!(session.token(), MockTransport::TOKEN);

        let calls = transport.json_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].endpoint, Endpoint::Login);
        assert_eq!(calls[0].token, None);
        assert_eq!(calls[0].payload, json!({"Username": "admin", "Password": "pw"}));
        assert_eq!(calls[1].endpoint, Endpoint::List);
        assert_eq!(calls[1].token.as_deref(), Some(MockTransport::TOKEN));
        assert_eq!(calls[1].payload, json!({"path": "/uploads"}));
    }

    #[tokio::test]
    async fn rejected_login_is_auth_error() {
        let transport = MockTransport::new()
            .with_response(Endpoint::Login, ApiEnvelope::new(401, "bad password", None));
        let err = authenticate(&transport, &config()).await.unwrap_err();
        assert!(matches!(err, UploadError::Auth(message) if message == "bad password"));
        assert_eq!(transport.json_calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_token_is_auth_error() {
        let transport =
            MockTransport::new().with_response(Endpoint::Login, ApiEnvelope::success(None));
        assert!(matches!(
            authenticate(&transport, &config()).await,
            Err(UploadError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_login_is_auth_error() {
        let transport = MockTransport::new().with_json_failure(Endpoint::Login);
        let err = authenticate(&transport, &config()).await.unwrap_err();
        assert!(
            matches!(err, UploadError::Auth(ref message) if message.contains("connection refused"))
        );
        assert_eq!(transport.json_calls().len(), 1);
    }

    #[tokio::test]
    async fn malformed_login_data_is_auth_error() {
        let transport = MockTransport::new().with_response(
            Endpoint::Login,
            ApiEnvelope::success(Some(json!({"token": 42}))),
        );
        let err = authenticate(&transport, &config()).await.unwrap_err();
        assert!(
            matches!(err, UploadError::Auth(ref message) if message.starts_with("malformed login response"))
        );
    }

    #[tokio::test]
    async fn unlistable_root_is_directory_error() {
        let transport = MockTransport::new()
            .with_response(Endpoint::List, ApiEnvelope::new(500, "object not found", None));
        let err = authenticate(&transport, &config()).await.unwrap_err();
        assert!(matches!(err, UploadError::Directory(message) if message == "object not found"));
    }

    #[tokio::test]
    async fn root_folder_is_used_without_network_call() {
        let transport = MockTransport::new();
        let session = Session::new("t");
        let folder = resolve_folder(&transport, &config(), &session, fixed_clock())
            .await
            .unwrap();
        assert_eq!(folder, "/uploads");
        assert!(transport.json_calls().is_empty());
    }

    #[tokio::test]
    async fn timestamp_folder_is_created_under_root() {
        let transport = MockTransport::new();
        let session = Session::new("t");
        let config = config().with_timestamp_folder(true);
        let folder = resolve_folder(&transport, &config, &session, fixed_clock())
            .await
            .unwrap();
        assert_eq!(folder, "/uploads/20240307090502");

        let calls = transport.json_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].endpoint, Endpoint::Mkdir);
        assert_eq!(calls[0].payload, json!({"path": "/uploads/20240307090502"}));
    }

    #[tokio::test]
    async fn failed_mkdir_is_folder_creation_error() {
        let transport = MockTransport::new()
            .with_response(Endpoint::Mkdir, ApiEnvelope::new(403, "permission denied", None));
        let config = config().with_timestamp_folder(true);
        let err = resolve_folder(&transport, &config, &Session::new("t"), fixed_clock())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::FolderCreation(_)));
    }

    #[test]
    fn session_debug_hides_token() {
        let printed = format!("{:?}", Session::new("secret-token"));
        assert!(!printed.contains("secret-token"));
    }
}
