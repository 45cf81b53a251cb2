use super::concurrency::{normalize_concurrency, DEFAULT_CONCURRENCY};
use crate::api::path::normalize_folder;
use crate::error::{Result, UploadError};
use serde::Deserialize;
use std::{fmt, path::Path, str::FromStr, time::Duration};
use url::Url;

/// 上传方式：表单上传（`/api/fs/form`）或流式上传（`/api/fs/put`）。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransferMode {
    Form,
    #[default]
    Stream,
}

impl FromStr for TransferMode {
    type Err = UploadError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "form" => Ok(TransferMode::Form),
            "stream" => Ok(TransferMode::Stream),
            _ => Err(UploadError::UnsupportedMode(raw.to_string())),
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Form => f.write_str("form"),
            TransferMode::Stream => f.write_str("stream"),
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"******")
            .finish()
    }
}

/// 上传器配置。交给 `UploadManager` 之后不再变化。
#[derive(Clone, Debug)]
pub struct UploaderConfig {
    service_base_url: String,
    credentials: Credentials,
    root_folder: String,
    create_timestamp_folder: bool,
    transfer_mode: TransferMode,
    concurrency_limit: usize,
    debug: bool,
    request_timeout: Option<Duration>,
}

/// JSON 配置的原始形态，字段名沿用宿主侧的 camelCase 习惯。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(alias = "baseUrl")]
    service_base_url: String,
    username: String,
    password: String,
    #[serde(default, alias = "uploadRootFolder")]
    root_folder: String,
    #[serde(default)]
    create_timestamp_folder: bool,
    #[serde(default, alias = "uploadMethod")]
    transfer_mode: Option<String>,
    #[serde(default, alias = "concurrency")]
    concurrency_limit: Option<i64>,
    #[serde(default, alias = "debugLogging")]
    debug: bool,
    #[serde(default)]
    request_timeout_secs: Option<u64>,
}

impl UploaderConfig {
    pub fn new(
        service_base_url: impl AsRef<str>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            service_base_url: normalize_base_url(service_base_url.as_ref())?,
            credentials: Credentials {
                username: username.into(),
                password: password.into(),
            },
            root_folder: normalize_folder(""),
            create_timestamp_folder: false,
            transfer_mode: TransferMode::default(),
            concurrency_limit: DEFAULT_CONCURRENCY,
            debug: false,
            request_timeout: None,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(raw)?;
        let mut config = Self::new(&raw.service_base_url, raw.username, raw.password)?
            .with_root_folder(&raw.root_folder)
            .with_timestamp_folder(raw.create_timestamp_folder)
            .with_debug(raw.debug);
        if let Some(mode) = raw.transfer_mode {
            config = config.with_transfer_mode(mode.parse()?);
        }
        if let Some(limit) = raw.concurrency_limit {
            config = config.with_concurrency_limit(limit);
        }
        if let Some(secs) = raw.request_timeout_secs.filter(|secs| *secs > 0) {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn with_service_base_url(mut self, url: &str) -> Result<Self> {
        self.service_base_url = normalize_base_url(url)?;
        Ok(self)
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.credentials.username = username.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.credentials.password = password.into();
        self
    }

    pub fn with_root_folder(mut self, folder: &str) -> Self {
        self.root_folder = normalize_folder(folder);
        self
    }

    pub fn with_timestamp_folder(mut self, enabled: bool) -> Self {
        self.create_timestamp_folder = enabled;
        self
    }

    pub fn with_transfer_mode(mut self, mode: TransferMode) -> Self {
        self.transfer_mode = mode;
        self
    }

    pub fn with_concurrency_limit(mut self, limit: i64) -> Self {
        self.concurrency_limit = normalize_concurrency(limit);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn service_base_url(&self) -> &str {
        &self.service_base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn root_folder(&self) -> &str {
        &self.root_folder
    }

    pub fn create_timestamp_folder(&self) -> bool {
        self.create_timestamp_folder
    }

    pub fn transfer_mode(&self) -> TransferMode {
        self.transfer_mode
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }
}

/// 校验服务地址并去掉末尾的 `/`，后续拼接接口路径时不必再处理。
fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed)
        .map_err(|e| UploadError::Config(format!("invalid service url {trimmed:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UploadError::Config(format!(
            "service url must use http or https, got {}",
            url.scheme()
        )));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}
