//! 单文件上传策略。表单上传与流式上传共用同一接口，上传器构造时选定其一。

mod form;
mod stream;

pub use form::FormTransfer;
pub use stream::StreamTransfer;

use crate::api::{AlistTransport, ProgressFn, PutResponse, Session};
use crate::error::{Result, UploadError};
use crate::file::UploadFile;
use crate::settings::TransferMode;
use crate::upload_manager::EventBus;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 单个文件的上传结果，与批次整体是否成功无关。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferOutcome {
    pub file: String,
    pub success: bool,
}

impl TransferOutcome {
    pub fn succeeded(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            success: true,
        }
    }

    pub fn failed(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            success: false,
        }
    }
}

pub trait TransferStrategy: Send + Sync {
    fn mode(&self) -> TransferMode;

    /// 上传一个文件。服务端拒绝（非 200）时发出 `error` 事件并返回失败结果；
    /// 读取失败、超时、断网、取消则返回错误，由调度器统一转成失败结果。
    fn transfer<'a>(
        &'a self,
        session: &'a Session,
        destination: &'a str,
        file: &'a UploadFile,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<TransferOutcome>>;
}

/// 两种策略共享的依赖。
#[derive(Clone)]
pub struct TransferContext {
    transport: Arc<dyn AlistTransport>,
    events: Arc<EventBus>,
    base_url: String,
    debug: bool,
}

impl TransferContext {
    pub fn new(
        transport: Arc<dyn AlistTransport>,
        events: Arc<EventBus>,
        base_url: impl Into<String>,
        debug: bool,
    ) -> Self {
        Self {
            transport,
            events,
            base_url: base_url.into(),
            debug,
        }
    }

    fn transport(&self) -> &dyn AlistTransport {
        self.transport.as_ref()
    }

    /// 根据响应得出单文件结果。
    fn settle(&self, file_name: &str, remote_path: &str, response: PutResponse) -> TransferOutcome {
        if response.is_success() {
            if self.debug {
                debug!(
                    file = file_name,
                    location = %format!("{}{}", self.base_url, remote_path),
                    "upload succeeded"
                );
            }
            return TransferOutcome::succeeded(file_name);
        }
        let err = UploadError::Transfer {
            file: file_name.to_string(),
            reason: response.failure_reason(),
        };
        warn!(file = file_name, error = %err, "server rejected upload");
        self.events.emit_error(&err);
        TransferOutcome::failed(file_name)
    }
}

pub fn select_strategy(mode: TransferMode, context: TransferContext) -> Arc<dyn TransferStrategy> {
    match mode {
        TransferMode::Form => Arc::new(FormTransfer::new(context)),
        TransferMode::Stream => Arc::new(StreamTransfer::new(context)),
    }
}
