use super::{models::ApiEnvelope, Endpoint, PutRequest, PutResponse};
use crate::error::Result;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 上传进度回调：`(已发送字节, 总字节)`，总量未知时为 `None`。
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// 与 Alist 服务通信的传输层。
///
/// 默认实现是 [`ReqwestTransport`](super::ReqwestTransport)；调度与认证逻辑只依赖该 trait，
/// 单测中可以替换为内存实现。
pub trait AlistTransport: Send + Sync {
    /// 发送 JSON 请求并解析统一响应结构。
    fn post_json<'a>(
        &'a self,
        endpoint: Endpoint,
        token: Option<&'a str>,
        payload: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<ApiEnvelope>>;

    /// 上传一个文件。非 2xx 状态通过 `PutResponse` 返回，只有请求本身失败
    /// （超时、断网、取消）才返回错误。
    fn put_file(
        &self,
        request: PutRequest,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<PutResponse>>;
}
