use super::{
    models::ApiEnvelope, transport::ProgressFn, AlistTransport, Endpoint, PutRequest,
    PutResponse, UploadBody, FILE_PATH_HEADER,
};
use crate::error::{Result, UploadError};
use crate::file::chunked;
use crate::settings::UploaderConfig;
use bytes::Bytes;
use futures_util::{future::BoxFuture, Stream, StreamExt};
use reqwest::{
    header::{AUTHORIZATION, CONTENT_LENGTH},
    multipart::{Form, Part},
    redirect::Policy,
    Body, Client,
};
use std::{io, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// 登录、列目录、建目录等 JSON 接口的超时；上传请求使用配置中的超时。
const API_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// 构建统一的异步 HTTP 客户端。客户端本身不设整体超时，由各请求按需指定。
pub(crate) fn build_http_client() -> Result<Client> {
    let client = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(Policy::limited(10))
        .build()?;
    Ok(client)
}

/// 基于 reqwest 的默认传输层实现。
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    upload_timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new(config: &UploaderConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            base_url: config.service_base_url().to_string(),
            upload_timeout: config.request_timeout(),
        })
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

impl AlistTransport for ReqwestTransport {
    fn post_json<'a>(
        &'a self,
        endpoint: Endpoint,
        token: Option<&'a str>,
        payload: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<ApiEnvelope>> {
        Box::pin(async move {
            let mut request = self
                .client
                .post(self.url(endpoint))
                .timeout(API_TIMEOUT)
                .json(payload);
            if let Some(token) = token {
                request = request.header(AUTHORIZATION, token);
            }
            let envelope = request.send().await?.json::<ApiEnvelope>().await?;
            Ok(envelope)
        })
    }

    fn put_file(
        &self,
        request: PutRequest,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<PutResponse>> {
        Box::pin(async move {
            let PutRequest {
                endpoint,
                token,
                file_name,
                file_path,
                headers,
                body,
            } = request;

            let mut builder = self
                .client
                .put(self.url(endpoint))
                .header(AUTHORIZATION, token)
                .header(FILE_PATH_HEADER, file_path);
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            if let Some(timeout) = self.upload_timeout {
                builder = builder.timeout(timeout);
            }

            builder = match body {
                UploadBody::Raw(bytes) => {
                    let len = bytes.len() as u64;
                    builder
                        .header(CONTENT_LENGTH, len)
                        .body(Body::wrap_stream(with_progress(chunked(bytes), len, progress)))
                }
                UploadBody::Multipart { field, file, len } => {
                    let stream = file.open_stream().await.map_err(|source| UploadError::Read {
                        file: file_name.clone(),
                        source,
                    })?;
                    let part = Part::stream_with_length(
                        Body::wrap_stream(with_progress(stream, len, progress)),
                        len,
                    )
                    .file_name(file.name().to_string())
                    .mime_str(super::OCTET_STREAM)?;
                    builder.multipart(Form::new().part(field, part))
                }
            };

            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(UploadError::Cancelled { file: file_name });
                }
                sent = builder.send() => sent.map_err(|err| classify_send_error(&file_name, err))?,
            };

            let status = response.status();
            // 读不完响应体时无法确认服务端结果，按本文件失败处理。
            let text = match response.text().await {
                Ok(text) => text,
                Err(err) => {
                    warn!(
                        file = %file_name,
                        status = status.as_u16(),
                        error = %err,
                        "failed to read upload response"
                    );
                    return Err(classify_send_error(&file_name, err));
                }
            };
            // 响应体不是 JSON 时只看 HTTP 状态。
            Ok(PutResponse {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                envelope: serde_json::from_str(&text).ok(),
            })
        })
    }
}

/// 在请求体被读取时累加已发送字节并回调进度。
fn with_progress<S>(
    inner: S,
    total: u64,
    progress: ProgressFn,
) -> impl Stream<Item = io::Result<Bytes>> + Send + Sync + 'static
where
    S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
{
    let mut sent = 0u64;
    inner.map(move |chunk| {
        if let Ok(bytes) = &chunk {
            sent = sent.saturating_add(bytes.len() as u64);
            progress(sent, Some(total));
        }
        chunk
    })
}

fn classify_send_error(file_name: &str, err: reqwest::Error) -> UploadError {
    if err.is_timeout() {
        UploadError::Timeout {
            file: file_name.to_string(),
        }
    } else {
        UploadError::Network {
            file: file_name.to_string(),
            reason: err.to_string(),
        }
    }
}
