//! 单测共用的内存传输层。

use crate::api::{AlistTransport, ApiEnvelope, Endpoint, ProgressFn, PutRequest, PutResponse};
use crate::error::{Result, UploadError};
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub(crate) struct JsonCall {
    pub endpoint: Endpoint,
    pub token: Option<String>,
    pub payload: serde_json::Value,
}

#[derive(Clone, Debug)]
pub(crate) struct RecordedPut {
    pub endpoint: Endpoint,
    pub token: String,
    pub file_name: String,
    pub file_path: String,
    pub headers: Vec<(&'static str, String)>,
    pub multipart: bool,
    pub len: u64,
}

pub(crate) enum PutBehavior {
    Status(u16),
    Envelope(ApiEnvelope),
    Fail(fn(&str) -> UploadError),
}

pub(crate) struct MockTransport {
    responses: HashMap<Endpoint, ApiEnvelope>,
    json_failures: Vec<Endpoint>,
    put_behaviors: Mutex<HashMap<String, PutBehavior>>,
    json_calls: Mutex<Vec<JsonCall>>,
    puts: Mutex<Vec<RecordedPut>>,
}

impl MockTransport {
    pub const TOKEN: &'static str = "mock-token";

    pub fn new() -> Self {
        let mut responses = HashMap::new();
        responses.insert(
            Endpoint::Login,
            ApiEnvelope::success(Some(serde_json::json!({ "token": Self::TOKEN }))),
        );
        responses.insert(Endpoint::List, ApiEnvelope::success(None));
        responses.insert(Endpoint::Mkdir, ApiEnvelope::success(None));
        Self {
            responses,
            json_failures: Vec::new(),
            put_behaviors: Mutex::new(HashMap::new()),
            json_calls: Mutex::new(Vec::new()),
            puts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, endpoint: Endpoint, envelope: ApiEnvelope) -> Self {
        self.responses.insert(endpoint, envelope);
        self
    }

    /// 该接口的请求直接失败，模拟连接被拒绝。
    pub fn with_json_failure(mut self, endpoint: Endpoint) -> Self {
        self.json_failures.push(endpoint);
        self
    }

    pub fn with_put(self, file_name: &str, behavior: PutBehavior) -> Self {
        self.put_behaviors
            .lock()
            .unwrap()
            .insert(file_name.to_string(), behavior);
        self
    }

    pub fn json_calls(&self) -> Vec<JsonCall> {
        self.json_calls.lock().unwrap().clone()
    }

    pub fn puts(&self) -> Vec<RecordedPut> {
        self.puts.lock().unwrap().clone()
    }
}

impl AlistTransport for MockTransport {
    fn post_json<'a>(
        &'a self,
        endpoint: Endpoint,
        token: Option<&'a str>,
        payload: &'a serde_json::Value,
    ) -> BoxFuture<'a, Result<ApiEnvelope>> {
        Box::pin(async move {
            self.json_calls.lock().unwrap().push(JsonCall {
                endpoint,
                token: token.map(str::to_string),
                payload: payload.clone(),
            });
            if self.json_failures.contains(&endpoint) {
                return Err(UploadError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
            Ok(self
                .responses
                .get(&endpoint)
                .cloned()
                .unwrap_or_else(|| ApiEnvelope::success(None)))
        })
    }

    fn put_file(
        &self,
        request: PutRequest,
        progress: ProgressFn,
        _cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<PutResponse>> {
        Box::pin(async move {
            let len = request.body.content_len();
            self.puts.lock().unwrap().push(RecordedPut {
                endpoint: request.endpoint,
                token: request.token.clone(),
                file_name: request.file_name.clone(),
                file_path: request.file_path.clone(),
                headers: request.headers.clone(),
                multipart: matches!(request.body, crate::api::UploadBody::Multipart { .. }),
                len,
            });
            progress(len / 2, Some(len));
            progress(len, Some(len));

            let behaviors = self.put_behaviors.lock().unwrap();
            match behaviors.get(&request.file_name) {
                None => Ok(PutResponse {
                    status: 200,
                    reason: "OK".into(),
                    envelope: Some(ApiEnvelope::success(None)),
                }),
                Some(PutBehavior::Status(status)) => Ok(PutResponse {
                    status: *status,
                    reason: String::new(),
                    envelope: None,
                }),
                Some(PutBehavior::Envelope(envelope)) => Ok(PutResponse {
                    status: 200,
                    reason: "OK".into(),
                    envelope: Some(envelope.clone()),
                }),
                Some(PutBehavior::Fail(make)) => Err(make(&request.file_name)),
            }
        })
    }
}
