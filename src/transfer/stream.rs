use super::{TransferContext, TransferOutcome, TransferStrategy};
use crate::api::{
    path::{encode_remote_path, join_remote_path},
    Endpoint, ProgressFn, PutRequest, Session, UploadBody, CONTENT_TYPE_HEADER, OCTET_STREAM,
};
use crate::error::{Result, UploadError};
use crate::file::UploadFile;
use crate::settings::TransferMode;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// 流式上传：先把整个文件读入内存，再以原始字节作为请求体。
pub struct StreamTransfer {
    context: TransferContext,
}

impl StreamTransfer {
    pub fn new(context: TransferContext) -> Self {
        Self { context }
    }
}

impl TransferStrategy for StreamTransfer {
    fn mode(&self) -> TransferMode {
        TransferMode::Stream
    }

    fn transfer<'a>(
        &'a self,
        session: &'a Session,
        destination: &'a str,
        file: &'a UploadFile,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<TransferOutcome>> {
        Box::pin(async move {
            let name = file.name();
            let content = file.read_all().await.map_err(|source| UploadError::Read {
                file: name.to_string(),
                source,
            })?;
            let remote_path = encode_remote_path(&join_remote_path(destination, name));
            let request = PutRequest {
                endpoint: Endpoint::StreamUpload,
                token: session.token().to_string(),
                file_name: name.to_string(),
                file_path: remote_path.clone(),
                headers: vec![(CONTENT_TYPE_HEADER, OCTET_STREAM.to_string())],
                body: UploadBody::Raw(content),
            };
            let response = self
                .context
                .transport()
                .put_file(request, progress, cancel)
                .await?;
            Ok(self.context.settle(name, &remote_path, response))
        })
    }
}
