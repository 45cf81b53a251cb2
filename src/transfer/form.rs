use super::{TransferContext, TransferOutcome, TransferStrategy};
use crate::api::{
    path::{encode_remote_path, join_remote_path},
    Endpoint, ProgressFn, PutRequest, Session, UploadBody, AS_TASK_HEADER,
};
use crate::error::{Result, UploadError};
use crate::file::UploadFile;
use crate::settings::TransferMode;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

const FORM_FIELD: &str = "file";

/// 表单上传：multipart 请求体，服务端作为后台任务处理。
pub struct FormTransfer {
    context: TransferContext,
}

impl FormTransfer {
    pub fn new(context: TransferContext) -> Self {
        Self { context }
    }
}

impl TransferStrategy for FormTransfer {
    fn mode(&self) -> TransferMode {
        TransferMode::Form
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
            let len = file.size().await.map_err(|source| UploadError::Read {
                file: name.to_string(),
                source,
            })?;
            let remote_path = encode_remote_path(&join_remote_path(destination, name));
            let request = PutRequest {
                endpoint: Endpoint::FormUpload,
                token: session.token().to_string(),
                file_name: name.to_string(),
                file_path: remote_path.clone(),
                headers: vec![(AS_TASK_HEADER, "true".to_string())],
                body: UploadBody::Multipart {
                    field: FORM_FIELD,
                    file: file.clone(),
                    len,
                },
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
