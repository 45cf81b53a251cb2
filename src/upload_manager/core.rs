use super::{
    events::{recover_lock, EventBus, Listener},
    progress::{ProgressEstimator, ProgressSnapshot},
};
use crate::api::{authenticate, resolve_folder, AlistTransport, ProgressFn, ReqwestTransport, Session};
use crate::error::{Result, UploadError};
use crate::file::UploadFile;
use crate::settings::UploaderConfig;
use crate::transfer::{select_strategy, TransferContext, TransferOutcome, TransferStrategy};
use chrono::Utc;
use futures_util::FutureExt;
use std::{
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Instant,
};
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// 批量上传调度器：一次登录、一个目标目录，按并发上限同时上传多个文件。
///
/// 同一时间只允许一个批次；批次内单个文件失败不会影响其他文件。
#[derive(Clone)]
pub struct UploadManager {
    config: Arc<UploaderConfig>,
    transport: Arc<dyn AlistTransport>,
    strategy: Arc<dyn TransferStrategy>,
    events: Arc<EventBus>,
    progress: Arc<Mutex<ProgressEstimator>>,
    uploading: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
    next_transfer_id: Arc<AtomicU64>,
    current_transfer: Arc<Mutex<Option<TransferHandle>>>,
    admission: Arc<Mutex<Option<CancellationToken>>>,
}

/// 最近一次发起的上传请求，`abort_upload` 只能取消它。
#[derive(Clone)]
struct TransferHandle {
    id: u64,
    cancel: CancellationToken,
}

/// 批次结束（包括提前失败）时复位上传状态。
struct BatchGuard<'a> {
    manager: &'a UploadManager,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        recover_lock(&self.manager.admission).take();
        recover_lock(&self.manager.current_transfer).take();
        self.manager.uploading.store(false, Ordering::Release);
    }
}

impl UploadManager {
    pub fn new(config: UploaderConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: UploaderConfig, transport: Arc<dyn AlistTransport>) -> Self {
        let events = Arc::new(EventBus::new());
        let context = TransferContext::new(
            Arc::clone(&transport),
            Arc::clone(&events),
            config.service_base_url(),
            config.debug(),
        );
        let strategy = select_strategy(config.transfer_mode(), context);
        if config.debug() {
            debug!(config = ?config, "uploader configured");
        }
        Self {
            config: Arc::new(config),
            transport,
            strategy,
            events,
            progress: Arc::new(Mutex::new(ProgressEstimator::new())),
            uploading: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
            next_transfer_id: Arc::new(AtomicU64::new(0)),
            current_transfer: Arc::new(Mutex::new(None)),
            admission: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn on_progress(&self, listener: Listener<ProgressSnapshot>) -> bool {
        self.events.on_progress(listener)
    }

    pub fn off_progress(&self, listener: &Listener<ProgressSnapshot>) -> bool {
        self.events.off_progress(listener)
    }

    pub fn on_complete(&self, listener: Listener<bool>) -> bool {
        self.events.on_complete(listener)
    }

    pub fn off_complete(&self, listener: &Listener<bool>) -> bool {
        self.events.off_complete(listener)
    }

    pub fn on_error(&self, listener: Listener<UploadError>) -> bool {
        self.events.on_error(listener)
    }

    pub fn off_error(&self, listener: &Listener<UploadError>) -> bool {
        self.events.off_error(listener)
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::Acquire)
    }

    pub fn active_transfers(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn progress_snapshot(&self) -> ProgressSnapshot {
        recover_lock(&self.progress).snapshot()
    }

    /// 上传一批文件，返回本批次的目标目录。
    ///
    /// - 已有批次在进行时直接返回 `Ok(None)`，不会发起任何请求。
    /// - 空列表不登录，直接返回配置的根目录。
    /// - 登录、根目录校验、时间戳目录创建失败时返回错误；单文件失败只通过
    ///   `error` 事件上报，最终结果由 `complete` 事件给出。
    pub async fn upload_files(&self, files: Vec<UploadFile>) -> Result<Option<String>> {
        if self
            .uploading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("an upload batch is already running; ignoring new request");
            return Ok(None);
        }
        let _guard = BatchGuard { manager: self };

        if files.is_empty() {
            debug!("no files to upload");
            return Ok(Some(self.config.root_folder().to_string()));
        }

        let span = info_span!("upload_batch", batch = %Uuid::new_v4(), files = files.len());
        self.run_batch(files).instrument(span).await.map(Some)
    }

    /// 取消最近一次发起的上传请求，并停止放行本批次尚未开始的文件。
    /// 返回是否有可取消的内容。
    pub fn abort_upload(&self) -> bool {
        let admission_closed = match recover_lock(&self.admission).as_ref() {
            Some(admission) => {
                admission.cancel();
                true
            }
            None => false,
        };
        match recover_lock(&self.current_transfer).take() {
            Some(handle) => {
                handle.cancel.cancel();
                info!(transfer = handle.id, "upload cancelled");
                true
            }
            None if admission_closed => {
                info!("upload batch cancelled before any transfer started");
                true
            }
            None => {
                info!("no upload is currently running");
                false
            }
        }
    }

    async fn run_batch(&self, files: Vec<UploadFile>) -> Result<String> {
        let admission = CancellationToken::new();
        *recover_lock(&self.admission) = Some(admission.clone());

        let session = Arc::new(authenticate(self.transport.as_ref(), &self.config).await?);
        // 登录期间已被取消时不再创建时间戳目录，后续文件全部按取消处理。
        let destination: Arc<str> = if admission.is_cancelled() {
            info!("batch aborted during login; skipping folder creation");
            self.config.root_folder().into()
        } else {
            resolve_folder(self.transport.as_ref(), &self.config, &session, Utc::now())
                .await?
                .into()
        };
        info!(
            destination = %destination,
            mode = %self.strategy.mode(),
            concurrency = self.config.concurrency_limit(),
            "starting uploads"
        );

        {
            let mut progress = recover_lock(&self.progress);
            for file in &files {
                progress.forget(file.name());
            }
        }

        let slots = Arc::new(Semaphore::new(self.config.concurrency_limit()));
        let mut in_flight = JoinSet::new();
        let mut all_success = true;

        for file in files {
            let permit = tokio::select! {
                biased;
                _ = admission.cancelled() => None,
                permit = Arc::clone(&slots).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                let err = UploadError::Cancelled {
                    file: file.name().to_string(),
                };
                debug!(file = file.name(), "skipping queued file after abort");
                self.events.emit_error(&err);
                all_success = false;
                continue;
            };

            let manager = self.clone();
            let session = Arc::clone(&session);
            let destination = Arc::clone(&destination);
            in_flight.spawn(
                async move {
                    let outcome = manager.run_transfer(&session, &destination, file).await;
                    drop(permit);
                    outcome
                }
                .in_current_span(),
            );
        }

        while let Some(joined) = in_flight.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(error = %err, "upload task aborted");
                    TransferOutcome::failed("<unknown>")
                }
            };
            all_success = all_success && outcome.success;
        }

        if all_success {
            info!("all files uploaded");
        } else {
            warn!("some files failed to upload");
        }
        self.events.emit_complete(all_success);
        Ok(destination.to_string())
    }

    /// 执行单个文件的上传，任何错误或 panic 都转换为失败结果并发出 `error` 事件。
    async fn run_transfer(
        &self,
        session: &Session,
        destination: &str,
        file: UploadFile,
    ) -> TransferOutcome {
        let handle = TransferHandle {
            id: self.next_transfer_id.fetch_add(1, Ordering::Relaxed),
            cancel: CancellationToken::new(),
        };
        *recover_lock(&self.current_transfer) = Some(handle.clone());
        self.active.fetch_add(1, Ordering::AcqRel);
        if self.config.debug() {
            debug!(file = file.name(), transfer = handle.id, "upload started");
        }

        let progress = self.progress_callback(file.name());
        let result = AssertUnwindSafe(self.strategy.transfer(
            session,
            destination,
            &file,
            progress,
            handle.cancel.clone(),
        ))
        .catch_unwind()
        .await;

        self.active.fetch_sub(1, Ordering::AcqRel);
        {
            let mut current = recover_lock(&self.current_transfer);
            if current.as_ref().is_some_and(|c| c.id == handle.id) {
                current.take();
            }
        }

        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!(file = file.name(), error = %err, "upload failed");
                self.events.emit_error(&err);
                TransferOutcome::failed(file.name())
            }
            Err(_) => {
                let err = UploadError::Transfer {
                    file: file.name().to_string(),
                    reason: "upload task panicked".to_string(),
                };
                error!(file = file.name(), "upload task panicked");
                self.events.emit_error(&err);
                TransferOutcome::failed(file.name())
            }
        }
    }

    fn progress_callback(&self, file_name: &str) -> ProgressFn {
        let estimator = Arc::clone(&self.progress);
        let events = Arc::clone(&self.events);
        let debug = self.config.debug();
        let name = file_name.to_string();
        Arc::new(move |loaded, total| {
            let snapshot = {
                let mut estimator = recover_lock(&estimator);
                let Some(record) = estimator.observe(&name, loaded, total, Instant::now()) else {
                    return;
                };
                if debug {
                    debug!(
                        file = %name,
                        progress = %record.progress_text,
                        size = %record.size_text,
                        speed = %record.speed_text,
                        remaining_secs = record.estimated_remaining_secs,
                        elapsed_secs = record.elapsed_secs,
                        "upload progress"
                    );
                }
                estimator.snapshot()
            };
            events.emit_progress(&snapshot);
        })
    }
}
