use super::progress::ProgressSnapshot;
use crate::error::UploadError;
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::warn;

/// 事件监听器。以 `Arc` 指针判定是否为同一个监听器。
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Channel<T> {
    name: &'static str,
    listeners: Mutex<Vec<Listener<T>>>,
}

impl<T> Channel<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn subscribe(&self, listener: Listener<T>) -> bool {
        let mut listeners = recover_lock(&self.listeners);
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    fn unsubscribe(&self, listener: &Listener<T>) -> bool {
        let mut listeners = recover_lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// 按注册顺序同步派发；单个监听器 panic 不影响后续监听器。
    fn emit(&self, payload: &T) {
        // 先复制一份列表再派发，监听器内部可以安全地注册/注销。
        let listeners = recover_lock(&self.listeners).clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(payload))).is_err() {
                warn!(channel = self.name, "event listener panicked; continuing");
            }
        }
    }

    fn len(&self) -> usize {
        recover_lock(&self.listeners).len()
    }
}

/// 固定三个频道的进程内事件总线：`progress`、`complete`、`error`。
pub struct EventBus {
    progress: Channel<ProgressSnapshot>,
    complete: Channel<bool>,
    error: Channel<UploadError>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            progress: Channel::new("progress"),
            complete: Channel::new("complete"),
            error: Channel::new("error"),
        }
    }

    /// 重复注册同一个监听器不会生效，返回 `false`。
    pub fn on_progress(&self, listener: Listener<ProgressSnapshot>) -> bool {
        self.progress.subscribe(listener)
    }

    pub fn off_progress(&self, listener: &Listener<ProgressSnapshot>) -> bool {
        self.progress.unsubscribe(listener)
    }

    pub fn on_complete(&self, listener: Listener<bool>) -> bool {
        self.complete.subscribe(listener)
    }

    pub fn off_complete(&self, listener: &Listener<bool>) -> bool {
        self.complete.unsubscribe(listener)
    }

    pub fn on_error(&self, listener: Listener<UploadError>) -> bool {
        self.error.subscribe(listener)
    }

    pub fn off_error(&self, listener: &Listener<UploadError>) -> bool {
        self.error.unsubscribe(listener)
    }

    pub fn listener_counts(&self) -> (usize, usize, usize) {
        (self.progress.len(), self.complete.len(), self.error.len())
    }

    pub(crate) fn emit_progress(&self, snapshot: &ProgressSnapshot) {
        self.progress.emit(snapshot);
    }

    pub(crate) fn emit_complete(&self, success: bool) {
        self.complete.emit(&success);
    }

    pub(crate) fn emit_error(&self, error: &UploadError) {
        self.error.emit(error);
    }
}

pub(crate) fn recover_lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(g) => g,
        Err(poison) => poison.into_inner(),
    }
}
