use tracing_subscriber::EnvFilter;

/// 初始化日志输出。`RUST_LOG` 优先；未设置时 `debug` 打开本库的调试日志。
pub fn init(debug: bool) {
    let default_filter = if debug {
        "info,alist_uploader=debug"
    } else {
        "info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .try_init();
}
