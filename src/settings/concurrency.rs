use crate::error::{Result, UploadError};

pub const MIN_CONCURRENCY: usize = 1;
pub const MAX_CONCURRENCY: usize = 256;
pub const DEFAULT_CONCURRENCY: usize = 1;

/// 并发上传数限定在 [MIN, MAX] 区间：0 或负数按 1 处理，过大的值收敛到上限。
pub fn normalize_concurrency(value: i64) -> usize {
    if value < MIN_CONCURRENCY as i64 {
        tracing::warn!(value, "concurrency limit below 1; falling back to 1");
        return MIN_CONCURRENCY;
    }
    let limit = usize::try_from(value).unwrap_or(usize::MAX);
    if limit > MAX_CONCURRENCY {
        tracing::warn!(value, max = MAX_CONCURRENCY, "concurrency limit too large; clamping");
    }
    limit.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

/// 从字符串解析并发数（命令行参数等场景），解析失败时报错，越界时收敛到区间内。
pub fn parse_concurrency(raw: &str) -> Result<usize> {
    let parsed = raw
        .trim()
        .parse::<i64>()
        .map_err(|e| UploadError::Config(format!("invalid concurrency value {raw:?}: {e}")))?;
    Ok(normalize_concurrency(parsed))
}
