use serde::Serialize;
use std::{collections::BTreeMap, time::Instant};

/// 指数移动平均的权重：旧速度占 0.8，新样本占 0.2。
const SPEED_DECAY: f64 = 0.8;
const SPEED_WEIGHT: f64 = 0.2;
/// 两次进度事件间隔的下限（秒），避免间隔过短时速度尖刺。
const MIN_SAMPLE_WINDOW_SECS: f64 = 1.0;

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// 所有已跟踪文件的进度快照，按文件名排序。
pub type ProgressSnapshot = BTreeMap<String, FileProgress>;

/// 单个文件的进度记录。首次收到该文件的进度事件时创建。
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProgress {
    #[serde(skip)]
    started_at: Instant,
    #[serde(skip)]
    last_observed_at: Instant,
    pub last_observed_bytes: u64,
    pub total_bytes: u64,
    /// 平滑后的速度（字节/秒）。
    pub smoothed_speed: f64,
    pub percent_complete: f64,
    pub estimated_remaining_secs: u64,
    pub elapsed_secs: u64,
    pub progress_text: String,
    pub speed_text: String,
    pub size_text: String,
}

impl FileProgress {
    fn new(now: Instant, total: u64) -> Self {
        Self {
            started_at: now,
            last_observed_at: now,
            last_observed_bytes: 0,
            total_bytes: total,
            smoothed_speed: 0.0,
            percent_complete: 0.0,
            estimated_remaining_secs: 0,
            elapsed_secs: 0,
            progress_text: format_percent(0.0),
            speed_text: format_speed(0.0),
            size_text: format_bytes(total as f64),
        }
    }

    fn update(&mut self, loaded: u64, total: u64, now: Instant) {
        let window = now
            .saturating_duration_since(self.last_observed_at)
            .as_secs_f64()
            .max(MIN_SAMPLE_WINDOW_SECS);
        let delta = loaded.saturating_sub(self.last_observed_bytes) as f64;
        let instantaneous = delta / window;
        self.smoothed_speed = self.smoothed_speed * SPEED_DECAY + instantaneous * SPEED_WEIGHT;

        let percent = if total == 0 {
            100.0
        } else {
            (loaded.min(total) as f64 / total as f64) * 100.0
        };
        let divisor = if self.smoothed_speed > 0.0 {
            self.smoothed_speed
        } else {
            1.0
        };
        let remaining = total.saturating_sub(loaded) as f64 / divisor;

        self.total_bytes = total;
        self.percent_complete = percent;
        self.progress_text = format_percent(percent);
        self.estimated_remaining_secs = remaining.ceil() as u64;
        self.elapsed_secs = now
            .saturating_duration_since(self.started_at)
            .as_secs_f64()
            .ceil() as u64;
        self.speed_text = format_speed(self.smoothed_speed);
        self.size_text = format_bytes(total as f64);
        self.last_observed_bytes = loaded;
        self.last_observed_at = now;
    }
}

/// 把原始字节进度换算成速度、剩余时间、百分比。
#[derive(Debug, Default)]
pub struct ProgressEstimator {
    records: ProgressSnapshot,
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次进度事件。总大小未知时丢弃该事件并返回 `None`。
    pub fn observe(
        &mut self,
        file: &str,
        loaded: u64,
        total: Option<u64>,
        now: Instant,
    ) -> Option<&FileProgress> {
        let total = total?;
        let record = self
            .records
            .entry(file.to_string())
            .or_insert_with(|| FileProgress::new(now, total));
        record.update(loaded, total, now);
        Some(record)
    }

    /// 新批次开始前清除同名文件的旧记录。
    pub fn forget(&mut self, file: &str) {
        self.records.remove(file);
    }

    pub fn get(&self, file: &str) -> Option<&FileProgress> {
        self.records.get(file)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.records.clone()
    }
}

pub fn format_bytes(bytes: f64) -> String {
    if bytes >= GIB {
        format!("{:.2} GB", bytes / GIB)
    } else if bytes >= MIB {
        format!("{:.2} MB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{:.2} KB", bytes / KIB)
    } else {
        format!("{bytes:.2} B")
    }
}

pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

fn format_percent(percent: f64) -> String {
    format!("{percent:.2}%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn unknown_length_is_dropped() {
        let mut estimator = ProgressEstimator::new();
        assert!(estimator
            .observe("a.bin", 100, None, Instant::now())
            .is_none());
        assert!(estimator.snapshot().is_empty());
    }

    #[test]
    fn smoothing_follows_the_moving_average() {
        let mut estimator = ProgressEstimator::new();
        let start = Instant::now();

        // 首个事件：间隔按 1 秒计算，速度 = 0.2 * 1000。
        let first = estimator
            .observe("a.bin", 1000, Some(10_000), start)
            .unwrap()
            .clone();
        assert!((first.smoothed_speed - 200.0).abs() < 1e-9);
        assert!((first.percent_complete - 10.0).abs() < 1e-9);
        assert_eq!(first.progress_text, "10.00%");
        assert_eq!(first.estimated_remaining_secs, 45);
        assert_eq!(first.speed_text, "200.00 B/s");
        assert_eq!(first.size_text, "9.77 KB");

        // 两秒后再发送 4000 字节：瞬时 2000 B/s。
        let second = estimator
            .observe("a.bin", 5000, Some(10_000), start + Duration::from_secs(2))
            .unwrap();
        assert!((second.smoothed_speed - (200.0 * 0.8 + 2000.0 * 0.2)).abs() < 1e-9);
        assert_eq!(second.elapsed_secs, 2);
        assert_eq!(second.last_observed_bytes, 5000);
    }

    #[test]
    fn short_intervals_use_one_second_floor() {
        let mut estimator = ProgressEstimator::new();
        let start = Instant::now();
        estimator.observe("a.bin", 0, Some(1000), start);
        let record = estimator
            .observe("a.bin", 500, Some(1000), start + Duration::from_millis(10))
            .unwrap();
        assert!((record.smoothed_speed - 100.0).abs() < 1e-9);
    }

    #[test]
    fn percent_is_monotonic_for_growing_bytes() {
        let mut estimator = ProgressEstimator::new();
        let start = Instant::now();
        let mut last = -1.0;
        for (i, loaded) in [0u64, 10, 10, 400, 999, 1000].into_iter().enumerate() {
            let record = estimator
                .observe(
                    "a.bin",
                    loaded,
                    Some(1000),
                    start + Duration::from_millis(300 * i as u64),
                )
                .unwrap();
            assert!(record.percent_complete >= last);
            last = record.percent_complete;
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn empty_file_counts_as_complete() {
        let mut estimator = ProgressEstimator::new();
        let record = estimator
            .observe("empty.txt", 0, Some(0), Instant::now())
            .unwrap();
        assert_eq!(record.percent_complete, 100.0);
        assert_eq!(record.estimated_remaining_secs, 0);
    }

    #[test]
    fn snapshot_contains_every_tracked_file() {
        let mut estimator = ProgressEstimator::new();
        let now = Instant::now();
        estimator.observe("b.bin", 1, Some(2), now);
        estimator.observe("a.bin", 1, Some(4), now);

        let snapshot = estimator.snapshot();
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["a.bin", "b.bin"]);

        estimator.forget("a.bin");
        assert!(estimator.get("a.bin").is_none());
        assert!(estimator.get("b.bin").is_some());
    }

    #[test]
    fn byte_units_step_at_1024() {
        assert_eq!(format_bytes(512.0), "512.00 B");
        assert_eq!(format_bytes(1024.0), "1.00 KB");
        assert_eq!(format_bytes(1536.0 * 1024.0), "1.50 MB");
        assert_eq!(format_speed(2.0 * GIB), "2.00 GB/s");
    }
}
