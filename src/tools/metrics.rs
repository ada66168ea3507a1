use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Receives one record per dispatched call.
pub trait MetricsSink: Send + Sync {
    fn record(&self, tool: &str, duration: Duration, success: bool);
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolStats {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub avg_ms: f64,
    pub total_ms: u64,
    pub max_ms: u64,
}

pub struct ToolMetrics {
    stats: Mutex<BTreeMap<String, ToolStats>>,
    slow_call_threshold: Duration,
}

impl ToolMetrics {
    pub fn new(slow_call_threshold: Duration) -> Self {
        Self {
            stats: Mutex::new(BTreeMap::new()),
            slow_call_threshold,
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, ToolStats> {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn get(&self, tool: &str) -> Option<ToolStats> {
        self.stats.lock().ok()?.get(tool).cloned()
    }
}

impl MetricsSink for ToolMetrics {
    fn record(&self, tool: &str, duration: Duration, success: bool) {
        let ms = duration.as_millis() as u64;
        if duration > self.slow_call_threshold {
            warn!(
                tool = %tool,
                duration_ms = ms,
                threshold_ms = self.slow_call_threshold.as_millis() as u64,
                "slow tool call"
            );
        }

        let Ok(mut stats) = self.stats.lock() else {
            return;
        };
        let entry = stats.entry(tool.to_string()).or_default();
        entry.calls += 1;
        if success {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
        entry.total_ms += ms;
        entry.max_ms = entry.max_ms.max(ms);
        entry.avg_ms = entry.total_ms as f64 / entry.calls as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average() {
        let metrics = ToolMetrics::new(Duration::from_secs(5));
        metrics.record("read_file", Duration::from_millis(10), true);
        metrics.record("read_file", Duration::from_millis(30), false);
        metrics.record("apply_diff", Duration::from_millis(7), true);

        let read = metrics.get("read_file").unwrap();
        assert_eq!(read.calls, 2);
        assert_eq!(read.successes, 1);
        assert_eq!(read.failures, 1);
        assert_eq!(read.max_ms, 30);
        assert!((read.avg_ms - 20.0).abs() < f64::EPSILON);

        let names: Vec<String> = metrics.snapshot().into_keys().collect();
        assert_eq!(names, vec!["apply_diff", "read_file"]);
    }

    #[test]
    fn test_slow_call_still_recorded() {
        let metrics = ToolMetrics::new(Duration::from_millis(1));
        metrics.record("perform_research", Duration::from_millis(50), true);
        assert_eq!(metrics.get("perform_research").unwrap().successes, 1);
    }
}
