// 進捗監視の具象実装

use crate::core::{ProgressReporter, TransformFailure};
use async_trait::async_trait;

/// コンソール出力による進捗報告実装
#[derive(Debug, Default, Clone)]
pub struct ConsoleProgressReporter {
    quiet: bool,
}

impl ConsoleProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quiet() -> Self {
        Self { quiet: true }
    }
}

#[async_trait]
impl ProgressReporter for ConsoleProgressReporter {
    async fn report_started(&self, total_tasks: usize) {
        if !self.quiet {
            println!("🚀 Starting {total_tasks} tasks...");
        }
    }

    async fn report_progress(&self, completed: usize, total: usize) {
        if !self.quiet && total > 0 && (completed % 100 == 0 || completed == total) {
            let percentage = (completed as f64 / total as f64) * 100.0;
            println!("📊 Progress: {completed}/{total} ({percentage:.1}%)");
        }
    }

    async fn report_error(&self, task_id: u64, error: &TransformFailure) {
        if !self.quiet {
            eprintln!("❌ Task {task_id} failed: {error}");
        }
    }

    async fn report_completed(&self, succeeded: usize, failed: usize) {
        if !self.quiet {
            println!("✅ Completed! Succeeded: {succeeded}, Failed: {failed}");
        }
    }
}

/// tracingのイベントとして進捗を出力する実装
#[derive(Debug, Default, Clone)]
pub struct TracingProgressReporter;

impl TracingProgressReporter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProgressReporter for TracingProgressReporter {
    async fn report_started(&self, total_tasks: usize) {
        tracing::info!(total_tasks, "engine run started");
    }

    async fn report_progress(&self, completed: usize, total: usize) {
        tracing::debug!(completed, total, "engine progress");
    }

    async fn report_error(&self, task_id: u64, error: &TransformFailure) {
        tracing::warn!(task_id, %error, "task failed");
    }

    async fn report_completed(&self, succeeded: usize, failed: usize) {
        tracing::info!(succeeded, failed, "engine run completed");
    }
}

/// 何もしない進捗報告実装（テスト・ベンチマーク用）
#[derive(Debug, Default, Clone)]
pub struct NoOpProgressReporter;

impl NoOpProgressReporter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProgressReporter for NoOpProgressReporter {
    async fn report_started(&self, _total_tasks: usize) {}

    async fn report_progress(&self, _completed: usize, _total: usize) {}

    async fn report_error(&self, _task_id: u64, _error: &TransformFailure) {}

    async fn report_completed(&self, _succeeded: usize, _failed: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_progress_reporter() {
        // 出力キャプチャは複雑なため、基本的な呼び出しテストのみ
        let reporter = ConsoleProgressReporter::quiet();

        reporter.report_started(100).await;
        reporter.report_progress(50, 100).await;
        reporter
            .report_error(3, &TransformFailure::failed("test error"))
            .await;
        reporter.report_completed(99, 1).await;
    }

    #[test]
    fn test_console_progress_reporter_creation() {
        assert!(!ConsoleProgressReporter::new().quiet);
        assert!(ConsoleProgressReporter::quiet().quiet);
    }

    #[tokio::test]
    async fn test_console_progress_handles_zero_total() {
        let reporter = ConsoleProgressReporter::new();
        // 0件でも割り算でパニックしない
        reporter.report_progress(0, 0).await;
    }

    #[tokio::test]
    async fn test_tracing_and_noop_reporters() {
        let failure = TransformFailure::panicked("boom");

        let tracing_reporter = TracingProgressReporter::new();
        tracing_reporter.report_started(2).await;
        tracing_reporter.report_error(1, &failure).await;
        tracing_reporter.report_completed(1, 1).await;

        let noop = NoOpProgressReporter::new();
        noop.report_started(2).await;
        noop.report_progress(1, 2).await;
        noop.report_error(1, &failure).await;
        noop.report_completed(1, 1).await;
    }
}
