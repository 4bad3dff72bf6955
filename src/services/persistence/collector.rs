// Collector - 結果収集と保存機能

use crate::core::{ProgressReporter, ResultSink, TaskResult};
use crate::sync::ChannelReceiver;
use anyhow::Result;
use std::sync::Arc;

/// 収集結果の集計
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorReport<U> {
    pub results: Vec<TaskResult<U>>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Collector: 出力チャンネルをストリーム終端まで排出し、成功結果をバッチで保存する
pub fn spawn_result_collector<U, R, S>(
    results: ChannelReceiver<TaskResult<U>>,
    total_tasks: usize,
    reporter: Arc<R>,
    sink: Arc<S>,
    batch_size: usize,
) -> tokio::task::JoinHandle<Result<CollectorReport<U>>>
where
    U: Clone + Send + Sync + 'static,
    R: ProgressReporter + ?Sized + 'static,
    S: ResultSink<U> + ?Sized + 'static,
{
    tokio::spawn(async move {
        let batch_size = batch_size.max(1);
        let mut batch = Vec::with_capacity(batch_size);
        let mut collected = Vec::with_capacity(total_tasks);
        let mut succeeded = 0;
        let mut failed = 0;

        while let Some(result) = results.receive().await {
            match (&result.value, &result.err) {
                (_, Some(error)) => {
                    reporter.report_error(result.task_id, error).await;
                    failed += 1;
                }
                (Some(value), None) => {
                    batch.push((result.task_id, value.clone()));
                    succeeded += 1;

                    // バッチ保存
                    if batch.len() >= batch_size {
                        sink.store_batch(&batch).await?;
                        batch.clear();
                    }
                }
                (None, None) => {
                    tracing::warn!(task_id = result.task_id, "result without value or error");
                    failed += 1;
                }
            }
            collected.push(result);

            // 進捗報告
            reporter.report_progress(succeeded + failed, total_tasks).await;
        }

        // 残りバッチの保存
        if !batch.is_empty() {
            sink.store_batch(&batch).await?;
        }

        tracing::debug!(succeeded, failed, "result collector drained output");
        Ok(CollectorReport {
            results: collected,
            succeeded,
            failed,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::MockProgressReporter;
    use crate::core::TransformFailure;
    use crate::services::monitoring::NoOpProgressReporter;
    use crate::services::persistence::MemoryResultSink;
    use crate::sync::BoundedChannel;

    #[tokio::test]
    async fn test_result_collector_processes_success_results() {
        let (tx, rx) = BoundedChannel::new(10).split();
        let sink = MemoryResultSink::new();

        let collector = spawn_result_collector(
            rx,
            3,
            Arc::new(NoOpProgressReporter::new()),
            Arc::new(sink.clone()),
            2, // バッチサイズ
        );

        for i in 0..3u64 {
            tx.send(TaskResult::success(i, i * 10)).await.unwrap();
        }
        tx.close().unwrap();

        let report = collector.await.unwrap().unwrap();
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.results.len(), 3);

        // 2 + 1 のバッチに分かれる
        assert_eq!(sink.batch_count(), 2);
        assert_eq!(sink.stored_count(), 3);
        assert_eq!(sink.get(2), Some(20));
    }

    #[tokio::test]
    async fn test_result_collector_reports_failures() {
        let (tx, rx) = BoundedChannel::new(10).split();
        let sink = MemoryResultSink::<u64>::new();

        let mut reporter = MockProgressReporter::new();
        reporter
            .expect_report_error()
            .withf(|task_id, _| *task_id == 2)
            .times(1)
            .returning(|_, _| ());
        reporter
            .expect_report_progress()
            .times(2)
            .returning(|_, _| ());

        let collector =
            spawn_result_collector(rx, 2, Arc::new(reporter), Arc::new(sink.clone()), 10);

        tx.send(TaskResult::success(1, 1)).await.unwrap();
        tx.send(TaskResult::failure(2, TransformFailure::failed("load failed")))
            .await
            .unwrap();
        tx.close().unwrap();

        let report = collector.await.unwrap().unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(sink.stored_count(), 1);
    }

    #[tokio::test]
    async fn test_result_collector_empty_stream() {
        let (tx, rx) = BoundedChannel::<TaskResult<u8>>::new(1).split();
        tx.close().unwrap();

        let sink = MemoryResultSink::new();
        let report = spawn_result_collector(
            rx,
            0,
            Arc::new(NoOpProgressReporter::new()),
            Arc::new(sink.clone()),
            5,
        )
        .await
        .unwrap()
        .unwrap();

        assert!(report.results.is_empty());
        assert_eq!(sink.batch_count(), 0);
    }
}
