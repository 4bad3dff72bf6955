// TaskEngine - 依存性注入によるタスク実行エンジン
// 変換・設定・進捗報告・結果シンクをコンストラクタで受け取る

use super::{pool::WorkerPool, producer::spawn_producer};
use crate::{
    core::{
        EngineConfig, EngineError, EngineResult, EngineSummary, ProgressReporter, ResultSink, Task,
        TaskResult, TaskTransform,
    },
    services::{config::validate_config, monitoring::NoOpProgressReporter, spawn_result_collector},
    sync::CancellationSignal,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// 1回の実行の結果
#[derive(Debug, Clone)]
pub struct EngineRun<U> {
    pub summary: EngineSummary,
    pub results: Vec<TaskResult<U>>,
}

/// 依存性注入によるタスク実行エンジン
///
/// 1回の `execute` ごとにワーカープールを組み立て、投入・変換・収集を並行に走らせる。
/// キャンセルシグナルはエンジンの全実行で共有され、一度発火すると戻らない。
pub struct TaskEngine<X, C, R, S> {
    transform: Arc<X>,
    config: Arc<C>,
    reporter: Arc<R>,
    sink: Arc<S>,
    cancellation: CancellationSignal,
}

impl<X, C, R, S> TaskEngine<X, C, R, S>
where
    X: TaskTransform,
    X::Output: Clone + Sync,
    C: EngineConfig,
    R: ProgressReporter + 'static,
    S: ResultSink<X::Output> + 'static,
{
    pub fn new(transform: X, config: C, reporter: R, sink: S) -> Self {
        Self {
            transform: Arc::new(transform),
            config: Arc::new(config),
            reporter: Arc::new(reporter),
            sink: Arc::new(sink),
            cancellation: CancellationSignal::new(),
        }
    }

    /// 外部のキャンセルシグナルを共有する
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = signal;
        self
    }

    /// タスク一覧を並列に実行し、全結果とサマリーを返す
    ///
    /// キャンセルされた場合も、それまでに生成された結果は返る。
    /// 結果が届かなかったタスクは `EngineSummary::unfinished` に数えられる。
    pub async fn execute(&self, tasks: Vec<Task<X::Input>>) -> EngineResult<EngineRun<X::Output>> {
        validate_config(self.config.as_ref())?;
        ensure_unique_ids(&tasks)?;

        let started_at = chrono::Utc::now();
        let start_time = Instant::now();
        let total_tasks = tasks.len();
        let reporting = self.config.enable_progress_reporting();

        if reporting {
            self.reporter.report_started(total_tasks).await;
        }

        let pool = WorkerPool::new(Arc::clone(&self.transform), self.config.as_ref())?
            .with_cancellation(self.cancellation.clone());
        let handle = pool.run()?;

        // Producer起動
        let producer = spawn_producer(tasks, pool.input(), self.cancellation.clone());

        // Result Collector起動
        let collector = if reporting {
            spawn_result_collector(
                handle.output(),
                total_tasks,
                Arc::clone(&self.reporter),
                Arc::clone(&self.sink),
                self.config.batch_size(),
            )
        } else {
            spawn_result_collector(
                handle.output(),
                total_tasks,
                Arc::new(NoOpProgressReporter::new()),
                Arc::clone(&self.sink),
                self.config.batch_size(),
            )
        };

        let submitted = producer.await??;
        let stats = handle.join().await?;
        let report = collector.await?.map_err(EngineError::sink)?;
        ensure_result_accounting(submitted, stats.completed, report.results.len())?;

        if reporting {
            self.reporter
                .report_completed(report.succeeded, report.failed)
                .await;
        }

        self.sink.finalize().await.map_err(EngineError::sink)?;

        let total_processing_time_ms = start_time.elapsed().as_millis() as u64;
        let average_time_per_task_ms = if total_tasks > 0 {
            total_processing_time_ms as f64 / total_tasks as f64
        } else {
            0.0
        };

        tracing::info!(
            total_tasks,
            submitted,
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = stats.cancelled,
            "engine run finished"
        );

        Ok(EngineRun {
            summary: EngineSummary {
                total_tasks,
                succeeded: report.succeeded,
                failed: report.failed,
                cancelled: stats.cancelled,
                started_at,
                total_processing_time_ms,
                average_time_per_task_ms,
            },
            results: report.results,
        })
    }

    /// 実行中の処理を止めるためのシグナル
    pub fn cancellation(&self) -> CancellationSignal {
        self.cancellation.clone()
    }

    /// 設定への参照を取得（読み取り専用アクセス）
    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// 同じ投入バッチ内でタスクIDが重複していないことを確認
fn ensure_unique_ids<T>(tasks: &[Task<T>]) -> EngineResult<()> {
    let mut seen = HashSet::with_capacity(tasks.len());
    match tasks.iter().find(|task| !seen.insert(task.id)) {
        Some(task) => Err(EngineError::validation(
            "task_id",
            format!("タスクIDが重複しています: {}", task.id),
        )),
        None => Ok(()),
    }
}

/// 受理したタスクごとに結果がちょうど1つ届いたことを確認
fn ensure_result_accounting(submitted: usize, produced: usize, collected: usize) -> EngineResult<()> {
    if collected == produced && produced <= submitted {
        return Ok(());
    }
    tracing::error!(submitted, produced, collected, "result accounting mismatch");
    Err(EngineError::internal(anyhow::anyhow!(
        "結果数が一致しません: 投入 {submitted}, 生成 {produced}, 収集 {collected}"
    )))
}
