// Consumer - 並列ワーカー機能

use crate::{
    core::{EngineError, EngineResult, Task, TaskResult, TaskTransform},
    services::processing::process_single_task,
    sync::{CancellationSignal, ChannelReceiver, ChannelSender, CompletionLatch, LatchGuard},
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

/// ワーカー群が共有する実行環境
pub struct WorkerContext<X: TaskTransform> {
    pub transform: Arc<X>,
    pub input: ChannelReceiver<Task<X::Input>>,
    pub output: ChannelSender<TaskResult<X::Output>>,
    pub cancellation: CancellationSignal,
    pub task_timeout: Option<Duration>,
    pub completed: Arc<AtomicUsize>,
}

impl<X: TaskTransform> Clone for WorkerContext<X> {
    fn clone(&self) -> Self {
        Self {
            transform: Arc::clone(&self.transform),
            input: self.input.clone(),
            output: self.output.clone(),
            cancellation: self.cancellation.clone(),
            task_timeout: self.task_timeout,
            completed: Arc::clone(&self.completed),
        }
    }
}

/// 単一ワーカー
///
/// ループの区切りごとにキャンセルを確認し、受信待ちにもキャンセルを組み合わせる。
/// 出力チャンネルはクローズしない（クローズはコーディネーターの責任）。
pub fn spawn_single_worker<X>(
    worker_id: usize,
    context: WorkerContext<X>,
    guard: LatchGuard,
) -> tokio::task::JoinHandle<EngineResult<()>>
where
    X: TaskTransform,
{
    tokio::spawn(async move {
        // パニックで終わってもラッチは減る
        let _guard = guard;
        let mut processed = 0usize;

        loop {
            if context.cancellation.is_fired() {
                tracing::debug!(worker_id, processed, "worker observed cancellation");
                break;
            }

            // 次の作業を取得
            let next = tokio::select! {
                biased;
                _ = context.cancellation.fired() => None,
                task = context.input.receive() => task,
            };
            let Some(task) = next else {
                break; // 入力終端またはキャンセル
            };

            let result = process_single_task(
                Arc::clone(&context.transform),
                task,
                context.task_timeout,
                worker_id,
            )
            .await;

            // 結果送信
            if let Err(error) = context.output.send(result).await {
                tracing::error!(worker_id, "worker sent a result on a closed output channel");
                return Err(EngineError::channel("worker send result", error.into()));
            }
            context.completed.fetch_add(1, Ordering::Relaxed);
            processed += 1;
        }

        tracing::debug!(worker_id, processed, "worker exited");
        Ok(())
    })
}

/// Workers: 同じ入力キューを奪い合う並列ワーカー群
pub fn spawn_workers<X>(
    context: WorkerContext<X>,
    worker_count: usize,
    latch: &CompletionLatch,
) -> Vec<tokio::task::JoinHandle<EngineResult<()>>>
where
    X: TaskTransform,
{
    (0..worker_count)
        .map(|worker_id| spawn_single_worker(worker_id, context.clone(), latch.guard()))
        .collect()
}
