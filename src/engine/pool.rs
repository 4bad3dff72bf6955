// WorkerPool - 固定数ワーカーによる並列処理

use super::consumer::{spawn_workers, WorkerContext};
use crate::{
    core::{EngineConfig, EngineError, EngineResult, Task, TaskResult, TaskTransform},
    services::config::validate_config,
    sync::{BoundedChannel, CancellationSignal, ChannelReceiver, ChannelSender, CompletionLatch},
};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;

/// 実行終了時の統計
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub completed: usize,
    pub cancelled: bool,
}

/// 固定数のワーカーが共有の入力キューからタスクを取り出し、
/// 変換結果を出力チャンネルへ送るプール
///
/// 出力チャンネルをクローズするのは、全ワーカーの終了を待つコーディネーターだけ。
/// 結果の順序は保証しない。
pub struct WorkerPool<X: TaskTransform> {
    transform: Arc<X>,
    input: BoundedChannel<Task<X::Input>>,
    output: BoundedChannel<TaskResult<X::Output>>,
    worker_count: usize,
    task_timeout: Option<Duration>,
    cancellation: CancellationSignal,
    completed: Arc<AtomicUsize>,
    started: AtomicBool,
}

impl<X: TaskTransform> WorkerPool<X> {
    /// 設定からプールを作成（入力・出力とも `queue_capacity` の容量）
    pub fn new<C>(transform: Arc<X>, config: &C) -> EngineResult<Self>
    where
        C: EngineConfig + ?Sized,
    {
        validate_config(config)?;

        let capacity = config.queue_capacity();
        Ok(Self {
            transform,
            input: BoundedChannel::new(capacity),
            output: BoundedChannel::new(capacity),
            worker_count: config.worker_count(),
            task_timeout: config.task_timeout(),
            cancellation: CancellationSignal::new(),
            completed: Arc::new(AtomicUsize::new(0)),
            started: AtomicBool::new(false),
        })
    }

    /// 外部のキャンセルシグナルを共有する
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = signal;
        self
    }

    /// 入力キューへの送信専用ハンドル
    pub fn input(&self) -> ChannelSender<Task<X::Input>> {
        self.input.sender()
    }

    /// 結果への受信専用ハンドル
    pub fn output(&self) -> ChannelReceiver<TaskResult<X::Output>> {
        self.output.receiver()
    }

    /// タスクを入力キューへ投入する。容量が埋まっていれば待機する
    pub async fn submit<I>(&self, tasks: I) -> EngineResult<usize>
    where
        I: IntoIterator<Item = Task<X::Input>>,
    {
        let mut submitted = 0;
        for task in tasks {
            self.input.send(task).await.map_err(|error| {
                tracing::error!("task submitted after the input queue was closed");
                EngineError::channel("submit", error.into())
            })?;
            submitted += 1;
        }
        Ok(submitted)
    }

    /// バッチの投入完了を通知する
    pub fn close_input(&self) -> EngineResult<()> {
        self.input.close().map_err(|error| {
            tracing::error!(%error, "failed to close the input queue");
            EngineError::channel("close input", error)
        })
    }

    /// ワーカーとコーディネーターを起動する。起動は1回だけ
    pub fn run(&self) -> EngineResult<PoolHandle<X::Output>> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(EngineError::validation(
                "run",
                "ワーカープールは既に起動しています",
            ));
        }

        let context = WorkerContext {
            transform: Arc::clone(&self.transform),
            input: self.input.receiver(),
            output: self.output.sender(),
            cancellation: self.cancellation.clone(),
            task_timeout: self.task_timeout,
            completed: Arc::clone(&self.completed),
        };

        let latch = CompletionLatch::new(self.worker_count);
        let workers = spawn_workers(context, self.worker_count, &latch);
        tracing::debug!(workers = self.worker_count, "worker pool started");

        let coordinator = spawn_coordinator(latch, workers, self.output.sender());

        Ok(PoolHandle {
            output: self.output.receiver(),
            coordinator,
            workers: self.worker_count,
            completed: Arc::clone(&self.completed),
            cancellation: self.cancellation.clone(),
        })
    }

    /// これまでに生成された結果の数
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn cancellation(&self) -> CancellationSignal {
        self.cancellation.clone()
    }
}

/// Coordinator: 全ワーカーの終了後に一度だけ出力をクローズする
fn spawn_coordinator<U: Send + 'static>(
    latch: CompletionLatch,
    workers: Vec<JoinHandle<EngineResult<()>>>,
    output: ChannelSender<U>,
) -> JoinHandle<EngineResult<()>> {
    tokio::spawn(async move {
        latch.wait().await;

        let mut first_error = None;
        for handle in workers {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(EngineError::task(join_error)),
            };
            if let Err(error) = outcome {
                first_error.get_or_insert(error);
            }
        }

        let closed = output.close().map_err(|error| {
            tracing::error!(%error, "failed to close the result channel");
            EngineError::channel("close output", error)
        });

        match first_error {
            Some(error) => Err(error),
            None => closed,
        }
    })
}

/// 起動済みプールのハンドル
pub struct PoolHandle<U> {
    output: ChannelReceiver<TaskResult<U>>,
    coordinator: JoinHandle<EngineResult<()>>,
    workers: usize,
    completed: Arc<AtomicUsize>,
    cancellation: CancellationSignal,
}

impl<U: Send + 'static> PoolHandle<U> {
    pub fn output(&self) -> ChannelReceiver<TaskResult<U>> {
        self.output.clone()
    }

    /// 出力がクローズされるまで待機する
    ///
    /// 出力を誰も読まないと有限容量のチャンネルが埋まり、ワーカーが終了できない。
    pub async fn join(self) -> EngineResult<PoolStats> {
        self.coordinator.await??;

        Ok(PoolStats {
            workers: self.workers,
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancellation.is_fired(),
        })
    }

    /// 全結果を読み切ってから終了を待つ
    pub async fn collect(self) -> EngineResult<(Vec<TaskResult<U>>, PoolStats)> {
        let results = self.output.drain().await;
        let stats = self.join().await?;
        Ok((results, stats))
    }
}
