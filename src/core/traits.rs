// エンジンのトレイト定義
// 設定・進捗報告・変換処理・結果シンクの抽象化インターフェース

use super::error::TransformFailure;
use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use std::marker::PhantomData;
use std::time::Duration;

/// エンジンの設定を抽象化するトレイト
#[automock]
pub trait EngineConfig: Send + Sync {
    /// ワーカー数を取得
    fn worker_count(&self) -> usize;

    /// キュー（チャンネル）の容量を取得。0はランデブーチャンネル
    fn queue_capacity(&self) -> usize;

    /// タスク1件あたりの変換タイムアウト
    fn task_timeout(&self) -> Option<Duration>;

    /// 結果シンクへ書き込むバッチのサイズ
    fn batch_size(&self) -> usize;

    /// 進捗報告を有効にするかどうか
    fn enable_progress_reporting(&self) -> bool;
}

// EngineConfig for Box<dyn EngineConfig>
impl EngineConfig for Box<dyn EngineConfig> {
    fn worker_count(&self) -> usize {
        self.as_ref().worker_count()
    }

    fn queue_capacity(&self) -> usize {
        self.as_ref().queue_capacity()
    }

    fn task_timeout(&self) -> Option<Duration> {
        self.as_ref().task_timeout()
    }

    fn batch_size(&self) -> usize {
        self.as_ref().batch_size()
    }

    fn enable_progress_reporting(&self) -> bool {
        self.as_ref().enable_progress_reporting()
    }
}

/// 進捗報告の抽象化トレイト
#[automock]
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// 処理開始時の報告
    async fn report_started(&self, total_tasks: usize);

    /// 進捗更新の報告
    async fn report_progress(&self, completed: usize, total: usize);

    /// タスク失敗時の報告
    async fn report_error(&self, task_id: u64, error: &TransformFailure);

    /// 処理完了時の報告
    async fn report_completed(&self, succeeded: usize, failed: usize);
}

// ProgressReporter for Box<dyn ProgressReporter>
#[async_trait]
impl ProgressReporter for Box<dyn ProgressReporter> {
    async fn report_started(&self, total_tasks: usize) {
        self.as_ref().report_started(total_tasks).await
    }

    async fn report_progress(&self, completed: usize, total: usize) {
        self.as_ref().report_progress(completed, total).await
    }

    async fn report_error(&self, task_id: u64, error: &TransformFailure) {
        self.as_ref().report_error(task_id, error).await
    }

    async fn report_completed(&self, succeeded: usize, failed: usize) {
        self.as_ref().report_completed(succeeded, failed).await
    }
}

/// ワーカーがタスクのペイロードへ適用する変換
///
/// 失敗は `Err` で返す。ワーカープールが `TaskResult::err` に変換するため、
/// ここでのエラーやパニックがプールを止めることはない。
#[async_trait]
pub trait TaskTransform: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    async fn apply(&self, payload: Self::Input) -> Result<Self::Output>;
}

/// 同期クロージャを `TaskTransform` として扱うアダプタ
pub struct FnTransform<F, T, U> {
    func: F,
    _marker: PhantomData<fn(T) -> U>,
}

impl<F, T, U> FnTransform<F, T, U>
where
    F: Fn(T) -> Result<U> + Send + Sync + 'static,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, U> TaskTransform for FnTransform<F, T, U>
where
    F: Fn(T) -> Result<U> + Send + Sync + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    type Input = T;
    type Output = U;

    async fn apply(&self, payload: T) -> Result<U> {
        (self.func)(payload)
    }
}

/// 結果の受け皿の抽象化トレイト
#[async_trait]
pub trait ResultSink<U>: Send + Sync {
    /// 成功結果をバッチで保存
    async fn store_batch(&self, results: &[(u64, U)]) -> Result<()>;

    /// 受け入れ完了時の処理
    async fn finalize(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_transform_applies_closure() {
        let doubler = FnTransform::new(|n: i64| Ok(n * 2));
        assert_eq!(doubler.apply(21).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_fn_transform_propagates_error() {
        let failing = FnTransform::new(|n: i64| -> Result<i64> {
            anyhow::ensure!(n >= 0, "負の値は扱えません: {n}");
            Ok(n)
        });

        let error = failing.apply(-1).await.unwrap_err();
        assert!(error.to_string().contains("負の値"));
    }

    #[test]
    fn test_boxed_config_delegates() {
        let mut mock = MockEngineConfig::new();
        mock.expect_worker_count().return_const(3usize);
        mock.expect_queue_capacity().return_const(0usize);
        mock.expect_task_timeout()
            .return_const(Some(Duration::from_millis(5)));

        let boxed: Box<dyn EngineConfig> = Box::new(mock);
        assert_eq!(boxed.worker_count(), 3);
        assert_eq!(boxed.queue_capacity(), 0);
        assert_eq!(boxed.task_timeout(), Some(Duration::from_millis(5)));
    }
}
