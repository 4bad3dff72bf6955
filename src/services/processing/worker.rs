// Worker - 単一タスク処理機能

use crate::core::{Task, TaskResult, TaskTransform, TransformFailure};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// 単一タスクの処理
///
/// 変換は専用のタスクで実行し、エラー・パニック・タイムアウトをすべて
/// `TaskResult::err` に変換する。呼び出し元のワーカーは決して落ちない。
pub async fn process_single_task<X>(
    transform: Arc<X>,
    task: Task<X::Input>,
    timeout: Option<Duration>,
    worker_id: usize,
) -> TaskResult<X::Output>
where
    X: TaskTransform,
{
    let Task { id, payload } = task;
    let mut handle = tokio::spawn(async move { transform.apply(payload).await });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                // 協調的キャンセルのため、abortは次の中断点でしか効かない
                handle.abort();
                tracing::debug!(worker_id, task_id = id, ?limit, "transform timed out");
                return TaskResult::failure(id, TransformFailure::timed_out(limit));
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(Ok(value)) => TaskResult::success(id, value),
        Ok(Err(error)) => {
            tracing::debug!(worker_id, task_id = id, error = %error, "transform failed");
            TaskResult::failure(id, error.into())
        }
        Err(join_error) if join_error.is_panic() => {
            let message = panic_message(join_error.into_panic());
            tracing::warn!(worker_id, task_id = id, %message, "transform panicked");
            TaskResult::failure(id, TransformFailure::panicked(message))
        }
        Err(join_error) => TaskResult::failure(id, TransformFailure::failed(join_error.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FnTransform;
    use anyhow::Result;
    use async_trait::async_trait;

    struct SlowTransform(Duration);

    #[async_trait]
    impl TaskTransform for SlowTransform {
        type Input = u64;
        type Output = u64;

        async fn apply(&self, payload: u64) -> Result<u64> {
            tokio::time::sleep(self.0).await;
            Ok(payload)
        }
    }

    #[tokio::test]
    async fn test_process_single_task_success() {
        let doubler = Arc::new(FnTransform::new(|n: i64| Ok(n * 2)));
        let result = process_single_task(doubler, Task::new(5, 21), None, 0).await;

        assert_eq!(result, TaskResult::success(5, 42));
    }

    #[tokio::test]
    async fn test_process_single_task_captures_error() {
        let failing = Arc::new(FnTransform::new(|_: i64| -> Result<i64> {
            anyhow::bail!("invalid payload")
        }));
        let result = process_single_task(failing, Task::new(1, 0), None, 0).await;

        assert_eq!(result.task_id, 1);
        assert!(matches!(
            result.err,
            Some(TransformFailure::Failed { ref message }) if message.contains("invalid payload")
        ));
    }

    #[tokio::test]
    async fn test_process_single_task_captures_panic() {
        let panicking = Arc::new(FnTransform::new(|n: i64| -> Result<i64> {
            if n == 13 {
                panic!("unlucky number");
            }
            Ok(n)
        }));
        let result = process_single_task(panicking, Task::new(13, 13), None, 0).await;

        assert_eq!(
            result.err,
            Some(TransformFailure::panicked("unlucky number"))
        );
    }

    #[tokio::test]
    async fn test_process_single_task_times_out() {
        let slow = Arc::new(SlowTransform(Duration::from_millis(200)));
        let limit = Duration::from_millis(20);
        let result = process_single_task(slow, Task::new(9, 9), Some(limit), 0).await;

        assert_eq!(result.err, Some(TransformFailure::timed_out(limit)));
    }

    #[tokio::test]
    async fn test_process_single_task_within_timeout() {
        let slow = Arc::new(SlowTransform(Duration::from_millis(5)));
        let result =
            process_single_task(slow, Task::new(2, 2), Some(Duration::from_secs(1)), 0).await;

        assert_eq!(result, TaskResult::success(2, 2));
    }
}
