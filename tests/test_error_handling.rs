// エラーハンドリングの統合テスト
use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use task_engine::{
    core::{ErrorSeverity, TaskTransform},
    services::{MemoryResultSink, NoOpProgressReporter},
    BoundedChannel, ChannelError, DefaultEngineConfig, EngineError, Task, TaskEngine,
    TransformFailure, WorkerPool,
};
use tempfile::NamedTempFile;
use tokio::time::Duration;

/// 入力に応じて失敗・パニック・遅延する変換
struct Unreliable;

#[async_trait::async_trait]
impl TaskTransform for Unreliable {
    type Input = u32;
    type Output = u32;

    async fn apply(&self, input: u32) -> Result<u32> {
        match input {
            0 => anyhow::bail!("ゼロは処理できません"),
            13 => panic!("不吉な数"),
            99 => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(input)
            }
            n => Ok(n + 1),
        }
    }
}

#[tokio::test]
async fn test_task_failures_are_data_not_crashes() {
    let config = DefaultEngineConfig::new(1)
        .with_worker_count(2)
        .with_timeout(Some(Duration::from_millis(50)))
        .with_progress_reporting(false);
    let engine = TaskEngine::new(Unreliable, config, NoOpProgressReporter::new(), MemoryResultSink::new());

    let tasks = [0, 1, 13, 99, 2]
        .into_iter()
        .enumerate()
        .map(|(id, n)| Task::new(id as u64, n))
        .collect();
    let run = engine.execute(tasks).await.unwrap();

    assert_eq!(run.summary.succeeded, 2);
    assert_eq!(run.summary.failed, 3);

    let err_of = |id: u64| {
        run.results
            .iter()
            .find(|r| r.task_id == id)
            .and_then(|r| r.err.clone())
    };
    assert_eq!(err_of(0), Some(TransformFailure::failed("ゼロは処理できません")));
    assert_eq!(err_of(2), Some(TransformFailure::panicked("不吉な数")));
    assert_eq!(
        err_of(3),
        Some(TransformFailure::timed_out(Duration::from_millis(50)))
    );
    assert_eq!(err_of(4), None);
}

#[tokio::test]
async fn test_channel_protocol_errors_are_critical() {
    let pool = WorkerPool::new(
        Arc::new(Unreliable),
        &DefaultEngineConfig::new(1).with_worker_count(1),
    )
    .unwrap();
    pool.close_input().unwrap();

    let error = pool.close_input().unwrap_err();
    assert!(matches!(
        error,
        EngineError::ChannelError {
            source: ChannelError::DoubleClose,
            ..
        }
    ));
    assert_eq!(error.severity(), ErrorSeverity::Critical);
    assert!(!error.is_recoverable());
    assert_eq!(error.context().operation, "channel_protocol");
}

#[tokio::test]
async fn test_blocked_sender_gets_value_back_on_close() {
    let channel = BoundedChannel::new(1);
    channel.send(String::from("primero")).await.unwrap();

    let sender = channel.sender();
    let pending = tokio::spawn(async move { sender.send(String::from("perdido")).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!pending.is_finished());

    channel.close().unwrap();
    let rejected = pending.await.unwrap().unwrap_err();
    assert_eq!(rejected.into_inner(), "perdido");

    // バッファ済みの値はクローズ後も受信できる
    let receiver = channel.receiver();
    assert_eq!(receiver.drain().await, vec!["primero".to_string()]);
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "worker_count = 0").unwrap();
    assert!(DefaultEngineConfig::from_file(file.path()).is_err());

    let mut malformed = NamedTempFile::new().unwrap();
    writeln!(malformed, "worker_count = \"many\"").unwrap();
    assert!(DefaultEngineConfig::from_file(malformed.path()).is_err());

    assert!(DefaultEngineConfig::from_file("/nonexistent/task_engine.toml").is_err());
}
