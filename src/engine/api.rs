// 高レベル公開API
// TaskEngineを簡単に組み立てて使うための便利な関数

use super::task_engine::{EngineRun, TaskEngine};
use crate::{
    core::{EngineConfig, EngineResult, ProgressReporter, ResultSink, Task, TaskTransform},
    services::{ConsoleProgressReporter, DefaultEngineConfig, MemoryResultSink, NoOpProgressReporter},
};

/// 設定済みTaskEngineでタスク一覧を実行
pub async fn execute_with_engine<X, C, R, S>(
    tasks: Vec<Task<X::Input>>,
    engine: &TaskEngine<X, C, R, S>,
) -> EngineResult<EngineRun<X::Output>>
where
    X: TaskTransform,
    X::Output: Clone + Sync,
    C: EngineConfig,
    R: ProgressReporter + 'static,
    S: ResultSink<X::Output> + 'static,
{
    engine.execute(tasks).await
}

/// デフォルト設定でコンソールに進捗を出すエンジン
pub fn create_default_engine<X>(
    transform: X,
) -> TaskEngine<X, DefaultEngineConfig, ConsoleProgressReporter, MemoryResultSink<X::Output>>
where
    X: TaskTransform,
    X::Output: Clone + Sync,
{
    TaskEngine::new(
        transform,
        DefaultEngineConfig::default(),
        ConsoleProgressReporter::new(),
        MemoryResultSink::new(),
    )
}

/// 静音版: テストやバックグラウンド処理用
pub fn create_quiet_engine<X>(
    transform: X,
    config: DefaultEngineConfig,
) -> TaskEngine<X, DefaultEngineConfig, NoOpProgressReporter, MemoryResultSink<X::Output>>
where
    X: TaskTransform,
    X::Output: Clone + Sync,
{
    TaskEngine::new(
        transform,
        config.with_progress_reporting(false),
        NoOpProgressReporter::new(),
        MemoryResultSink::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Payload;
    use crate::services::WordCountTransform;

    #[tokio::test]
    async fn test_quiet_engine_counts_words() {
        let engine = create_quiet_engine(WordCountTransform, DefaultEngineConfig::new(2));
        let tasks = vec![
            Task::new(1, Payload::Text("uno dos tres".into())),
            Task::new(2, Payload::Text("cuatro".into())),
        ];

        let run = execute_with_engine(tasks, &engine).await.unwrap();
        assert_eq!(run.summary.succeeded, 2);
        assert_eq!(engine.sink().get(1), Some(3));
        assert!(!engine.config().enable_progress_reporting());
    }

    #[test]
    fn test_default_engine_uses_default_config() {
        let engine = create_default_engine(WordCountTransform);
        assert_eq!(engine.config(), &DefaultEngineConfig::default());
    }
}
