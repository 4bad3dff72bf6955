//! 並行タスク実行エンジン
//!
//! 有限容量チャンネル、協調的キャンセル、固定数ワーカーのプール、
//! ファンアウト/ファンインのパイプライン、複数チャンネルの多重化待機を提供する。

pub mod cli;
pub mod core;
pub mod engine;
pub mod logging;
pub mod services;
pub mod sync;

// 公開API - よく使う型をクレートのルートから参照できるようにする
pub use crate::core::{
    ChannelError, EngineConfig, EngineError, EngineResult, EngineSummary, FnTransform, Payload,
    ProgressReporter, ResultSink, SendError, Task, TaskResult, TaskTransform, TransformFailure,
};
pub use engine::{
    create_default_engine, create_quiet_engine, execute_with_engine, spawn_until_cancelled,
    EngineRun, Pipeline, PoolHandle, PoolStats, TaskEngine, WorkerPool,
};
pub use services::{DefaultEngineConfig, MemoryResultSink, PostStore};
pub use sync::{
    select, try_select, BoundedChannel, CancellationSignal, ChannelReceiver, ChannelSender,
    CompletionLatch, Multiplexer, SelectOutcome, TryReceive,
};
