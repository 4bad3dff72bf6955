// サービス層 - 機能別の処理ロジック
// 各サービスは特定の責任を持ち、疎結合で設計されている

pub mod config;
pub mod monitoring;
pub mod persistence;
pub mod posts;
pub mod processing;

// 公開API - 各サービスの主要機能を明示的にエクスポート
pub use config::{validate_config, DefaultEngineConfig};
pub use monitoring::{ConsoleProgressReporter, NoOpProgressReporter, TracingProgressReporter};
pub use persistence::{spawn_result_collector, CollectorReport, DiscardResultSink, MemoryResultSink};
pub use posts::{NewPost, Post, PostStore};
pub use processing::{
    process_single_task, MagnitudeTransform, SquareTransform, WordCountTransform,
};
