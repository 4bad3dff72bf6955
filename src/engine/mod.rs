// エンジン層 - 並列処理とオーケストレーション
// 同期プリミティブとサービス層を組み合わせて高レベルな処理を提供

pub mod api;
pub mod consumer;
pub mod periodic;
pub mod pipeline;
pub mod pool;
pub mod producer;
pub mod task_engine;

// 公開API - 主要エンジンクラス
pub use api::{create_default_engine, create_quiet_engine, execute_with_engine};
pub use periodic::spawn_until_cancelled;
pub use pipeline::{Pipeline, PipelineStage};
pub use pool::{PoolHandle, PoolStats, WorkerPool};
pub use producer::spawn_producer;
pub use task_engine::{EngineRun, TaskEngine};
