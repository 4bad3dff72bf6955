// 結果収集機能
// 出力チャンネルからの結果の排出、バッチ保存、集計

pub mod collector;
pub mod implementations;

// 公開API
pub use collector::{spawn_result_collector, CollectorReport};
pub use implementations::{DiscardResultSink, MemoryResultSink};
