// 設定管理機能
// ワーカー数、キュー容量、タイムアウト等のエンジン設定

pub mod implementations;

// 公開API
pub use implementations::{validate_config, DefaultEngineConfig};
