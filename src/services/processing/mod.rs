// タスク処理機能
// 単一タスクへの変換適用と、失敗の結果データへの変換

pub mod transforms;
pub mod worker;

// 公開API
pub use transforms::{MagnitudeTransform, SquareTransform, WordCountTransform};
pub use worker::process_single_task;
