// 投稿ストア機能
// エンジンへタスクを投入する外部の協力者（投稿の作成・一覧・取得）

pub mod store;

// 公開API
pub use store::{NewPost, Post, PostStore};
