// PostStore - 明示的に所有される投稿ストア
// プロセス全体のグローバル状態ではなく、参照で渡して使う

use crate::core::{Payload, Task};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 投稿
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub content: String,
}

/// 新規投稿の入力
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

#[derive(Debug)]
struct Inner {
    posts: Vec<Post>,
    next_id: u64,
}

/// 自動採番つきのインメモリ投稿ストア
#[derive(Debug)]
pub struct PostStore {
    inner: Mutex<Inner>,
}

impl Default for PostStore {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                posts: Vec::new(),
                next_id: 1,
            }),
        }
    }
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 投稿を作成し、採番したIDを付けて返す
    pub fn create(&self, post: NewPost) -> Post {
        let mut inner = self.lock();
        let created = Post {
            id: inner.next_id,
            title: post.title,
            content: post.content,
        };
        inner.next_id += 1;
        inner.posts.push(created.clone());
        created
    }

    pub fn list(&self) -> Vec<Post> {
        self.lock().posts.clone()
    }

    pub fn get(&self, id: u64) -> Option<Post> {
        self.lock().posts.iter().find(|post| post.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().posts.is_empty()
    }

    /// 全投稿の本文をエンジンへ投入するタスクに変換（タスクIDは投稿ID）
    pub fn to_tasks(&self) -> Vec<Task<Payload>> {
        self.lock()
            .posts
            .iter()
            .map(|post| Task::new(post.id, Payload::Text(post.content.clone())))
            .collect()
    }
}
