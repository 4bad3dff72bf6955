// 結果シンクの具象実装

use crate::core::ResultSink;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// メモリ上に成功結果を保持するシンク
///
/// クローンしたハンドルは同じ保存領域を共有する。
#[derive(Debug)]
pub struct MemoryResultSink<U> {
    stored: Arc<Mutex<HashMap<u64, U>>>,
    batches: Arc<Mutex<usize>>,
    finalized: Arc<Mutex<bool>>,
}

impl<U> Clone for MemoryResultSink<U> {
    fn clone(&self) -> Self {
        Self {
            stored: Arc::clone(&self.stored),
            batches: Arc::clone(&self.batches),
            finalized: Arc::clone(&self.finalized),
        }
    }
}

impl<U> Default for MemoryResultSink<U> {
    fn default() -> Self {
        Self {
            stored: Arc::new(Mutex::new(HashMap::new())),
            batches: Arc::new(Mutex::new(0)),
            finalized: Arc::new(Mutex::new(false)),
        }
    }
}

impl<U: Clone> MemoryResultSink<U> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存済みデータのスナップショットを取得
    pub fn get_stored_data(&self) -> Result<HashMap<u64, U>> {
        let stored = self
            .stored
            .lock()
            .map_err(|e| anyhow::anyhow!("Mutex lock failed: {e}"))?;
        Ok(stored.clone())
    }

    pub fn get(&self, task_id: u64) -> Option<U> {
        self.stored.lock().ok()?.get(&task_id).cloned()
    }

    pub fn stored_count(&self) -> usize {
        self.stored.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().map(|b| *b).unwrap_or(0)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.lock().map(|f| *f).unwrap_or(false)
    }
}

#[async_trait]
impl<U> ResultSink<U> for MemoryResultSink<U>
where
    U: Clone + Send + Sync + 'static,
{
    async fn store_batch(&self, results: &[(u64, U)]) -> Result<()> {
        let mut stored = self
            .stored
            .lock()
            .map_err(|e| anyhow::anyhow!("Mutex lock failed: {e}"))?;
        for (task_id, value) in results {
            stored.insert(*task_id, value.clone());
        }
        drop(stored);

        *self
            .batches
            .lock()
            .map_err(|e| anyhow::anyhow!("Mutex lock failed: {e}"))? += 1;
        Ok(())
    }

    async fn finalize(&self) -> Result<()> {
        *self
            .finalized
            .lock()
            .map_err(|e| anyhow::anyhow!("Mutex lock failed: {e}"))? = true;
        Ok(())
    }
}

/// 何も保存しないシンク（結果は呼び出し側が直接受け取る場合用）
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardResultSink;

impl DiscardResultSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<U> ResultSink<U> for DiscardResultSink
where
    U: Send + Sync + 'static,
{
    async fn store_batch(&self, _results: &[(u64, U)]) -> Result<()> {
        Ok(())
    }

    async fn finalize(&self) -> Result<()> {
        Ok(())
    }
}
