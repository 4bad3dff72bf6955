// CompletionLatch - N個のユニット全員の終了を待つカウントダウン

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug)]
struct Inner {
    remaining: AtomicUsize,
    notify: Notify,
}

/// N個のユニットが全て `done` を呼ぶまで待機させるラッチ
///
/// 単一のフラグではなく、N回の減算で0になった時点で解放される。
#[derive(Debug, Clone)]
pub struct CompletionLatch {
    inner: Arc<Inner>,
}

impl CompletionLatch {
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                remaining: AtomicUsize::new(count),
                notify: Notify::new(),
            }),
        }
    }

    /// 1ユニットの終了を記録する。0になったら待機者を起こす
    pub fn done(&self) {
        let previous = self
            .inner
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match previous {
            Ok(1) => self.inner.notify.notify_waiters(),
            Ok(_) => {}
            Err(_) => tracing::warn!("completion latch counted down below zero"),
        }
    }

    /// 終了していないユニット数
    pub fn remaining(&self) -> usize {
        self.inner.remaining.load(Ordering::Acquire)
    }

    /// 全ユニットが終了するまで待機
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.remaining() == 0 {
                return;
            }

            notified.await;
        }
    }

    /// ドロップ時に `done` を呼ぶガードを作成
    ///
    /// ユニットがパニックで終わってもカウントが減るため、待機者が取り残されない。
    pub fn guard(&self) -> LatchGuard {
        LatchGuard {
            latch: self.clone(),
        }
    }
}

/// ドロップ時にラッチを1つ減らすガード
#[derive(Debug)]
pub struct LatchGuard {
    latch: CompletionLatch,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.latch.done();
    }
}
