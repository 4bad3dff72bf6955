// CancellationSignal - 協調的キャンセルのためのブロードキャストフラグ

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    fired: AtomicBool,
    notify: Notify,
}

/// 一度だけ false から true へ変わる停止フラグ
///
/// 購読者リストを持たず、クローンしたハンドルなら現在・将来のどの観測者からも見える。
/// キャンセルは協調的で、各ユニットはループの区切りで `is_fired` を確認するか
/// `fired()` を `select` の腕に含める必要がある。`send`/`receive` だけで待機している
/// ユニットは、その操作が自然に解けるまでキャンセルに気づかない。
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// シグナルを発火する。何度呼んでもよい
    pub fn fire(&self) {
        if !self.inner.fired.swap(true, Ordering::AcqRel) {
            tracing::debug!("cancellation signal fired");
        }
        self.inner.notify.notify_waiters();
    }

    /// 待機せずに発火済みかを確認
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// 発火するまで待機する
    pub async fn fired(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_fired() {
                return;
            }

            notified.await;
        }
    }
}
