// BoundedChannel - 容量固定のFIFOチャンネル
// 明示的なクローズプロトコルを持ち、容量0はランデブー（同期受け渡し）になる

use crate::core::{ChannelError, SendError};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// `try_receive` の結果
#[derive(Debug, PartialEq, Eq)]
pub enum TryReceive<T> {
    /// 先頭の値を取り出した
    Value(T),
    /// 今は空だがまだ開いている
    Empty,
    /// 空かつクローズ済み（ストリーム終端）
    Closed,
}

struct State<T> {
    buffer: VecDeque<T>,
    // ランデブーで送信側が差し出している値。送信待機中の間だけ存在する
    handoff: Option<T>,
    closed: bool,
    // 差し出された値と取り出された値の累計。ランデブー送信の完了判定に使う
    pushed: u64,
    taken: u64,
}

struct Shared<T> {
    capacity: usize,
    state: Mutex<State<T>>,
    // 値が積まれた、またはクローズされた
    readable: Notify,
    // 空きができた、または値が取り出された
    writable: Notify,
}

/// 容量固定のFIFOチャンネル
///
/// ハンドルは `Clone` で共有でき、バッファはチャンネル内部のロックでのみ保護される。
/// `close` は指定された単一のプロデューサーだけが呼ぶこと。消費側には
/// `close` を持たない [`ChannelReceiver`] を渡す。
pub struct BoundedChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BoundedChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for BoundedChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BoundedChannel")
            .field("capacity", &self.shared.capacity)
            .field("len", &state.buffer.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T> BoundedChannel<T> {
    /// 容量を指定してチャンネルを作成。容量0はランデブーチャンネル
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                capacity,
                state: Mutex::new(State {
                    buffer: VecDeque::with_capacity(capacity),
                    handoff: None,
                    closed: false,
                    pushed: 0,
                    taken: 0,
                }),
                readable: Notify::new(),
                writable: Notify::new(),
            }),
        }
    }

    /// ランデブーチャンネルを作成
    pub fn rendezvous() -> Self {
        Self::new(0)
    }

    // ロック中にパニックしても状態自体は常に整合しているので、毒化は無視する
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// 値を末尾に追加する
    ///
    /// バッファが満杯の間は待機する。呼び出し時点（または待機中）にクローズ済みなら
    /// 値を `SendError` に入れて返す。容量0では受信側が値を取り出すまで戻らない。
    /// 容量0の送信を取り出される前に破棄すると、差し出した値は取り下げられる。
    pub async fn send(&self, value: T) -> Result<(), SendError<T>> {
        if self.shared.capacity == 0 {
            return self.hand_off(value).await;
        }

        loop {
            let notified = self.shared.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return Err(SendError(value));
                }
                if state.buffer.len() < self.shared.capacity {
                    state.buffer.push_back(value);
                    drop(state);
                    self.shared.readable.notify_waiters();
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    // ランデブー: 受け渡し枠が空くのを待って値を差し出し、取り出されるまで待つ
    async fn hand_off(&self, value: T) -> Result<(), SendError<T>> {
        let ticket = loop {
            let notified = self.shared.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return Err(SendError(value));
                }
                if state.handoff.is_none() {
                    state.handoff = Some(value);
                    state.pushed += 1;
                    let ticket = state.pushed;
                    drop(state);
                    self.shared.readable.notify_waiters();
                    break ticket;
                }
            }

            notified.await;
        };

        let _offer = PendingOffer {
            channel: self,
            ticket,
        };

        loop {
            let notified = self.shared.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.lock().taken >= ticket {
                return Ok(());
            }

            notified.await;
        }
    }

    /// 先頭の値を受信する
    ///
    /// 空かつ開いている間は待機する。空かつクローズ済みなら `None`（ストリーム終端）。
    /// このフューチャーは途中で破棄しても値を失わないので `tokio::select!` の腕に使える。
    pub async fn receive(&self) -> Option<T> {
        loop {
            let notified = self.shared.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_receive() {
                TryReceive::Value(value) => return Some(value),
                TryReceive::Closed => return None,
                TryReceive::Empty => {}
            }

            notified.await;
        }
    }

    /// 待機せずに受信を試みる
    pub fn try_receive(&self) -> TryReceive<T> {
        let mut state = self.lock();
        let head = match state.buffer.pop_front() {
            Some(value) => Some(value),
            None => state.handoff.take(),
        };
        if let Some(value) = head {
            state.taken += 1;
            drop(state);
            self.shared.writable.notify_waiters();
            return TryReceive::Value(value);
        }

        if state.closed {
            TryReceive::Closed
        } else {
            TryReceive::Empty
        }
    }

    /// チャンネルをクローズする
    ///
    /// バッファ内の値は破棄されず、受信し切るまで取り出せる。
    pub fn close(&self) -> Result<(), ChannelError> {
        let mut state = self.lock();
        if state.closed {
            return Err(ChannelError::DoubleClose);
        }
        state.closed = true;
        drop(state);

        self.shared.readable.notify_waiters();
        self.shared.writable.notify_waiters();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// バッファ内の値の数。ランデブーで差し出し中の値は含まない
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// 送信専用ハンドルを取得
    pub fn sender(&self) -> ChannelSender<T> {
        ChannelSender {
            inner: self.clone(),
        }
    }

    /// 受信専用ハンドルを取得
    pub fn receiver(&self) -> ChannelReceiver<T> {
        ChannelReceiver {
            inner: self.clone(),
        }
    }

    /// 送信専用・受信専用ハンドルに分割
    pub fn split(self) -> (ChannelSender<T>, ChannelReceiver<T>) {
        (self.sender(), ChannelReceiver { inner: self })
    }

    pub(crate) fn readable(&self) -> &Notify {
        &self.shared.readable
    }
}

// 差し出し中のランデブー値。送信フューチャーが取り出し前に破棄されたら枠から取り下げる
struct PendingOffer<'a, T> {
    channel: &'a BoundedChannel<T>,
    ticket: u64,
}

impl<T> Drop for PendingOffer<'_, T> {
    fn drop(&mut self) {
        let mut state = self.channel.lock();
        if state.taken >= self.ticket {
            return;
        }

        // 枠は1つだけなので、未取り出しなら中身は自分の値
        let withdrawn = state.handoff.take();
        state.pushed -= 1;
        drop(state);
        drop(withdrawn);

        self.channel.shared.writable.notify_waiters();
    }
}

/// 送信専用ハンドル（プロデューサー側）
pub struct ChannelSender<T> {
    inner: BoundedChannel<T>,
}

impl<T> Clone for ChannelSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for ChannelSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChannelSender").field(&self.inner).finish()
    }
}

impl<T> ChannelSender<T> {
    pub async fn send(&self, value: T) -> Result<(), SendError<T>> {
        self.inner.send(value).await
    }

    pub fn close(&self) -> Result<(), ChannelError> {
        self.inner.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// ドロップ時にこのチャンネルをクローズするガードを得る
    pub fn close_guard(&self) -> CloseGuard<T> {
        CloseGuard {
            sender: Some(self.clone()),
        }
    }
}

/// クローズ担当ユニットが持つガード
///
/// 正常終了では [`CloseGuard::close`] で明示的にクローズする。担当ユニットが
/// パニックで巻き戻った場合もドロップ時にクローズされ、受信側はストリーム終端を観測できる。
pub struct CloseGuard<T> {
    sender: Option<ChannelSender<T>>,
}

impl<T> CloseGuard<T> {
    pub fn close(mut self) -> Result<(), ChannelError> {
        match self.sender.take() {
            Some(sender) => sender.close(),
            None => Ok(()),
        }
    }
}

impl<T> Drop for CloseGuard<T> {
    fn drop(&mut self) {
        // 既にクローズ済みなら何もしない
        if let Some(sender) = self.sender.take() {
            if sender.close().is_ok() {
                tracing::warn!("channel closed while its producing unit was unwinding");
            }
        }
    }
}

/// 受信専用ハンドル（コンシューマー側）
///
/// クローンした複数のハンドルは同じキューを奪い合う（ブロードキャストではない）。
pub struct ChannelReceiver<T> {
    inner: BoundedChannel<T>,
}

impl<T> Clone for ChannelReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for ChannelReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChannelReceiver").field(&self.inner).finish()
    }
}

impl<T> ChannelReceiver<T> {
    pub async fn receive(&self) -> Option<T> {
        self.inner.receive().await
    }

    pub fn try_receive(&self) -> TryReceive<T> {
        self.inner.try_receive()
    }

    /// ストリーム終端まで受信し続けて集める
    pub async fn drain(&self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.receive().await {
            items.push(item);
        }
        items
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub(crate) fn channel(&self) -> &BoundedChannel<T> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn test_fifo_order() {
        let channel = BoundedChannel::new(3);
        channel.send(1).await.unwrap();
        channel.send(2).await.unwrap();
        channel.send(3).await.unwrap();

        assert_eq!(channel.len(), 3);
        assert_eq!(channel.receive().await, Some(1));
        assert_eq!(channel.receive().await, Some(2));
        assert_eq!(channel.receive().await, Some(3));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let channel = BoundedChannel::new(2);
        channel.close().unwrap();

        let error = channel.send(42).await.unwrap_err();
        assert_eq!(error.into_inner(), 42);
    }

    #[tokio::test]
    async fn test_double_close_fails() {
        let channel = BoundedChannel::<i32>::new(1);
        assert!(channel.close().is_ok());
        assert_eq!(channel.close(), Err(ChannelError::DoubleClose));
        assert!(channel.is_closed());
    }

    #[tokio::test]
    async fn test_buffered_values_survive_close() {
        let channel = BoundedChannel::new(2);
        channel.send(42).await.unwrap();
        channel.close().unwrap();

        // 値は残り、取り出し切った後に終端になる
        assert_eq!(channel.receive().await, Some(42));
        assert_eq!(channel.receive().await, None);
        assert_eq!(channel.receive().await, None);
    }

    #[tokio::test]
    async fn test_send_blocks_while_full() {
        let channel = BoundedChannel::new(1);
        channel.send(1).await.unwrap();

        let blocked = timeout(Duration::from_millis(50), channel.send(2)).await;
        assert!(blocked.is_err(), "満杯のチャンネルへの送信は待機するべきです");

        assert_eq!(channel.receive().await, Some(1));
        timeout(Duration::from_millis(100), channel.send(3))
            .await
            .expect("空きができたら送信できるべきです")
            .unwrap();
    }

    #[tokio::test]
    async fn test_blocked_sender_fails_on_close() {
        let channel = BoundedChannel::new(1);
        channel.send(1).await.unwrap();

        let sender = channel.clone();
        let handle = tokio::spawn(async move { sender.send(2).await });

        sleep(Duration::from_millis(20)).await;
        channel.close().unwrap();

        let result = handle.await.unwrap();
        assert_eq!(result.unwrap_err().into_inner(), 2);
    }

    #[tokio::test]
    async fn test_receive_waits_until_close() {
        let channel = BoundedChannel::<u8>::new(4);
        let receiver = channel.receiver();
        let handle = tokio::spawn(async move { receiver.receive().await });

        sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        channel.close().unwrap();
        assert_eq!(handle.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rendezvous_send_waits_for_receiver() {
        let channel = BoundedChannel::rendezvous();
        let sender = channel.sender();
        let handle = tokio::spawn(async move { sender.send("hola").await });

        // 受信側が現れるまで送信は完了しない
        sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        assert_eq!(channel.receive().await, Some("hola"));
        timeout(Duration::from_millis(100), handle)
            .await
            .expect("受け渡し後は送信も完了するべきです")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_rendezvous_receive_waits_for_sender() {
        let channel = BoundedChannel::<u32>::rendezvous();
        let receiver = channel.receiver();
        let handle = tokio::spawn(async move { receiver.receive().await });

        sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        channel.send(7).await.unwrap();
        assert_eq!(handle.await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_abandoned_rendezvous_send_delivers_nothing() {
        let channel = BoundedChannel::rendezvous();

        let abandoned = timeout(Duration::from_millis(20), channel.send(1)).await;
        assert!(abandoned.is_err(), "受信側がいない間は送信が完了しないべきです");

        // 取り下げられた値は受信側に届かない
        assert_eq!(channel.len(), 0);
        assert_eq!(channel.try_receive(), TryReceive::Empty);

        // 次の送信は通常どおり受け渡される
        let sender = channel.sender();
        let handle = tokio::spawn(async move { sender.send(2).await });
        assert_eq!(channel.receive().await, Some(2));
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_rendezvous_send_losing_select_arm_is_withdrawn() {
        let channel = BoundedChannel::rendezvous();
        let signal = crate::sync::CancellationSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            trigger.fire();
        });

        let outcome = tokio::select! {
            biased;
            _ = signal.fired() => None,
            result = channel.send("perdido") => Some(result),
        };
        assert!(outcome.is_none());

        channel.close().unwrap();
        assert_eq!(channel.receive().await, None);
    }

    #[tokio::test]
    async fn test_rendezvous_offer_survives_close_until_taken() {
        let channel = BoundedChannel::rendezvous();
        let sender = channel.sender();
        let handle = tokio::spawn(async move { sender.send(9).await });

        sleep(Duration::from_millis(20)).await;
        channel.close().unwrap();
        assert!(!handle.is_finished());

        assert_eq!(channel.receive().await, Some(9));
        handle.await.unwrap().unwrap();
        assert_eq!(channel.receive().await, None);
    }

    #[tokio::test]
    async fn test_close_guard_closes_on_unwind() {
        let (sender, receiver) = BoundedChannel::new(2).split();

        let handle = tokio::spawn(async move {
            let _closer = sender.close_guard();
            sender.send(1).await.unwrap();
            panic!("unit crashed");
        });

        assert!(handle.await.unwrap_err().is_panic());
        assert_eq!(receiver.drain().await, vec![1]);
        assert!(receiver.is_closed());
    }

    #[tokio::test]
    async fn test_close_guard_explicit_close_reports_double_close() {
        let channel = BoundedChannel::<u8>::new(1);
        let guard = channel.sender().close_guard();

        assert!(guard.close().is_ok());
        assert!(channel.is_closed());

        // 既にクローズ済みのチャンネルでは、ドロップしても何も起きない
        let late = channel.sender().close_guard();
        assert_eq!(late.close(), Err(ChannelError::DoubleClose));
        drop(channel.sender().close_guard());
        assert!(channel.is_closed());
    }

    #[tokio::test]
    async fn test_try_receive_states() {
        let channel = BoundedChannel::new(1);
        assert_eq!(channel.try_receive(), TryReceive::Empty);

        channel.send(5).await.unwrap();
        assert_eq!(channel.try_receive(), TryReceive::Value(5));

        channel.close().unwrap();
        assert_eq!(channel.try_receive(), TryReceive::Closed);
    }

    #[tokio::test]
    async fn test_competing_receivers_get_each_item_once() {
        let (sender, receiver) = BoundedChannel::new(4).split();

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let receiver = receiver.clone();
                tokio::spawn(async move { receiver.drain().await })
            })
            .collect();

        for i in 0..100 {
            sender.send(i).await.unwrap();
        }
        sender.close().unwrap();

        let mut seen = HashSet::new();
        let mut total = 0;
        for consumer in consumers {
            for item in consumer.await.unwrap() {
                total += 1;
                seen.insert(item);
            }
        }

        assert_eq!(total, 100);
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn test_debug_output() {
        let channel = BoundedChannel::<i32>::new(8);
        let debug = format!("{:?}", channel.receiver());
        assert!(debug.contains("capacity: 8"));
        assert!(debug.contains("closed: false"));
    }
}
