// Multiplexer - 複数チャンネルとタイマーのうち最初に準備できたものを待つ

use super::cancellation::CancellationSignal;
use super::channel::{ChannelReceiver, TryReceive};
use rand::Rng;
use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;
use tokio::sync::futures::Notified;
use tokio::time::{sleep_until, Instant};

/// `select` の結果
///
/// `TimedOut` / `NoneReady` / `Cancelled` はエラーではなく通常の制御フローの値。
#[derive(Debug, PartialEq, Eq)]
pub enum SelectOutcome<T> {
    /// `index` 番目のチャンネルから値を受信した
    Received { index: usize, value: T },
    /// `index` 番目のチャンネルがストリーム終端に達している
    Closed { index: usize },
    /// どのチャンネルよりも先にタイムアウトした
    TimedOut,
    /// 非ブロッキング版で、呼び出し時点で準備できたチャンネルがなかった
    NoneReady,
    /// キャンセルシグナルが先に発火した
    Cancelled,
}

impl<T> SelectOutcome<T> {
    /// 受信した値を取り出す
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Received { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// 複数の受信チャンネルを多重化して待機する
///
/// 同時に複数が準備できていた場合にどれが選ばれるかは規定しない（走査開始位置は毎回ランダム）。
///
/// 負けた側のチャンネルの値は消費も破棄もされない。後続の呼び出しか別の受信者が取り出さない限り
/// バッファに残り続けるため、呼び出し側が寿命を管理すること。
#[derive(Debug, Clone)]
pub struct Multiplexer<T> {
    channels: Vec<ChannelReceiver<T>>,
    cancellation: Option<CancellationSignal>,
}

impl<T> Multiplexer<T> {
    pub fn new(channels: Vec<ChannelReceiver<T>>) -> Self {
        Self {
            channels,
            cancellation: None,
        }
    }

    /// キャンセルシグナルを `select` の腕に加える
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = Some(signal);
        self
    }

    pub fn channels(&self) -> &[ChannelReceiver<T>] {
        &self.channels
    }

    /// 終端に達したチャンネルを外す。以降のインデックスは詰められる
    pub fn remove(&mut self, index: usize) -> Option<ChannelReceiver<T>> {
        (index < self.channels.len()).then(|| self.channels.remove(index))
    }

    /// 待機せずに1回だけ走査する（defaultの分岐）
    pub fn try_select(&self) -> SelectOutcome<T> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationSignal::is_fired)
        {
            return SelectOutcome::Cancelled;
        }
        self.scan()
    }

    /// いずれかのチャンネルが準備できるか、タイムアウトするまで待機する
    ///
    /// `timeout` が `None` の場合は無期限に待つ。タイマーの発火は処理中の作業を取り消さず、
    /// どの分岐へ進むかを変えるだけ。
    pub async fn select(&self, timeout: Option<Duration>) -> SelectOutcome<T> {
        let deadline = timeout.map(|after| Instant::now() + after);

        loop {
            // 走査より先に待機を登録して起床の取りこぼしを防ぐ
            let mut waiters: Vec<Pin<Box<Notified<'_>>>> = self
                .channels
                .iter()
                .map(|receiver| Box::pin(receiver.channel().readable().notified()))
                .collect();
            for waiter in waiters.iter_mut() {
                waiter.as_mut().enable();
            }

            match self.try_select() {
                SelectOutcome::NoneReady => {}
                outcome => return outcome,
            }

            let any_ready = poll_fn(|cx| {
                for waiter in waiters.iter_mut() {
                    if waiter.as_mut().poll(cx).is_ready() {
                        return Poll::Ready(());
                    }
                }
                Poll::Pending
            });
            let cancelled = async {
                match &self.cancellation {
                    Some(signal) => signal.fired().await,
                    None => std::future::pending().await,
                }
            };
            let expired = async {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            let woke = tokio::select! {
                _ = any_ready => None,
                _ = cancelled => Some(SelectOutcome::Cancelled),
                _ = expired => Some(SelectOutcome::TimedOut),
            };
            if let Some(outcome) = woke {
                return outcome;
            }
        }
    }

    fn scan(&self) -> SelectOutcome<T> {
        let count = self.channels.len();
        if count == 0 {
            return SelectOutcome::NoneReady;
        }

        let start = rand::thread_rng().gen_range(0..count);
        for offset in 0..count {
            let index = (start + offset) % count;
            match self.channels[index].try_receive() {
                TryReceive::Value(value) => return SelectOutcome::Received { index, value },
                TryReceive::Closed => return SelectOutcome::Closed { index },
                TryReceive::Empty => {}
            }
        }
        SelectOutcome::NoneReady
    }
}

/// `Multiplexer` を組み立てずに1回だけ `select` する
pub async fn select<T>(channels: &[ChannelReceiver<T>], timeout: Option<Duration>) -> SelectOutcome<T> {
    Multiplexer::new(channels.to_vec()).select(timeout).await
}

/// 非ブロッキング版の `select`
pub fn try_select<T>(channels: &[ChannelReceiver<T>]) -> SelectOutcome<T> {
    Multiplexer::new(channels.to_vec()).try_select()
}
