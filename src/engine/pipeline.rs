// Pipeline - ジェネレーター・ステージ・ファンアウト・ファンイン
// 各チャンネルのクローズ担当は常に1つだけ

use super::producer::spawn_producer;
use crate::{
    core::{EngineError, EngineResult},
    sync::{BoundedChannel, CancellationSignal, ChannelReceiver, ChannelSender, CompletionLatch, LatchGuard},
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// 上流から読み、変換して下流へ送る1つのステージ
///
/// 上流が終端に達するかキャンセルされたら、自分の下流だけをクローズする。
/// 変換がパニックした場合もステージは停止して下流をクローズし、
/// パニックは `Pipeline::join` のエラーとして報告される。
pub struct PipelineStage<T, U, F> {
    upstream: ChannelReceiver<T>,
    downstream: ChannelSender<U>,
    transform: Arc<F>,
    cancellation: CancellationSignal,
}

impl<T, U, F> PipelineStage<T, U, F>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    pub fn new(
        upstream: ChannelReceiver<T>,
        downstream: ChannelSender<U>,
        transform: Arc<F>,
        cancellation: CancellationSignal,
    ) -> Self {
        Self {
            upstream,
            downstream,
            transform,
            cancellation,
        }
    }

    /// ステージを起動し、下流へ送った件数を返すハンドルを得る
    pub fn spawn(self) -> JoinHandle<EngineResult<usize>> {
        tokio::spawn(async move {
            let Self {
                upstream,
                downstream,
                transform,
                cancellation,
            } = self;
            // 変換がパニックしても下流は終端に達する
            let closer = downstream.close_guard();
            let mut forwarded = 0;

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancellation.fired() => None,
                    item = upstream.receive() => item,
                };
                let Some(item) = next else {
                    break;
                };

                let output = transform(item);
                let delivered = tokio::select! {
                    biased;
                    _ = cancellation.fired() => None,
                    result = downstream.send(output) => Some(result),
                };
                match delivered {
                    Some(Ok(())) => forwarded += 1,
                    Some(Err(error)) => {
                        tracing::error!("stage sent on a closed downstream channel");
                        return Err(EngineError::channel("stage send", error.into()));
                    }
                    None => break,
                }
            }

            closer
                .close()
                .map_err(|error| EngineError::channel("stage close", error))?;
            Ok(forwarded)
        })
    }
}

/// チャンネルで連結した並行ステージの組み立て
///
/// 起動した全ユニットのハンドルを保持し、`join` でまとめて待機できる。
pub struct Pipeline {
    capacity: usize,
    cancellation: CancellationSignal,
    units: Mutex<Vec<JoinHandle<EngineResult<usize>>>>,
}

impl Pipeline {
    /// 段間チャンネルの容量を指定して作成（0はランデブー）
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            cancellation: CancellationSignal::new(),
            units: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = signal;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cancellation(&self) -> CancellationSignal {
        self.cancellation.clone()
    }

    fn track(&self, handle: JoinHandle<EngineResult<usize>>) {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// 有限ジェネレーター: 全要素を送ってからクローズする
    pub fn generate<T: Send + 'static>(&self, items: Vec<T>) -> ChannelReceiver<T> {
        self.generate_from(items)
    }

    /// イテレーター（無限も可）から生成する。無限の場合はキャンセルで止める
    pub fn generate_from<I>(&self, items: I) -> ChannelReceiver<I::Item>
    where
        I: IntoIterator + Send + 'static,
        I::IntoIter: Send,
        I::Item: Send + 'static,
    {
        let (sender, receiver) = BoundedChannel::new(self.capacity).split();
        self.track(spawn_producer(items, sender, self.cancellation.clone()));
        receiver
    }

    /// 上流に変換を適用する1ステージを追加
    pub fn stage<T, U, F>(&self, upstream: ChannelReceiver<T>, transform: F) -> ChannelReceiver<U>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.spawn_stage(upstream, Arc::new(transform))
    }

    fn spawn_stage<T, U, F>(&self, upstream: ChannelReceiver<T>, transform: Arc<F>) -> ChannelReceiver<U>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let (sender, receiver) = BoundedChannel::new(self.capacity).split();
        let stage = PipelineStage::new(upstream, sender, transform, self.cancellation.clone());
        self.track(stage.spawn());
        receiver
    }

    /// Fan-out: 同じ上流を `n` 個のステージで奪い合う（各要素はちょうど1つのステージへ）
    pub fn fan_out<T, U, F>(
        &self,
        upstream: ChannelReceiver<T>,
        n: usize,
        transform: F,
    ) -> Vec<ChannelReceiver<U>>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        (0..n)
            .map(|_| self.spawn_stage(upstream.clone(), Arc::clone(&transform)))
            .collect()
    }

    /// Fan-in: 全ソースを1本に合流する
    ///
    /// ソースごとに転送ユニットを起動し、全転送ユニットの終了後に
    /// コーディネーターが合流先を一度だけクローズする。
    pub fn fan_in<T: Send + 'static>(&self, sources: Vec<ChannelReceiver<T>>) -> ChannelReceiver<T> {
        let merged = BoundedChannel::new(self.capacity);
        let latch = CompletionLatch::new(sources.len());

        for (index, source) in sources.into_iter().enumerate() {
            let forwarder = spawn_forwarder(
                index,
                source,
                merged.sender(),
                self.cancellation.clone(),
                latch.guard(),
            );
            self.track(forwarder);
        }

        let closer = merged.sender();
        self.track(tokio::spawn(async move {
            latch.wait().await;
            closer
                .close()
                .map_err(|error| EngineError::channel("fan-in close", error))?;
            Ok(0)
        }));

        merged.receiver()
    }

    /// Fan-out してから Fan-in する
    pub fn fan_out_in<T, U, F>(&self, upstream: ChannelReceiver<T>, n: usize, transform: F) -> ChannelReceiver<U>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let branches = self.fan_out(upstream, n, transform);
        self.fan_in(branches)
    }

    /// 起動済みの全ユニットの終了を待ち、最初のエラーを返す
    pub async fn join(&self) -> EngineResult<()> {
        let units = std::mem::take(&mut *self.units.lock().unwrap_or_else(PoisonError::into_inner));

        let mut first_error = None;
        for unit in units {
            let outcome = match unit.await {
                Ok(result) => result.map(|_| ()),
                Err(join_error) => Err(EngineError::task(join_error)),
            };
            if let Err(error) = outcome {
                first_error.get_or_insert(error);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

/// 転送ユニット: ソースを終端まで合流先へ送る。合流先はクローズしない
fn spawn_forwarder<T: Send + 'static>(
    index: usize,
    source: ChannelReceiver<T>,
    merged: ChannelSender<T>,
    cancellation: CancellationSignal,
    guard: LatchGuard,
) -> JoinHandle<EngineResult<usize>> {
    tokio::spawn(async move {
        let _guard = guard;
        let mut forwarded = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancellation.fired() => None,
                item = source.receive() => item,
            };
            let Some(item) = next else {
                break;
            };

            let delivered = tokio::select! {
                biased;
                _ = cancellation.fired() => None,
                result = merged.send(item) => Some(result),
            };
            match delivered {
                Some(Ok(())) => forwarded += 1,
                Some(Err(error)) => {
                    tracing::error!(index, "forwarder sent on a closed merged channel");
                    return Err(EngineError::channel("fan-in forward", error.into()));
                }
                None => break,
            }
        }

        tracing::debug!(index, forwarded, "fan-in source finished");
        Ok(forwarded)
    })
}
