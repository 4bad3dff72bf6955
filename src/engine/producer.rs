// Producer - 値の配信機能

use crate::core::{EngineError, EngineResult};
use crate::sync::{CancellationSignal, ChannelSender};

/// Producer: 列挙した値を順に送信し、終わったらチャンネルをクローズする
///
/// このチャンネルの唯一のクローズ担当。無限のイテレータを渡す場合は、
/// キャンセルシグナルで止める必要がある。キャンセル時も送信を止めてクローズする。
pub fn spawn_producer<I>(
    items: I,
    sender: ChannelSender<I::Item>,
    cancellation: CancellationSignal,
) -> tokio::task::JoinHandle<EngineResult<usize>>
where
    I: IntoIterator + Send + 'static,
    I::IntoIter: Send,
    I::Item: Send + 'static,
{
    tokio::spawn(async move {
        let closer = sender.close_guard();
        let mut sent = 0;

        for item in items {
            if cancellation.is_fired() {
                tracing::debug!(sent, "producer stopped by cancellation");
                break;
            }

            let delivered = tokio::select! {
                biased;
                _ = cancellation.fired() => None,
                result = sender.send(item) => Some(result),
            };

            match delivered {
                Some(Ok(())) => sent += 1,
                Some(Err(error)) => {
                    tracing::error!("producer sent on a closed channel");
                    return Err(EngineError::channel("producer send", error.into()));
                }
                None => {
                    tracing::debug!(sent, "producer stopped by cancellation");
                    break;
                }
            }
        }

        // 送信側をクローズしてストリーム終端を通知
        closer
            .close()
            .map_err(|error| EngineError::channel("producer close", error))?;
        Ok(sent)
    })
}
