// 定期処理 - キャンセルされるまで作業を繰り返すユニット

use crate::sync::CancellationSignal;
use std::time::Duration;
use tokio::task::JoinHandle;

/// `interval` ごとに `work` を呼び、シグナルが発火したら終了する
///
/// 戻り値は実行した回数。作業の途中では中断しない。
pub fn spawn_until_cancelled<F>(
    cancellation: CancellationSignal,
    interval: Duration,
    mut work: F,
) -> JoinHandle<usize>
where
    F: FnMut(usize) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut iterations = 0;

        loop {
            let proceed = tokio::select! {
                biased;
                _ = cancellation.fired() => false,
                _ = ticker.tick() => true,
            };
            if !proceed {
                break;
            }

            work(iterations);
            iterations += 1;
        }

        tracing::debug!(iterations, "periodic unit cancelled");
        iterations
    })
}
