use crate::engine::spawn_until_cancelled;
use crate::sync::CancellationSignal;
use anyhow::Result;
use std::time::Duration;

/// Execute cancel command: periodic work stopped by a signal after `after`
pub async fn execute_cancel(after: Duration, interval: Duration) -> Result<usize> {
    println!(
        "🔁 {} ごとに作業し、{} 後にキャンセルします",
        humantime::format_duration(interval),
        humantime::format_duration(after)
    );

    let signal = CancellationSignal::new();
    let worker = spawn_until_cancelled(signal.clone(), interval, |iteration| {
        println!("   作業中 #{iteration}");
    });

    tokio::time::sleep(after).await;
    signal.fire();

    let iterations = worker.await?;
    println!("🛑 キャンセル済み: {iterations} 回実行しました");
    Ok(iterations)
}
