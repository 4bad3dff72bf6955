use crate::sync::{BoundedChannel, ChannelReceiver, Multiplexer, SelectOutcome};
use anyhow::Result;
use std::time::Duration;

/// Execute select command: one delayed source per delay, each select bounded by `wait`
pub async fn execute_select(delays: &[Duration], wait: Duration) -> Result<Vec<SelectOutcome<String>>> {
    println!(
        "⏳ {} 個のソースを最大 {} ずつ待機します",
        delays.len(),
        humantime::format_duration(wait)
    );

    let sources: Vec<ChannelReceiver<String>> = delays
        .iter()
        .enumerate()
        .map(|(index, &delay)| spawn_delayed_source(index, delay))
        .collect();
    let mut multiplexer = Multiplexer::new(sources);
    let mut outcomes = Vec::new();

    while !multiplexer.channels().is_empty() {
        let outcome = multiplexer.select(Some(wait)).await;
        let finished = match &outcome {
            SelectOutcome::Received { index, value } => {
                println!("📨 ソース {index}: {value}");
                false
            }
            SelectOutcome::Closed { index } => {
                multiplexer.remove(*index);
                false
            }
            SelectOutcome::TimedOut => {
                println!("⏰ 待機時間内に準備できたソースはありません");
                true
            }
            SelectOutcome::NoneReady | SelectOutcome::Cancelled => true,
        };
        outcomes.push(outcome);
        if finished {
            break;
        }
    }

    Ok(outcomes)
}

fn spawn_delayed_source(index: usize, delay: Duration) -> ChannelReceiver<String> {
    let (sender, receiver) = BoundedChannel::new(1).split();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let message = format!("{} 後に到着", humantime::format_duration(delay));
        if let Err(error) = sender.send(message).await {
            tracing::warn!(index, "delayed source could not deliver: {:?}", error);
        }
        if let Err(error) = sender.close() {
            tracing::warn!(index, %error, "delayed source could not close");
        }
    });
    receiver
}
