use super::cancel_on_ctrl_c;
use crate::core::EngineConfig;
use crate::engine::Pipeline;
use crate::services::DefaultEngineConfig;
use anyhow::{ensure, Result};

/// Execute fan-in command: merge `sources` generators of 1..=length
pub async fn execute_fan_in(
    config: &DefaultEngineConfig,
    sources: usize,
    length: u64,
    fan_out: Option<usize>,
) -> Result<Vec<u64>> {
    ensure!(fan_out != Some(0), "--fan-out には1以上を指定してください");

    println!("🔀 ファンイン: {sources} 個のジェネレーター × 1..={length}");
    let pipeline = Pipeline::new(config.queue_capacity());
    cancel_on_ctrl_c(pipeline.cancellation());

    let generators = (0..sources)
        .map(|_| pipeline.generate((1..=length).collect()))
        .collect();
    let mut merged = pipeline.fan_in(generators);

    if let Some(stages) = fan_out {
        println!("   - {stages} 個のステージで2乗してから再合流");
        merged = pipeline.fan_out_in(merged, stages, |value: u64| value * value);
    }

    let values = merged.drain().await;
    pipeline.join().await?;

    println!("📨 受信順: {values:?}");
    println!("✅ 合計 {} 件を受信し、合流先はクローズされました", values.len());
    Ok(values)
}
