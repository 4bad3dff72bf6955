use super::{cancel_on_ctrl_c, print_config, print_summary, reporter_for};
use crate::core::{Payload, Task};
use crate::engine::TaskEngine;
use crate::services::{DefaultEngineConfig, DiscardResultSink, SquareTransform};
use anyhow::Result;

/// Execute pool command: square 1..=tasks on the worker pool
pub async fn execute_pool(config: DefaultEngineConfig, tasks: u64, json: bool) -> Result<()> {
    println!("🧮 ワーカープール: 1..={tasks} を2乗します");
    print_config(&config);

    let reporter = reporter_for(&config);
    // 結果は実行結果から直接出力するので保存しない
    let engine = TaskEngine::new(SquareTransform, config, reporter, DiscardResultSink::new());
    cancel_on_ctrl_c(engine.cancellation());

    let batch = (1..=tasks)
        .map(|id| Task::new(id, Payload::Number(id as i64)))
        .collect();
    let run = engine.execute(batch).await?;

    let mut results = run.results;
    results.sort_by_key(|result| result.task_id);
    for result in &results {
        if json {
            println!("{}", serde_json::to_string(result)?);
            continue;
        }
        match (&result.value, &result.err) {
            (_, Some(error)) => println!("   {:>4} ❌ {error}", result.task_id),
            (Some(value), None) => println!("   {:>4} → {value}", result.task_id),
            (None, None) => println!("   {:>4} ?", result.task_id),
        }
    }

    print_summary(&run.summary);
    Ok(())
}
