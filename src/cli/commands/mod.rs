pub mod cancel;
pub mod fan_in;
pub mod pool;
pub mod posts;
pub mod select;

pub use cancel::*;
pub use fan_in::*;
pub use pool::*;
pub use posts::*;
pub use select::*;

use crate::core::{EngineConfig, EngineError, EngineSummary, ProgressReporter};
use crate::services::{
    ConsoleProgressReporter, DefaultEngineConfig, NoOpProgressReporter, TracingProgressReporter,
};
use crate::sync::CancellationSignal;

/// Ctrl-C でシグナルを発火する監視タスクを起動
pub(crate) fn cancel_on_ctrl_c(signal: CancellationSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n🛑 中断要求を受け付けました。処理中のタスクを終えて停止します");
            signal.fire();
        }
    });
}

/// 設定に合わせた進捗レポーター
pub(crate) fn reporter_for(config: &DefaultEngineConfig) -> Box<dyn ProgressReporter> {
    match (config.enable_progress_reporting(), config.log_progress()) {
        (false, _) => Box::new(NoOpProgressReporter::new()),
        (true, true) => Box::new(TracingProgressReporter::new()),
        (true, false) => Box::new(ConsoleProgressReporter::new()),
    }
}

/// 失敗したコマンドのエラーを重要度と対処方法つきで表示
pub fn report_failure(error: &anyhow::Error) {
    for line in failure_report(error) {
        eprintln!("{line}");
    }
}

fn failure_report(error: &anyhow::Error) -> Vec<String> {
    let Some(engine_error) = error.downcast_ref::<EngineError>() else {
        return vec![format!("❌ {error:#}")];
    };

    let severity = engine_error.severity();
    let context = engine_error.context();
    tracing::error!(
        severity = severity.as_level(),
        operation = %context.operation,
        "command failed"
    );

    let mut lines = vec![format!("❌ [{}] {engine_error}", severity.as_str())];
    if let Some(resource) = &context.resource {
        lines.push(format!("   - 対象: {resource}"));
    }
    if let Some(suggestion) = &context.suggestion {
        lines.push(format!("   💡 {suggestion}"));
    }
    if engine_error.is_recoverable() {
        lines.push("   - 再実行で解決する可能性があります".to_string());
    }
    lines
}

pub(crate) fn print_config(config: &DefaultEngineConfig) {
    println!("⚙️  設定:");
    println!("   - ワーカー数: {}", config.worker_count());
    println!("   - キュー容量: {}", config.queue_capacity());
    match config.task_timeout() {
        Some(timeout) => println!("   - タイムアウト: {}", humantime::format_duration(timeout)),
        None => println!("   - タイムアウト: なし"),
    }
}

pub(crate) fn print_summary(summary: &EngineSummary) {
    println!("📊 処理結果:");
    println!("   - 対象タスク数: {}", summary.total_tasks);
    println!("   - 成功: {}", summary.succeeded);
    println!("   - 失敗: {}", summary.failed);
    if summary.cancelled {
        println!("   - 未処理（キャンセル）: {}", summary.unfinished());
    }
    println!("   - 総処理時間: {}ms", summary.total_processing_time_ms);
    println!(
        "   - 平均処理時間: {:.2}ms/タスク",
        summary.average_time_per_task_ms
    );
}
