// ロギング初期化 - tracingのグローバルサブスクライバーを設定

use anyhow::{Context, Result};
use std::io::IsTerminal;
use tracing_subscriber::{
    filter::{self, FilterExt},
    fmt::layer,
    prelude::*,
    registry,
};

/// グローバルなtracingサブスクライバーを初期化
///
/// `RUST_LOG` は全クレートに適用され、未設定なら `warn`。
/// `TASK_ENGINE_LOG` はそれに加えて適用され、未設定なら無効。
/// 出力は標準エラーで、標準出力のコマンド結果とは混ざらない。
pub fn init() -> Result<()> {
    let env_filter = filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::WARN.into())
        .from_env()
        .context("invalid env filter")?;

    let engine_env_filter = filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::OFF.into())
        .with_env_var("TASK_ENGINE_LOG")
        .from_env()
        .context("invalid task engine log filter")?;

    let fmt_layer = layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_thread_ids(true)
        .with_filter(env_filter.or(engine_env_filter));

    registry()
        .with(fmt_layer)
        .try_init()
        .context("global tracing subscriber already set")?;

    Ok(())
}
