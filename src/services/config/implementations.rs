// 設定管理の具象実装

use crate::core::{EngineConfig, EngineError, EngineResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// デフォルト設定実装
///
/// TOMLファイルから読み込める。タイムアウトは `"250ms"` のような人間向けの表記で書く。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultEngineConfig {
    worker_count: usize,
    queue_capacity: usize,
    #[serde(with = "humantime_serde")]
    task_timeout: Option<Duration>,
    batch_size: usize,
    enable_progress: bool,
    // 進捗をコンソールではなくtracingのイベントとして出す
    log_progress: bool,
}

impl DefaultEngineConfig {
    pub fn new(cpu_count: usize) -> Self {
        Self {
            worker_count: cpu_count.max(1) * 2,
            queue_capacity: 100,
            task_timeout: None,
            batch_size: 50,
            enable_progress: true,
            log_progress: false,
        }
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_progress_reporting(mut self, enable: bool) -> Self {
        self.enable_progress = enable;
        self
    }

    pub fn with_progress_log(mut self, enable: bool) -> Self {
        self.log_progress = enable;
        self
    }

    pub fn log_progress(&self) -> bool {
        self.log_progress
    }

    /// 名前付きプリセットから作成
    pub fn preset(name: &str) -> EngineResult<Self> {
        match name {
            "default" => Ok(Self::default()),
            "high_throughput" => Ok(Self::new(num_cpus::get())
                .with_worker_count(num_cpus::get().max(1) * 4)
                .with_queue_capacity(1024)
                .with_batch_size(200)
                .with_progress_reporting(false)),
            "testing" => Ok(Self::new(1)
                .with_worker_count(2)
                .with_queue_capacity(4)
                .with_timeout(Some(Duration::from_secs(1)))
                .with_batch_size(2)
                .with_progress_reporting(false)),
            other => Err(EngineError::configuration(format!(
                "未サポートのプリセット: {other}. 利用可能: {}",
                Self::available_presets().join(", ")
            ))),
        }
    }

    pub fn available_presets() -> &'static [&'static str] {
        &["default", "high_throughput", "testing"]
    }

    /// TOML文字列から読み込み、検証する
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(source).context("設定ファイルの解析に失敗しました")?;
        config.validate()?;
        Ok(config)
    }

    /// TOMLファイルから読み込み、検証する
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("設定ファイルを読み込めません: {}", path.display()))?;
        Self::from_toml_str(&source)
    }

    /// 設定値を検証
    pub fn validate(&self) -> EngineResult<()> {
        validate_config(self)
    }
}

impl Default for DefaultEngineConfig {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl EngineConfig for DefaultEngineConfig {
    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn enable_progress_reporting(&self) -> bool {
        self.enable_progress
    }
}

/// 任意の `EngineConfig` 実装を検証
pub fn validate_config<C: EngineConfig + ?Sized>(config: &C) -> EngineResult<()> {
    if config.worker_count() == 0 {
        return Err(EngineError::validation(
            "worker_count",
            "ワーカー数は1以上である必要があります",
        ));
    }

    if config.batch_size() == 0 {
        return Err(EngineError::validation(
            "batch_size",
            "バッチサイズは1以上である必要があります",
        ));
    }

    if config.task_timeout().is_some_and(|t| t.is_zero()) {
        return Err(EngineError::validation(
            "task_timeout",
            "タイムアウトは0より大きい必要があります",
        ));
    }

    Ok(())
}
