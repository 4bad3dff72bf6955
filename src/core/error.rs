// エンジン専用のカスタムエラー型定義
// チャンネルのプロトコル違反、タスク単位の変換失敗、オーケストレーションのエラーを区別する

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// チャンネルのプロトコル違反
///
/// どちらも呼び出し側のバグを意味するため回復不能として扱う。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("クローズ済みチャンネルへの送信 (ClosedChannelError)")]
    Closed,

    #[error("チャンネルの二重クローズ (DoubleCloseError)")]
    DoubleClose,
}

/// `send` が拒否された値を呼び出し側へ返すためのエラー
///
/// 送信しようとした値を失わないよう保持する。
#[derive(Error, Clone, PartialEq, Eq)]
#[error("クローズ済みチャンネルへの送信 (ClosedChannelError)")]
pub struct SendError<T>(pub T);

impl<T> SendError<T> {
    /// 拒否された値を取り出す
    pub fn into_inner(self) -> T {
        self.0
    }
}

// 値の型にDebugを要求しない
impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendError").finish_non_exhaustive()
    }
}

impl<T> From<SendError<T>> for ChannelError {
    fn from(_: SendError<T>) -> Self {
        ChannelError::Closed
    }
}

/// ワーカーの変換処理で発生したタスク単位の失敗
///
/// ワーカーの外へは伝播させず、`TaskResult::err` にデータとして載せる。
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformFailure {
    #[error("変換失敗: {message}")]
    Failed { message: String },

    #[error("変換中のパニック: {message}")]
    Panicked { message: String },

    #[error("変換タイムアウト: {after:?}")]
    TimedOut { after: Duration },
}

impl TransformFailure {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn panicked(message: impl Into<String>) -> Self {
        Self::Panicked {
            message: message.into(),
        }
    }

    pub fn timed_out(after: Duration) -> Self {
        Self::TimedOut { after }
    }
}

impl From<anyhow::Error> for TransformFailure {
    fn from(error: anyhow::Error) -> Self {
        // コンテキストチェーンも含めて文字列化
        Self::failed(format!("{error:#}"))
    }
}

/// エンジンのオーケストレーションで発生するエラー型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("設定エラー: {message}")]
    ConfigurationError { message: String },

    #[error("バリデーションエラー: {field} - {reason}")]
    ValidationError { field: String, reason: String },

    #[error("チャンネルエラー: {operation} - {source}")]
    ChannelError {
        operation: String,
        #[source]
        source: ChannelError,
    },

    #[error("タスクエラー: {source}")]
    TaskError {
        #[source]
        source: tokio::task::JoinError,
    },

    #[error("結果シンクエラー: {source}")]
    SinkError {
        #[source]
        source: anyhow::Error,
    },

    #[error("内部エラー: {source}")]
    InternalError {
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    /// 設定エラーの作成
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// バリデーションエラーの作成
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// チャンネルエラーの作成
    pub fn channel(operation: impl Into<String>, source: ChannelError) -> Self {
        Self::ChannelError {
            operation: operation.into(),
            source,
        }
    }

    /// タスクエラーの作成
    pub fn task(source: tokio::task::JoinError) -> Self {
        Self::TaskError { source }
    }

    /// 結果シンクエラーの作成
    pub fn sink(source: anyhow::Error) -> Self {
        Self::SinkError { source }
    }

    /// 内部エラーの作成
    pub fn internal(source: anyhow::Error) -> Self {
        Self::InternalError { source }
    }

    /// エラーの重要度を取得
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ChannelError { .. } | Self::InternalError { .. } => ErrorSeverity::Critical,
            Self::ConfigurationError { .. } | Self::ValidationError { .. } => ErrorSeverity::High,
            Self::TaskError { .. } | Self::SinkError { .. } => ErrorSeverity::Medium,
        }
    }

    /// エラーが回復可能かどうかを判定
    ///
    /// チャンネルのプロトコル違反は不変条件の破れなので回復不能。
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ChannelError { .. } | Self::InternalError { .. } => false,
            Self::ConfigurationError { .. } | Self::ValidationError { .. } => false,
            Self::TaskError { .. } => true,
            Self::SinkError { .. } => true,
        }
    }

    /// エラーコンテキストを取得
    pub fn context(&self) -> ErrorContext {
        match self {
            Self::ChannelError { operation, .. } => ErrorContext::new("channel_protocol")
                .with_resource(operation.clone())
                .with_suggestion("クローズはプロデューサー1つだけが1回だけ行ってください"),
            Self::ValidationError { field, .. } => ErrorContext::new("validation")
                .with_resource(field.clone())
                .with_suggestion("設定値の範囲を確認してください"),
            Self::ConfigurationError { message } => ErrorContext::new("configuration")
                .with_suggestion(format!("設定を確認してください: {message}")),
            _ => ErrorContext::new("unknown"),
        }
    }
}

/// エラーの重要度レベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// 低重要度 - ログ出力程度
    Low,
    /// 中重要度 - 警告レベル
    Medium,
    /// 高重要度 - 要対応
    High,
    /// 致命的 - 不変条件の破れ
    Critical,
}

impl ErrorSeverity {
    pub const fn as_level(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// エラーコンテキスト情報
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// 実行していた操作
    pub operation: String,
    /// 関連するリソース（チャンネル名、設定項目等）
    pub resource: Option<String>,
    /// エラー解決のための提案
    pub suggestion: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            resource: None,
            suggestion: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// エンジン処理の結果型
pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl From<anyhow::Error> for EngineError {
    fn from(error: anyhow::Error) -> Self {
        EngineError::InternalError { source: error }
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(error: tokio::task::JoinError) -> Self {
        EngineError::TaskError { source: error }
    }
}
