// エンジンで扱うデータ型定義

use super::error::TransformFailure;
use serde::{Deserialize, Serialize};

/// 作業単位
///
/// `id` は呼び出し側が割り当てる。一意性は同じ投入バッチ内でのみ要求される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task<T> {
    pub id: u64,
    pub payload: T,
}

impl<T> Task<T> {
    pub fn new(id: u64, payload: T) -> Self {
        Self { id, payload }
    }
}

/// タスクに変換を適用した結果
///
/// 受理されたタスク1つにつき必ず1つ生成される。`value` と `err` はどちらか一方のみが設定される。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult<U> {
    pub task_id: u64,
    pub value: Option<U>,
    pub err: Option<TransformFailure>,
}

impl<U> TaskResult<U> {
    pub fn success(task_id: u64, value: U) -> Self {
        Self {
            task_id,
            value: Some(value),
            err: None,
        }
    }

    pub fn failure(task_id: u64, err: TransformFailure) -> Self {
        Self {
            task_id,
            value: None,
            err: Some(err),
        }
    }

    pub fn is_success(&self) -> bool {
        self.err.is_none()
    }

    /// `Result` 形式へ変換
    pub fn into_result(self) -> Result<U, TransformFailure> {
        match (self.value, self.err) {
            (_, Some(err)) => Err(err),
            (Some(value), None) => Ok(value),
            (None, None) => Err(TransformFailure::failed("値もエラーも設定されていない結果")),
        }
    }
}

/// デモ用変換が区別するペイロードの形
///
/// 実行時の型判定の代わりに、既知の形を閉じた列挙型で表す。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    Number(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    /// ペイロードの種別名
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    /// ペイロードの大きさ（数値は絶対値、テキストは単語数、バイト列は長さ）
    pub fn magnitude(&self) -> u64 {
        match self {
            Self::Number(n) => n.unsigned_abs(),
            Self::Text(text) => text.split_whitespace().count() as u64,
            Self::Bytes(bytes) => bytes.len() as u64,
        }
    }
}

/// 実行全体のサマリー
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSummary {
    pub total_tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub total_processing_time_ms: u64,
    pub average_time_per_task_ms: f64,
}

impl EngineSummary {
    /// 結果が届かなかったタスク数（キャンセル時のみ0より大きくなる）
    pub fn unfinished(&self) -> usize {
        self.total_tasks
            .saturating_sub(self.succeeded + self.failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation() {
        let task = Task::new(7, Payload::Number(21));
        assert_eq!(task.id, 7);
        assert_eq!(task.payload, Payload::Number(21));
    }

    #[test]
    fn test_task_result_success() {
        let result = TaskResult::success(3, 6);
        assert!(result.is_success());
        assert_eq!(result.task_id, 3);
        assert_eq!(result.into_result(), Ok(6));
    }

    #[test]
    fn test_task_result_failure() {
        let result: TaskResult<i32> = TaskResult::failure(4, TransformFailure::failed("boom"));
        assert!(!result.is_success());
        assert!(result.value.is_none());
        assert_eq!(result.into_result(), Err(TransformFailure::failed("boom")));
    }

    #[test]
    fn test_payload_kind_and_magnitude() {
        assert_eq!(Payload::Number(-12).kind(), "number");
        assert_eq!(Payload::Number(-12).magnitude(), 12);
        assert_eq!(Payload::Text("hola mundo go".into()).magnitude(), 3);
        assert_eq!(Payload::Bytes(vec![0; 5]).magnitude(), 5);
    }

    #[test]
    fn test_payload_serialization() {
        let json = serde_json::to_string(&Payload::Text("hi".into())).unwrap();
        assert_eq!(json, r#"{"kind":"text","value":"hi"}"#);

        let back: Payload = serde_json::from_str(r#"{"kind":"number","value":5}"#).unwrap();
        assert_eq!(back, Payload::Number(5));
    }

    #[test]
    fn test_engine_summary_unfinished() {
        let summary = EngineSummary {
            total_tasks: 10,
            succeeded: 6,
            failed: 1,
            cancelled: true,
            started_at: chrono::Utc::now(),
            total_processing_time_ms: 12,
            average_time_per_task_ms: 1.7,
        };

        assert_eq!(summary.unfinished(), 3);
    }
}
