// デモ用の変換実装
// ペイロードの種別で振る舞いを変える

use crate::core::{Payload, TaskTransform};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

/// 数値を2乗する。数値以外とオーバーフローは失敗
#[derive(Debug, Default, Clone, Copy)]
pub struct SquareTransform;

#[async_trait]
impl TaskTransform for SquareTransform {
    type Input = Payload;
    type Output = i64;

    async fn apply(&self, payload: Payload) -> Result<i64> {
        match payload {
            Payload::Number(n) => n
                .checked_mul(n)
                .with_context(|| format!("{n} の2乗はi64に収まりません")),
            other => bail!("数値ではないペイロード: {}", other.kind()),
        }
    }
}

/// テキストの単語数を数える
#[derive(Debug, Default, Clone, Copy)]
pub struct WordCountTransform;

#[async_trait]
impl TaskTransform for WordCountTransform {
    type Input = Payload;
    type Output = u64;

    async fn apply(&self, payload: Payload) -> Result<u64> {
        match payload {
            Payload::Text(_) => Ok(payload.magnitude()),
            Payload::Bytes(bytes) => {
                let text = std::str::from_utf8(&bytes).context("UTF-8ではないバイト列")?;
                Ok(text.split_whitespace().count() as u64)
            }
            Payload::Number(_) => bail!("テキストではないペイロード: number"),
        }
    }
}

/// 任意のペイロードの大きさを返す。`delay` だけ待ってから応答する
#[derive(Debug, Default, Clone, Copy)]
pub struct MagnitudeTransform {
    delay: Duration,
}

impl MagnitudeTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl TaskTransform for MagnitudeTransform {
    type Input = Payload;
    type Output = u64;

    async fn apply(&self, payload: Payload) -> Result<u64> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(payload.magnitude())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_square_transform() {
        assert_eq!(SquareTransform.apply(Payload::Number(-7)).await.unwrap(), 49);

        let overflow = SquareTransform.apply(Payload::Number(i64::MAX)).await;
        assert!(overflow.is_err());

        let error = SquareTransform
            .apply(Payload::Text("hola".into()))
            .await
            .unwrap_err();
        assert!(error.to_string().contains("text"));
    }

    #[tokio::test]
    async fn test_word_count_transform() {
        let count = WordCountTransform
            .apply(Payload::Text("el veloz  murciélago\nhindú".into()))
            .await
            .unwrap();
        assert_eq!(count, 4);

        let bytes = WordCountTransform
            .apply(Payload::Bytes(b"uno dos".to_vec()))
            .await
            .unwrap();
        assert_eq!(bytes, 2);

        assert!(WordCountTransform.apply(Payload::Bytes(vec![0xff, 0xfe])).await.is_err());
        assert!(WordCountTransform.apply(Payload::Number(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_magnitude_transform() {
        let transform = MagnitudeTransform::new();
        assert_eq!(transform.apply(Payload::Number(-3)).await.unwrap(), 3);
        assert_eq!(transform.apply(Payload::Bytes(vec![1, 2])).await.unwrap(), 2);

        let delayed = MagnitudeTransform::with_delay(Duration::from_millis(5));
        assert_eq!(delayed.apply(Payload::Text("a b c".into())).await.unwrap(), 3);
    }
}
