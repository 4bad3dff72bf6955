use super::{print_summary, reporter_for};
use crate::engine::TaskEngine;
use crate::services::{DefaultEngineConfig, MemoryResultSink, NewPost, PostStore, WordCountTransform};
use anyhow::{Context, Result};
use std::path::Path;

/// Load posts from a JSON file, or fall back to a small built-in set
pub fn load_posts(file: Option<&Path>) -> Result<Vec<NewPost>> {
    let Some(path) = file else {
        return Ok(sample_posts());
    };

    let source = std::fs::read_to_string(path)
        .with_context(|| format!("投稿ファイルを読み込めません: {}", path.display()))?;
    serde_json::from_str(&source)
        .with_context(|| format!("投稿ファイルの形式が不正です: {}", path.display()))
}

fn sample_posts() -> Vec<NewPost> {
    [
        ("Hola", "hola mundo desde el motor de tareas"),
        ("Canales", "los canales conectan productores y consumidores"),
        ("Select", "espera al primero que este listo"),
    ]
    .into_iter()
    .map(|(title, content)| NewPost {
        title: title.to_string(),
        content: content.to_string(),
    })
    .collect()
}

/// Execute posts command: store posts, then count words of each on the worker pool
pub async fn execute_posts(config: DefaultEngineConfig, posts: Vec<NewPost>) -> Result<PostStore> {
    let store = PostStore::new();
    for post in posts {
        store.create(post);
    }
    println!("📝 {} 件の投稿の単語数を数えます", store.len());

    let reporter = reporter_for(&config);
    let sink = MemoryResultSink::new();
    let engine = TaskEngine::new(WordCountTransform, config, reporter, sink.clone());
    let run = engine.execute(store.to_tasks()).await?;
    let word_counts = sink.get_stored_data()?;

    for post in store.list() {
        match word_counts.get(&post.id) {
            Some(words) => println!("   #{} {}: {words} 語", post.id, post.title),
            None => println!("   #{} {}: 集計できませんでした", post.id, post.title),
        }
    }

    print_summary(&run.summary);
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_execute_posts_with_samples() {
        let config = DefaultEngineConfig::new(1).with_progress_reporting(false);
        let store = execute_posts(config, load_posts(None).unwrap()).await.unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.get(1).unwrap().title, "Hola");
    }

    #[test]
    fn test_load_posts_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"title": "a", "content": "uno dos"}}]"#).unwrap();

        let posts = load_posts(Some(file.path())).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content, "uno dos");
    }

    #[test]
    fn test_load_posts_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(load_posts(Some(file.path())).is_err());
    }
}
