//! Deterministic test doubles shared by unit tests.
//!
//! Only compiled for tests. The embedder hashes words into buckets so that
//! vocabulary overlap produces high cosine similarity without any network
//! access; the chat model replays scripted responses.

use crate::embedding::Embedder;
use crate::error::{ReplikkError, Result};
use crate::llm::ChatModel;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Dimension of the hash embedding space.
pub const HASH_DIMS: usize = 64;

fn bucket(word: &str) -> usize {
    let mut h: u32 = 0;
    for b in word.bytes() {
        h = h.wrapping_mul(31).wrapping_add(b as u32);
    }
    (h % HASH_DIMS as u32) as usize
}

/// Bag-of-words hash embedding: each normalized word increments one bucket.
pub fn keyword_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; HASH_DIMS];
    for word in text.split_whitespace() {
        let normalized: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        if normalized.is_empty() {
            continue;
        }
        v[bucket(&normalized)] += 1.0;
    }
    v
}

/// Deterministic embedder over [`keyword_embedding`].
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(keyword_embedding(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| keyword_embedding(t)).collect())
    }

    fn dimensions(&self) -> usize {
        HASH_DIMS
    }
}

/// Chat model that replays queued responses and records every prompt.
pub struct ScriptedChat {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedChat {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|s| s.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A chat model that fails on any call; used to prove a path makes no
    /// generation calls.
    pub fn refusing() -> Self {
        Self::new(vec![])
    }

    /// Number of completions served so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Prompts recorded so far, as (system, user) pairs.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ReplikkError::Generation("no scripted response left".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::cosine_similarity;

    #[test]
    fn test_keyword_embedding_overlap_scores() {
        let line = keyword_embedding("MORPHEUS: The machines need solar power to survive.");
        let related = keyword_embedding("Who needs solar power to survive?");
        let unrelated = keyword_embedding("zebra quantum paradox");

        let related_score = cosine_similarity(&line, &related);
        let unrelated_score = cosine_similarity(&line, &unrelated);

        assert!(related_score > 0.4, "related score {}", related_score);
        assert!(related_score > unrelated_score);
    }

    #[tokio::test]
    async fn test_scripted_chat_replays_in_order() {
        let chat = ScriptedChat::new(vec!["first", "second"]);
        assert_eq!(chat.complete("s", "u").await.unwrap(), "first");
        assert_eq!(chat.complete("s", "u").await.unwrap(), "second");
        assert!(chat.complete("s", "u").await.is_err());
        assert_eq!(chat.call_count(), 3);
    }
}
