//! Embedding seam and field-path text extraction.
//!
//! The store never embeds on its own: callers hand it an [`EmbeddingProvider`]
//! and an [`IndexConfig`] naming which parts of each value to embed. Each
//! configured field path yields zero or more texts, and each text becomes one
//! vector, so one item may carry several vectors (chunked content).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Path that selects the entire value, embedded as its JSON serialization.
pub const ROOT_PATH: &str = "$";

/// Trait for embedding text into vectors.
///
/// All methods are synchronous. [`AsyncStore`](crate::store::asynchronous::AsyncStore)
/// already runs store calls on the blocking pool.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;
}

/// Which fields of a value get embedded on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub fields: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            fields: vec![ROOT_PATH.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Key(String),
    Index(i64),
    Wildcard,
}

fn tokenize(path: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    tokens.push(Token::Key(std::mem::take(&mut current)));
                }
            }
            '[' => {
                if !current.is_empty() {
                    tokens.push(Token::Key(std::mem::take(&mut current)));
                }
                let inner: String = chars.by_ref().take_while(|&c| c != ']').collect();
                let inner = inner.trim();
                if inner == "*" {
                    tokens.push(Token::Wildcard);
                } else if let Ok(i) = inner.parse::<i64>() {
                    tokens.push(Token::Index(i));
                } else if !inner.is_empty() {
                    tokens.push(Token::Key(inner.trim_matches(&['"', '\''][..]).to_string()));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(Token::Key(current));
    }
    tokens
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn walk(current: &Value, tokens: &[Token], concrete: String, out: &mut Vec<(String, String)>) {
    let Some((token, rest)) = tokens.split_first() else {
        if let Some(text) = text_of(current) {
            out.push((concrete, text));
        }
        return;
    };

    match (token, current) {
        (Token::Key(k), Value::Object(map)) => {
            if let Some(next) = map.get(k) {
                walk(next, rest, format!("{concrete}.{k}"), out);
            }
        }
        (Token::Index(i), Value::Array(items)) => {
            let len = items.len() as i64;
            let resolved = if *i < 0 { len + i } else { *i };
            if (0..len).contains(&resolved) {
                walk(&items[resolved as usize], rest, format!("{concrete}[{resolved}]"), out);
            }
        }
        (Token::Wildcard, Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, rest, format!("{concrete}[{i}]"), out);
            }
        }
        _ => {}
    }
}

/// Texts selected by `path`, each paired with the concrete path it came from
/// (wildcards and negative indices resolved). Missing paths yield nothing.
pub fn extract_texts(value: &Map<String, Value>, path: &str) -> Vec<(String, String)> {
    if path.trim() == ROOT_PATH {
        return vec![(ROOT_PATH.to_string(), Value::Object(value.clone()).to_string())];
    }

    let tokens = tokenize(path);
    let mut out = Vec::new();
    if let Some((Token::Key(first), rest)) = tokens.split_first() {
        if let Some(next) = value.get(first) {
            walk(next, rest, first.clone(), &mut out);
        }
    }
    out
}
