//! HR policy question answering over a passage index.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use proto::ToolError;
use tracing::{debug, info};

use crate::Tool;

/// Passage size used when splitting policy documents.
pub const DEFAULT_CHUNK_SIZE: usize = 250;
/// Characters shared between consecutive passages.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

// BM25 parameters.
const K1: f32 = 1.2;
const B: f32 = 0.75;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "be", "can", "do", "does", "for", "from", "get", "have", "how",
    "in", "is", "it", "many", "me", "my", "of", "on", "or", "our", "that", "the", "this", "to",
    "we", "what", "when", "where", "which", "who", "with", "you", "your", "about",
];

/// Similarity search over policy passages
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Returns up to `k` passages, best match first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, ToolError>;
}

/// Lowercased search tokens of two or more characters, minus stopwords.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
        .filter(|t| t.chars().count() >= 2 && !STOPWORDS.contains(t))
        .map(String::from)
        .collect()
}

/// Inverted index over fixed-size passages, ranked with BM25
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    passages: Vec<String>,
    /// Token -> (passage, term frequency)
    postings: HashMap<String, Vec<(usize, u32)>>,
    passage_lengths: Vec<u32>,
    avg_passage_length: f32,
}

impl KeywordIndex {
    /// Splits `text` into passages and indexes them.
    pub fn from_text(text: &str, chunk_size: usize, overlap: usize) -> Self {
        let passages = split_passages(text, chunk_size, overlap);
        let mut postings: HashMap<String, Vec<(usize, u32)>> = HashMap::new();
        let mut passage_lengths = Vec::with_capacity(passages.len());

        for (idx, passage) in passages.iter().enumerate() {
            let tokens = tokenize(passage);
            passage_lengths.push(tokens.len() as u32);

            let mut term_counts: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *term_counts.entry(token).or_insert(0) += 1;
            }
            for (token, freq) in term_counts {
                postings.entry(token).or_default().push((idx, freq));
            }
        }

        let total: u32 = passage_lengths.iter().sum();
        let avg_passage_length = if passages.is_empty() {
            0.0
        } else {
            total as f32 / passages.len() as f32
        };
        Self {
            passages,
            postings,
            passage_lengths,
            avg_passage_length,
        }
    }

    /// Reads a plain-text policy document and indexes it with default chunking.
    pub async fn load(path: &Path) -> Result<Self, ToolError> {
        let text = tokio::fs::read_to_string(path).await?;
        let index = Self::from_text(&text, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP);
        info!(path = %path.display(), passages = index.len(), "Policy index built");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Passage indices with their score in thousandths, best first, ties by position.
    fn rank(&self, query: &str) -> Vec<(usize, i32)> {
        let mut scores: HashMap<usize, f32> = HashMap::new();
        let passage_count = self.passages.len() as f32;

        for token in tokenize(query) {
            let Some(posting) = self.postings.get(&token) else {
                continue;
            };
            let n = posting.len() as f32;
            let idf = ((passage_count - n + 0.5) / (n + 0.5) + 1.0).ln();
            for &(idx, tf) in posting {
                let len = self.passage_lengths[idx] as f32;
                let norm = 1.0 - B + B * (len / self.avg_passage_length.max(1.0));
                let tf_score = (tf as f32 * (K1 + 1.0)) / (tf as f32 + K1 * norm);
                *scores.entry(idx).or_insert(0.0) += idf * tf_score;
            }
        }

        let mut ranked: Vec<(usize, i32)> = scores
            .into_iter()
            .map(|(idx, score)| (idx, (score * 1000.0) as i32))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }
}

#[async_trait]
impl DocumentIndex for KeywordIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, ToolError> {
        let ranked = self.rank(query);
        debug!(query = %query, hits = ranked.len(), "Policy index searched");
        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(idx, _)| self.passages[idx].clone())
            .collect())
    }
}

/// Splits text into word-aligned passages of at most `chunk_size` characters.
///
/// Each passage after the first starts with the trailing words of the
/// previous one, up to `overlap` characters.
fn split_passages(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut passages = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let added = if current.is_empty() { word_len } else { word_len + 1 };
        if !current.is_empty() && current_len + added > chunk_size {
            passages.push(current.join(" "));

            let mut carried: Vec<&str> = Vec::new();
            let mut carried_len = 0usize;
            for w in current.iter().rev() {
                let w_len = w.chars().count();
                let extra = if carried.is_empty() { w_len } else { w_len + 1 };
                if carried_len + extra > overlap {
                    break;
                }
                carried.insert(0, *w);
                carried_len += extra;
            }
            current = carried;
            current_len = carried_len;
        }
        current_len += if current.is_empty() { word_len } else { word_len + 1 };
        current.push(word);
    }
    if !current.is_empty() {
        passages.push(current.join(" "));
    }
    passages
}

/// Answers HR policy questions with passages from the policy documents
pub struct PolicyQaTool {
    index: Arc<dyn DocumentIndex>,
    top_k: usize,
}

impl PolicyQaTool {
    /// Creates the tool returning at most `top_k` passages per question.
    pub fn new(index: Arc<dyn DocumentIndex>, top_k: usize) -> Self {
        Self {
            index,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl Tool for PolicyQaTool {
    fn name(&self) -> &str {
        "hr_policy_qa_tool"
    }

    fn description(&self) -> &str {
        "useful to answer questions about the company's HR policies (vacation, benefits, conduct, etc). \
         The input is the question. The output is the most relevant excerpts of the policies."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let question = input.trim();
        if question.is_empty() {
            return Err(ToolError::InvalidArgs("expected a question".to_string()));
        }
        let passages = self.index.search(question, self.top_k).await?;
        if passages.is_empty() {
            return Ok("No relevant passages found in the HR policies.".to_string());
        }
        Ok(passages
            .iter()
            .enumerate()
            .map(|(i, p)| format!("[{}] {p}", i + 1))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
