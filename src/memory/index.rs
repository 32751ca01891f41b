//! Secondary indexes over the memory store
//!
//! Maintains type, tag, and keyword postings. All three are derived state:
//! they are rebuilt from raw records after a load and must never contain
//! orphaned or duplicate postings for a memory id.

use crate::memory::types::{Memory, MemoryType};
use std::collections::{HashMap, HashSet};

/// Tokens shorter than this are dropped during keyword extraction
const MIN_TOKEN_LEN: usize = 3;

/// Light stop-word list for keyword extraction
const STOPWORDS: &[&str] = &[
    "the", "and", "that", "this", "with", "from", "have", "would", "there", "could", "should",
    "about", "after", "before", "while", "since", "where", "which", "into", "using", "also",
    "because", "these", "those", "been", "being", "were", "does", "done", "when", "then", "than",
    "your", "their", "them", "they", "what", "will", "over", "just", "more", "only", "for", "are",
    "was", "not", "but", "you", "all", "can", "has", "had",
];

/// Tokenize content for the keyword index: lowercase, split on
/// non-alphanumeric boundaries, drop short tokens and stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut tokens = Vec::new();

    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        if raw.len() < MIN_TOKEN_LEN {
            continue;
        }
        let token = raw.to_lowercase();
        if STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        if seen.insert(token.clone()) {
            tokens.push(token);
        }
    }

    tokens
}

/// Secondary index set: by type, by tag, by content keyword
#[derive(Debug, Default)]
pub struct MemoryIndexes {
    by_type: HashMap<MemoryType, HashSet<String>>,
    by_tag: HashMap<String, HashSet<String>>,
    by_keyword: HashMap<String, HashSet<String>>,
}

impl MemoryIndexes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add postings for a memory. Callers must `remove` the previous
    /// version first when reindexing an updated record.
    pub fn insert(&mut self, memory: &Memory) {
        self.by_type
            .entry(memory.memory_type)
            .or_default()
            .insert(memory.id.clone());

        for tag in &memory.tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(memory.id.clone());
        }

        for keyword in tokenize(&memory.content) {
            self.by_keyword
                .entry(keyword)
                .or_default()
                .insert(memory.id.clone());
        }
    }

    /// Remove every posting for a memory, pruning empty posting sets
    pub fn remove(&mut self, memory: &Memory) {
        if let Some(ids) = self.by_type.get_mut(&memory.memory_type) {
            ids.remove(&memory.id);
            if ids.is_empty() {
                self.by_type.remove(&memory.memory_type);
            }
        }

        for tag in &memory.tags {
            if let Some(ids) = self.by_tag.get_mut(tag) {
                ids.remove(&memory.id);
                if ids.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }

        for keyword in tokenize(&memory.content) {
            if let Some(ids) = self.by_keyword.get_mut(&keyword) {
                ids.remove(&memory.id);
                if ids.is_empty() {
                    self.by_keyword.remove(&keyword);
                }
            }
        }
    }

    /// Memory ids of the given type
    pub fn ids_by_type(&self, memory_type: MemoryType) -> HashSet<String> {
        self.by_type.get(&memory_type).cloned().unwrap_or_default()
    }

    /// Memory ids carrying any of the given tags
    pub fn ids_by_any_tag<'a, I>(&self, tags: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut result = HashSet::new();
        for tag in tags {
            if let Some(ids) = self.by_tag.get(tag) {
                result.extend(ids.iter().cloned());
            }
        }
        result
    }

    /// Memory ids whose content contains any of the given keywords
    pub fn ids_by_any_keyword<'a, I>(&self, keywords: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut result = HashSet::new();
        for keyword in keywords {
            if let Some(ids) = self.by_keyword.get(&keyword.to_lowercase()) {
                result.extend(ids.iter().cloned());
            }
        }
        result
    }

    /// Keywords of a memory that appear in a query token set
    pub fn keyword_overlap(&self, memory: &Memory, query_tokens: &[String]) -> usize {
        let memory_tokens: HashSet<String> = tokenize(&memory.content).into_iter().collect();
        query_tokens
            .iter()
            .filter(|token| memory_tokens.contains(*token))
            .count()
    }

    /// Total posting count across all three indexes
    pub fn posting_count(&self) -> usize {
        let type_postings: usize = self.by_type.values().map(|ids| ids.len()).sum();
        let tag_postings: usize = self.by_tag.values().map(|ids| ids.len()).sum();
        let keyword_postings: usize = self.by_keyword.values().map(|ids| ids.len()).sum();
        type_postings + tag_postings + keyword_postings
    }

    /// Drop all postings
    pub fn clear(&mut self) {
        self.by_type.clear();
        self.by_tag.clear();
        self.by_keyword.clear();
    }
}
