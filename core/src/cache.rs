//! Time-bounded memoization of IDF tables and term vectors.
//!
//! Both tables share one epoch: entries are served only while the epoch is
//! younger than the policy's TTL. Everything here is derived data, so a cold
//! cache must produce exactly what a warm one does. Keys are SHA-1 digests of
//! the full input text, never prefixes.

use crate::tokenizer::Tokenizer;
use crate::vector::{IdfTable, TermVector};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// When cached entries stop being trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self { Self { ttl: DEFAULT_TTL } }
}

impl CachePolicy {
    pub fn new(ttl: Duration) -> Self { Self { ttl } }

    pub fn is_fresh(&self, epoch: Option<Instant>, now: Instant) -> bool {
        epoch.is_some_and(|e| now.saturating_duration_since(e) < self.ttl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Digest20([u8; 20]);

impl Digest20 {
    fn of_corpus<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update((texts.len() as u64).to_le_bytes());
        for text in texts {
            let bytes = text.as_ref().as_bytes();
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        Self::from_slice(&hasher.finalize())
    }

    fn of_text(text: &str) -> Self { Self::from_slice(&Sha1::digest(text.as_bytes())) }

    fn from_slice(bytes: &[u8]) -> Self {
        let mut out = [0u8; 20];
        out.copy_from_slice(bytes);
        Self(out)
    }
}

/// Handle to a cached IDF table; carries the corpus digest so vector lookups
/// can be keyed by (text, corpus) rather than by table size.
#[derive(Debug, Clone)]
pub struct CorpusIdf {
    signature: Digest20,
    table: Arc<IdfTable>,
}

impl CorpusIdf {
    pub fn table(&self) -> &IdfTable { &self.table }
}

#[derive(Debug, Default)]
pub struct CorpusCache {
    policy: CachePolicy,
    epoch: Option<Instant>,
    idf: HashMap<Digest20, Arc<IdfTable>>,
    vectors: HashMap<(Digest20, Digest20), Arc<TermVector>>,
    hits: u64,
    misses: u64,
}

impl CorpusCache {
    pub fn new(policy: CachePolicy) -> Self { Self { policy, ..Self::default() } }

    pub fn policy(&self) -> CachePolicy { self.policy }

    /// IDF table for `texts`, built on a miss. Only one corpus is kept: a
    /// miss drops the previous corpus's table and vectors.
    pub fn idf<S: AsRef<str>>(&mut self, tokenizer: &Tokenizer, texts: &[S]) -> CorpusIdf {
        let now = Instant::now();
        self.expire(now);
        let signature = Digest20::of_corpus(texts);
        if let Some(table) = self.idf.get(&signature) {
            self.hits += 1;
            tracing::debug!(terms = table.len(), "idf cache hit");
            return CorpusIdf { signature, table: Arc::clone(table) };
        }
        self.misses += 1;
        if !self.idf.is_empty() {
            tracing::debug!(entries = self.len(), "new corpus, dropping previous one");
            self.idf.clear();
            self.vectors.clear();
        }
        let table = Arc::new(IdfTable::build(tokenizer, texts));
        tracing::debug!(docs = texts.len(), terms = table.len(), "idf cache miss");
        self.idf.insert(signature, Arc::clone(&table));
        self.epoch = Some(now);
        CorpusIdf { signature, table }
    }

    /// TF-IDF vector of `text` against a table previously returned by [`Self::idf`].
    pub fn vector(&mut self, tokenizer: &Tokenizer, text: &str, idf: &CorpusIdf) -> Arc<TermVector> {
        self.expire(Instant::now());
        let key = (Digest20::of_text(text), idf.signature);
        if let Some(vector) = self.vectors.get(&key) {
            self.hits += 1;
            return Arc::clone(vector);
        }
        self.misses += 1;
        let vector = Arc::new(TermVector::from_text(tokenizer, text, idf.table()));
        self.vectors.insert(key, Arc::clone(&vector));
        vector
    }

    /// Drop every entry and reset the epoch.
    pub fn invalidate(&mut self) {
        self.idf.clear();
        self.vectors.clear();
        self.epoch = None;
        tracing::debug!("corpus cache invalidated");
    }

    pub fn len(&self) -> usize { self.idf.len() + self.vectors.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn hits(&self) -> u64 { self.hits }
    pub fn misses(&self) -> u64 { self.misses }

    /// Time since the epoch was last set, if any.
    pub fn age(&self) -> Option<Duration> { self.epoch.map(|e| e.elapsed()) }

    fn expire(&mut self, now: Instant) {
        if self.epoch.is_some() && !self.policy.is_fresh(self.epoch, now) {
            self.invalidate();
        }
    }
}
