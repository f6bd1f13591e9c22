use crate::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Terms whose inverse document frequency falls to this value or below are pruned.
pub const MIN_IDF: f64 = 0.1;
/// Vector weights at or below this value are pruned.
pub const MIN_WEIGHT: f64 = 0.01;

/// Inverse document frequencies for one corpus (one recommendation request).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdfTable {
    weights: BTreeMap<String, f64>,
    num_docs: usize,
}

impl IdfTable {
    /// `idf(t) = ln((N + 1) / (df(t) + 1)) + 1`, df counting each document once.
    pub fn build<S: AsRef<str>>(tokenizer: &Tokenizer, texts: &[S]) -> Self {
        let mut df: BTreeMap<String, u32> = BTreeMap::new();
        for text in texts {
            let unique: HashSet<String> = tokenizer.tokenize(text.as_ref()).into_iter().collect();
            for term in unique {
                *df.entry(term).or_insert(0) += 1;
            }
        }
        let n = texts.len() as f64;
        let weights = df
            .into_iter()
            .map(|(term, df_t)| (term, ((n + 1.0) / (f64::from(df_t) + 1.0)).ln() + 1.0))
            .filter(|(_, idf)| *idf > MIN_IDF)
            .collect();
        Self { weights, num_docs: texts.len() }
    }

    pub fn get(&self, term: &str) -> Option<f64> { self.weights.get(term).copied() }
    pub fn len(&self) -> usize { self.weights.len() }
    pub fn is_empty(&self) -> bool { self.weights.is_empty() }
    pub fn num_docs(&self) -> usize { self.num_docs }
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(t, w)| (t.as_str(), *w))
    }
}

/// Sparse term weights; absent terms weigh zero and every stored weight exceeds [`MIN_WEIGHT`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermVector {
    weights: BTreeMap<String, f64>,
}

impl TermVector {
    /// TF-IDF vector of `text` against `idf`, with tf normalized by the most
    /// frequent term of the text.
    pub fn from_text(tokenizer: &Tokenizer, text: &str, idf: &IdfTable) -> Self {
        if idf.is_empty() {
            return Self::default();
        }
        let tokens = tokenizer.tokenize(text);
        if tokens.is_empty() {
            return Self::default();
        }
        let mut tf_raw: BTreeMap<String, u32> = BTreeMap::new();
        for token in tokens {
            *tf_raw.entry(token).or_insert(0) += 1;
        }
        let max_freq = f64::from(tf_raw.values().copied().max().unwrap_or(1).max(1));
        let weights = tf_raw
            .into_iter()
            .filter_map(|(term, freq)| {
                let idf_t = idf.get(&term).filter(|v| *v > MIN_IDF)?;
                let weight = (f64::from(freq) / max_freq) * idf_t;
                (weight > MIN_WEIGHT).then_some((term, weight))
            })
            .collect();
        Self { weights }
    }

    pub fn get(&self, term: &str) -> Option<f64> { self.weights.get(term).copied() }
    pub fn contains(&self, term: &str) -> bool { self.weights.contains_key(term) }
    pub fn len(&self) -> usize { self.weights.len() }
    pub fn is_empty(&self) -> bool { self.weights.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(t, w)| (t.as_str(), *w))
    }

    pub fn norm(&self) -> f64 {
        self.weights.values().map(|w| w * w).sum::<f64>().sqrt()
    }

    /// Terms present in both vectors, heaviest in `other` first.
    pub fn shared_terms(&self, other: &TermVector, limit: usize) -> Vec<String> {
        let mut shared: Vec<(&str, f64)> = self
            .weights
            .keys()
            .filter_map(|term| other.get(term).map(|w| (term.as_str(), w)))
            .collect();
        shared.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        shared.into_iter().take(limit).map(|(t, _)| t.to_string()).collect()
    }
}

impl FromIterator<(String, f64)> for TermVector {
    /// Builds a vector from raw weights, applying the [`MIN_WEIGHT`] pruning.
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let weights = iter.into_iter().filter(|(_, w)| *w > MIN_WEIGHT).collect();
        Self { weights }
    }
}

/// Cosine similarity in `[0, 1]`; zero when either vector is empty or nothing is shared.
pub fn cosine_similarity(a: &TermVector, b: &TermVector) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small.iter().filter_map(|(t, w)| large.get(t).map(|v| w * v)).sum();
    if dot == 0.0 {
        return 0.0;
    }
    let denom = a.norm() * b.norm();
    if denom > 0.0 { (dot / denom).clamp(0.0, 1.0) } else { 0.0 }
}
