//! Ranking strategies: content (tags, author, rating), style (TF-IDF cosine
//! blended with personal signals) and hybrid (both, merged by title).

use crate::analysis::{analyze_preferences, PreferenceAnalysis};
use crate::book::Book;
use crate::cache::CorpusCache;
use crate::config::RecommenderConfig;
use crate::features::{common_tags, FeatureExtractor, FieldToggles};
use crate::reasons::{content_reasons, style_reasons};
use crate::signals::{SaveStatus, SignalError, SignalStats, SignalStore};
use crate::tokenizer::Tokenizer;
use crate::vector::cosine_similarity;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

const TAG_BONUS: f64 = 0.2;
const TAG_BONUS_CAP: f64 = 0.6;
const AUTHOR_BONUS: f64 = 0.7;
const HIGH_RATING: f64 = 4.0;
const HIGH_RATING_BONUS: f64 = 0.15;
const FEEDBACK_FACTOR: f64 = 0.2;

/// Style matches at or below this cosine similarity are discarded.
const MIN_STYLE_SIMILARITY: f64 = 0.05;
const MAX_COMMON_TERMS: usize = 12;
/// Neutral prior used in place of an unrated book's rating.
const UNRATED_PRIOR: f64 = 0.5;

const HYBRID_CONTENT_WEIGHT: f64 = 0.4;
const HYBRID_STYLE_WEIGHT: f64 = 0.6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationMode {
    Content,
    Style,
    #[default]
    Hybrid,
}

impl FromStr for RecommendationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "content" => Ok(Self::Content),
            "style" => Ok(Self::Style),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown recommendation mode {other:?} (expected content, style or hybrid)")),
        }
    }
}

impl fmt::Display for RecommendationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Content => "content",
            Self::Style => "style",
            Self::Hybrid => "hybrid",
        })
    }
}

/// Strategy that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Content,
    Style,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub book: Book,
    pub score: f64,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub common_terms: Vec<String>,
    pub method: Method,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendOptions {
    pub mode: Option<RecommendationMode>,
    pub fields: FieldToggles,
    pub top_n: Option<usize>,
}

/// Per-book recency term of the style score. Year weighting is deliberately
/// off, so every book currently scores the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Freshness {
    #[default]
    Neutral,
}

impl Freshness {
    pub fn score(&self, _book: &Book) -> f64 {
        match self {
            Self::Neutral => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommenderStats {
    #[serde(flatten)]
    pub signals: SignalStats,
    pub cache_size: usize,
    pub cache_age_secs: Option<u64>,
}

#[derive(Debug)]
pub struct Recommender {
    config: RecommenderConfig,
    tokenizer: Tokenizer,
    extractor: FeatureExtractor,
    cache: CorpusCache,
    signals: SignalStore,
    freshness: Freshness,
    seen_revision: u64,
}

impl Recommender {
    pub fn new(config: RecommenderConfig, signals: SignalStore) -> Self {
        let tokenizer = Tokenizer::new(config.tokenizer.clone());
        let extractor = FeatureExtractor::new(config.field_weights);
        let cache = CorpusCache::new(config.cache_policy());
        let seen_revision = signals.revision();
        Self { config, tokenizer, extractor, cache, signals, freshness: Freshness::Neutral, seen_revision }
    }

    pub fn config(&self) -> &RecommenderConfig { &self.config }
    pub fn tokenizer(&self) -> &Tokenizer { &self.tokenizer }
    pub fn extractor(&self) -> &FeatureExtractor { &self.extractor }
    pub fn signals(&self) -> &SignalStore { &self.signals }
    pub fn signals_mut(&mut self) -> &mut SignalStore { &mut self.signals }
    pub fn cache(&self) -> &CorpusCache { &self.cache }

    /// Rank `pool` against `selected`.
    ///
    /// Records a view of `selected`, drops the selected book (by id or title)
    /// and same-titled duplicates from the pool, then dispatches on the mode.
    pub fn recommend(&mut self, selected: &Book, pool: &[Book], options: &RecommendOptions) -> Vec<RankedResult> {
        if pool.is_empty() {
            return Vec::new();
        }
        self.sync_cache_with_signals();
        let key = self.config.signal_key.key_for(selected).to_string();
        self.signals.record_view(&key);
        // Views recorded by the request itself never invalidate its own cache.
        self.seen_revision = self.signals.revision();

        let mut titles = HashSet::new();
        let candidates: Vec<Book> = pool
            .iter()
            .filter(|book| !selected.is_same_book(book))
            .filter(|book| titles.insert(book.title.clone()))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let mode = options.mode.unwrap_or(self.config.default_mode);
        let top_n = options.top_n.unwrap_or(self.config.default_top_n);
        tracing::info!(title = %selected.title, %mode, candidates = candidates.len(), top_n, "generating recommendations");
        let results = match mode {
            RecommendationMode::Content => self.content_based(selected, &candidates, top_n),
            RecommendationMode::Style => self.style_based(selected, &candidates, &options.fields, top_n),
            RecommendationMode::Hybrid => self.hybrid(selected, &candidates, &options.fields, top_n),
        };
        tracing::debug!(results = results.len(), "recommendations ready");
        results
    }

    /// `min(1, ln(views + 1) * 0.4 + max(feedback, 0) * 0.3 + rating / 5 * 0.3)`.
    pub fn popularity(&self, book: &Book) -> f64 {
        let key = self.config.signal_key.key_for(book);
        let views = self.signals.views(key) as f64;
        let feedback = self.signals.feedback(key);
        let rating = book.usable_rating().unwrap_or(0.0);
        ((views + 1.0).ln() * 0.4 + feedback.max(0.0) * 0.3 + (rating / 5.0) * 0.3).min(1.0)
    }

    pub fn content_based(&self, selected: &Book, books: &[Book], top_n: usize) -> Vec<RankedResult> {
        let mut ranked: Vec<RankedResult> = books
            .iter()
            .map(|book| {
                let tags = common_tags(selected, book);
                let mut score = (tags.len() as f64 * TAG_BONUS).min(TAG_BONUS_CAP);
                if book.same_author(selected) {
                    score += AUTHOR_BONUS;
                }
                if book.usable_rating().is_some_and(|r| r >= HIGH_RATING) {
                    score += HIGH_RATING_BONUS;
                }
                let feedback = self.feedback_for(book);
                if feedback > 0.0 {
                    score += feedback * FEEDBACK_FACTOR;
                }
                score += self.popularity(book) * self.config.weights.popularity;
                RankedResult {
                    reasons: content_reasons(book, selected, &tags, feedback),
                    book: book.clone(),
                    score,
                    similarity: None,
                    common_terms: Vec::new(),
                    method: Method::Content,
                }
            })
            .collect();
        sort_and_truncate(&mut ranked, top_n);
        ranked
    }

    /// TF-IDF ranking over a corpus of the selected book plus `books`. Falls
    /// back to [`Self::content_based`] when the selected book has no usable terms.
    pub fn style_based(&mut self, selected: &Book, books: &[Book], fields: &FieldToggles, top_n: usize) -> Vec<RankedResult> {
        let texts: Vec<String> = std::iter::once(selected)
            .chain(books.iter())
            .map(|book| self.extractor.book_text(book, fields))
            .collect();
        let idf = self.cache.idf(&self.tokenizer, &texts);
        let selected_text = texts.first().map(String::as_str).unwrap_or_default();
        let selected_vector = self.cache.vector(&self.tokenizer, selected_text, &idf);
        if selected_vector.is_empty() {
            tracing::warn!(title = %selected.title, "no usable terms for selected book, using content mode");
            return self.content_based(selected, books, top_n);
        }

        let weights = self.config.weights;
        let mut ranked = Vec::with_capacity(books.len());
        for (book, text) in books.iter().zip(texts.iter().skip(1)) {
            let vector = self.cache.vector(&self.tokenizer, text, &idf);
            let similarity = cosine_similarity(&selected_vector, &vector);
            if similarity <= MIN_STYLE_SIMILARITY {
                continue;
            }
            let feedback = self.feedback_for(book);
            let rating_norm = book.usable_rating().map_or(UNRATED_PRIOR, |r| r / 5.0);
            let score = similarity * weights.similarity
                + feedback * weights.feedback
                + self.popularity(book) * weights.popularity
                + self.freshness.score(book) * weights.freshness
                + rating_norm * weights.rating;
            let common_terms = selected_vector.shared_terms(&vector, MAX_COMMON_TERMS);
            ranked.push(RankedResult {
                reasons: style_reasons(book, selected, similarity, &common_terms, feedback),
                book: book.clone(),
                score: score.min(1.0),
                similarity: Some(similarity),
                common_terms,
                method: Method::Style,
            });
        }
        sort_and_truncate(&mut ranked, top_n);
        ranked
    }

    /// Content and style rankings (each `2 * top_n` deep) merged by title as
    /// `0.4 * content + 0.6 * style`. A book found by only one strategy keeps
    /// only that strategy's share.
    pub fn hybrid(&mut self, selected: &Book, books: &[Book], fields: &FieldToggles, top_n: usize) -> Vec<RankedResult> {
        let depth = top_n.saturating_mul(2);
        let content = self.content_based(selected, books, depth);
        let style = self.style_based(selected, books, fields, depth);

        let mut merged: Vec<RankedResult> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (rec, weight) in content
            .into_iter()
            .map(|r| (r, HYBRID_CONTENT_WEIGHT))
            .chain(style.into_iter().map(|r| (r, HYBRID_STYLE_WEIGHT)))
        {
            let found = index.get(&rec.book.title).copied();
            match found {
                Some(i) => {
                    let existing = &mut merged[i];
                    existing.score += rec.score * weight;
                    if existing.similarity.is_none() && rec.similarity.is_some() {
                        existing.similarity = rec.similarity;
                        existing.common_terms = rec.common_terms;
                    }
                }
                None => {
                    index.insert(rec.book.title.clone(), merged.len());
                    merged.push(RankedResult { score: rec.score * weight, method: Method::Hybrid, ..rec });
                }
            }
        }
        sort_and_truncate(&mut merged, top_n);
        merged
    }

    /// Record feedback for a signal key (a title unless keyed by id).
    pub fn submit_feedback(&mut self, key: &str, rating: f64) -> Result<SaveStatus, SignalError> {
        let status = self.signals.record_feedback(key, rating)?;
        self.sync_cache_with_signals();
        Ok(status)
    }

    /// Record feedback for a book, keyed by the configured policy.
    pub fn rate_book(&mut self, book: &Book, rating: f64) -> Result<SaveStatus, SignalError> {
        let key = self.config.signal_key.key_for(book).to_string();
        self.submit_feedback(&key, rating)
    }

    /// Replace all signals from a JSON snapshot; drops the corpus cache.
    pub fn import_json(&mut self, json: &str) -> Result<SaveStatus, SignalError> {
        let status = self.signals.import_json(json)?;
        self.invalidate_cache();
        Ok(status)
    }

    /// Clear every signal and the corpus cache.
    pub fn reset(&mut self) -> SaveStatus {
        let status = self.signals.reset();
        self.invalidate_cache();
        status
    }

    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate();
        self.seen_revision = self.signals.revision();
        tracing::info!("recommendation cache invalidated");
    }

    /// Analyse liked books in `library` and store the result as the
    /// `autoAnalysis` / `lastAnalysis` preferences.
    pub fn analyze(&mut self, library: &[Book]) -> Result<PreferenceAnalysis, SignalError> {
        let analysis = analyze_preferences(&self.signals, library, self.config.signal_key);
        let value = serde_json::to_value(&analysis).map_err(|source| SignalError::Encode { source })?;
        self.signals.set_preference("autoAnalysis", value)?;
        self.signals.set_preference("lastAnalysis", serde_json::Value::from(crate::signals::now_millis()))?;
        tracing::info!(genres = analysis.favorite_genres.len(), authors = analysis.preferred_authors.len(), "preference analysis stored");
        Ok(analysis)
    }

    pub fn stats(&self) -> RecommenderStats {
        RecommenderStats {
            signals: self.signals.stats(),
            cache_size: self.cache.len(),
            cache_age_secs: self.cache.age().map(|age| age.as_secs()),
        }
    }

    fn feedback_for(&self, book: &Book) -> f64 {
        self.signals.feedback(self.config.signal_key.key_for(book))
    }

    fn sync_cache_with_signals(&mut self) {
        let revision = self.signals.revision();
        if revision == self.seen_revision {
            return;
        }
        if self.config.invalidate_on_signal_change {
            self.invalidate_cache();
        } else {
            self.seen_revision = revision;
        }
    }
}

fn sort_and_truncate(results: &mut Vec<RankedResult>, top_n: usize) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_n);
}
