use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;
use std::fmt;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").expect("valid regex");
    /// Italian function words; the library this engine serves is catalogued in Italian.
    static ref DEFAULT_STOPWORDS: Vec<&'static str> = vec![
        "il","lo","la","i","gli","le","un","una","di","e","a","che","in",
        "con","per","su","da","non","è","sono","del","della","al","d","l",
        "molto","più","come","anche","solo","prima","dopo","dove","quando",
        "perché","ma","se","già","ancora","poi","così","qui","là","questo",
        "quella","questi","quelle","stesso","stessa","altri","altre","tutto",
        "tutti","ogni","qualche","alcuni","alcune","niente","nulla",
    ];
}

/// Immutable tokenizer settings, injected at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Tokens shorter than this (in characters) are dropped.
    pub min_token_len: usize,
    /// Only the first `max_tokens` surviving tokens are kept.
    pub max_tokens: usize,
    pub stopwords: Vec<String>,
    /// Snowball language name (`"english"`, `"italian"`, ...). Off when `None`.
    pub stemming: Option<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            min_token_len: 3,
            max_tokens: 150,
            stopwords: DEFAULT_STOPWORDS.iter().map(|w| (*w).to_string()).collect(),
            stemming: None,
        }
    }
}

/// Turns free text into a filtered sequence of normalized terms.
pub struct Tokenizer {
    config: TokenizerConfig,
    stopwords: HashSet<String>,
    stemmer: Option<Stemmer>,
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer")
            .field("config", &self.config)
            .field("stemming", &self.stemmer.is_some())
            .finish()
    }
}

impl Default for Tokenizer {
    fn default() -> Self { Self::new(TokenizerConfig::default()) }
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        // Stopwords go through the same folding as tokens so "perché" matches "perche".
        let stopwords = config.stopwords.iter().map(|w| fold(w)).collect();
        let stemmer = config.stemming.as_deref().and_then(stemming_algorithm).map(Stemmer::create);
        if config.stemming.is_some() && stemmer.is_none() {
            tracing::warn!(language = ?config.stemming, "unknown stemming language, stemming disabled");
        }
        Self { config, stopwords, stemmer }
    }

    pub fn config(&self) -> &TokenizerConfig { &self.config }

    pub fn is_stopword(&self, token: &str) -> bool { self.stopwords.contains(token) }

    /// Lower-case, strip diacritics, split on non-word characters and drop
    /// short, stopword and purely numeric tokens. Never fails: empty or
    /// unusable input yields an empty sequence.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let folded = fold(text);
        let spaced = NON_WORD.replace_all(&folded, " ");
        spaced
            .split_whitespace()
            .filter(|token| token.chars().count() >= self.config.min_token_len)
            .filter(|token| !self.is_stopword(token))
            .filter(|token| !token.chars().all(char::is_numeric))
            .take(self.config.max_tokens)
            .map(|token| match &self.stemmer {
                Some(stemmer) => stemmer.stem(token).into_owned(),
                None => token.to_string(),
            })
            .collect()
    }
}

/// Lower-case and remove combining diacritical marks (U+0300..U+036F) after NFD.
fn fold(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect()
}

fn stemming_algorithm(language: &str) -> Option<Algorithm> {
    match language.to_ascii_lowercase().as_str() {
        "english" | "en" => Some(Algorithm::English),
        "italian" | "it" => Some(Algorithm::Italian),
        "french" | "fr" => Some(Algorithm::French),
        "german" | "de" => Some(Algorithm::German),
        "spanish" | "es" => Some(Algorithm::Spanish),
        "portuguese" | "pt" => Some(Algorithm::Portuguese),
        _ => None,
    }
}
