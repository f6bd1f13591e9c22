//! Content-based book recommendations.
//!
//! Books are turned into weighted text blobs, tokenized, projected into a
//! TF-IDF vector space built over the candidate pool and compared with cosine
//! similarity. Three strategies (content, style and hybrid) blend that
//! similarity with per-user signals (feedback, views) kept in a
//! [`SignalStore`].

pub mod analysis;
pub mod book;
pub mod cache;
pub mod config;
pub mod features;
pub mod highlight;
pub mod library;
pub mod persist;
pub mod reasons;
pub mod recommend;
pub mod signals;
pub mod tokenizer;
pub mod vector;

pub use analysis::{analyze_preferences, PreferenceAnalysis};
pub use book::Book;
pub use cache::{CachePolicy, CorpusCache};
pub use config::{ConfigError, RecommenderConfig, ScoreWeights};
pub use features::{common_tags, FeatureExtractor, FieldToggles, FieldWeights};
pub use highlight::{highlight_terms, highlighted_excerpt};
pub use library::load_library;
pub use persist::{open_data_dir, DataPaths, JsonFileBackend, MirroredBackend, SignalBackend, SledBackend};
pub use recommend::{Method, RankedResult, RecommendOptions, RecommendationMode, Recommender, RecommenderStats};
pub use signals::{SaveStatus, SignalError, SignalKey, SignalSnapshot, SignalStore, SignalStats, UserId};
pub use tokenizer::{Tokenizer, TokenizerConfig};
pub use vector::{cosine_similarity, IdfTable, TermVector};
