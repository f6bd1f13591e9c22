//! Summaries of what the user tends to like, derived from stored feedback.

use crate::book::Book;
use crate::signals::{SignalKey, SignalStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const TOP_ENTRIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreScore {
    pub genre: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorScore {
    pub author: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewedBook {
    pub title: String,
    pub views: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPatterns {
    pub total_interactions: usize,
    pub positive_ratings: usize,
    pub negative_ratings: usize,
    pub most_viewed_books: Vec<ViewedBook>,
    pub positivity_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceAnalysis {
    pub favorite_genres: Vec<GenreScore>,
    pub preferred_authors: Vec<AuthorScore>,
    /// Mean page count of liked books.
    pub book_length_preference: Option<u32>,
    /// Mean publication year of liked books.
    pub year_preference: Option<i32>,
    pub reading_patterns: ReadingPatterns,
}

pub fn analyze_preferences(store: &SignalStore, library: &[Book], key: SignalKey) -> PreferenceAnalysis {
    let by_key: HashMap<&str, &Book> = library.iter().map(|b| (key.key_for(b), b)).collect();
    let liked: Vec<(&Book, f64)> = store
        .feedback_entries()
        .filter(|(_, rating)| *rating > 0.0)
        .filter_map(|(k, rating)| by_key.get(k).map(|book| (*book, rating)))
        .collect();

    let mut genres: BTreeMap<String, f64> = BTreeMap::new();
    let mut authors: BTreeMap<String, f64> = BTreeMap::new();
    for (book, rating) in &liked {
        for tag in &book.tags {
            *genres.entry(tag.clone()).or_insert(0.0) += rating;
        }
        if let Some(author) = book.author.as_ref().filter(|a| !a.trim().is_empty()) {
            *authors.entry(author.clone()).or_insert(0.0) += rating;
        }
    }

    let book_length_preference = mean(liked.iter().filter_map(|(b, _)| b.pages.map(f64::from)))
        .map(|avg| avg.round() as u32)
        .filter(|pages| *pages > 0);
    let year_preference = mean(liked.iter().filter_map(|(b, _)| b.year.map(f64::from))).map(|avg| avg.round() as i32);

    PreferenceAnalysis {
        favorite_genres: top(genres).into_iter().map(|(genre, score)| GenreScore { genre, score }).collect(),
        preferred_authors: top(authors).into_iter().map(|(author, score)| AuthorScore { author, score }).collect(),
        book_length_preference,
        year_preference,
        reading_patterns: reading_patterns(store),
    }
}

fn reading_patterns(store: &SignalStore) -> ReadingPatterns {
    let total_interactions = store.feedback_entries().count();
    let positive_ratings = store.feedback_entries().filter(|(_, r)| *r > 0.0).count();
    let negative_ratings = store.feedback_entries().filter(|(_, r)| *r < 0.0).count();
    let mut viewed: Vec<ViewedBook> =
        store.view_entries().map(|(title, views)| ViewedBook { title: title.to_string(), views }).collect();
    viewed.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.title.cmp(&b.title)));
    viewed.truncate(TOP_ENTRIES);
    let positivity_rate =
        if total_interactions > 0 { positive_ratings as f64 / total_interactions as f64 } else { 0.0 };
    ReadingPatterns { total_interactions, positive_ratings, negative_ratings, most_viewed_books: viewed, positivity_rate }
}

fn top(scores: BTreeMap<String, f64>) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = scores.into_iter().collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(TOP_ENTRIES);
    entries
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
