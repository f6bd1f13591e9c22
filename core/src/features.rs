use crate::book::Book;
use serde::{Deserialize, Serialize};

/// How many times each field is repeated in the text blob. Term frequency is
/// count based, so repetition is the field's weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub title: usize,
    pub author: usize,
    pub tags: usize,
    pub genre: usize,
    pub description: usize,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self { title: 4, author: 3, tags: 2, genre: 2, description: 1 }
    }
}

/// Which book fields contribute to the style vector. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldToggles {
    pub title: bool,
    pub author: bool,
    pub tags: bool,
    pub genre: bool,
    pub description: bool,
}

impl Default for FieldToggles {
    fn default() -> Self {
        Self { title: true, author: true, tags: true, genre: true, description: true }
    }
}

impl FieldToggles {
    /// Parse a comma separated field list such as `"title,author,tags"`.
    /// Unknown names are ignored; an empty list enables nothing.
    pub fn from_list(list: &str) -> Self {
        let mut toggles = Self { title: false, author: false, tags: false, genre: false, description: false };
        for name in list.split(',').map(|s| s.trim().to_ascii_lowercase()) {
            match name.as_str() {
                "title" => toggles.title = true,
                "author" => toggles.author = true,
                "tags" => toggles.tags = true,
                "genre" => toggles.genre = true,
                "description" => toggles.description = true,
                _ => {}
            }
        }
        toggles
    }
}

/// Builds the weighted text blob a book contributes to the TF-IDF corpus.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    weights: FieldWeights,
}

impl FeatureExtractor {
    pub fn new(weights: FieldWeights) -> Self { Self { weights } }

    pub fn weights(&self) -> FieldWeights { self.weights }

    /// Enabled, non-empty fields, each repeated per its weight and joined by spaces.
    pub fn book_text(&self, book: &Book, toggles: &FieldToggles) -> String {
        let mut parts: Vec<String> = Vec::new();
        let tags_joined = book.tags.join(" ");
        let fields: [(bool, Option<&str>, usize); 5] = [
            (toggles.title, Some(book.title.as_str()), self.weights.title),
            (toggles.author, book.author.as_deref(), self.weights.author),
            (toggles.tags, Some(tags_joined.as_str()), self.weights.tags),
            (toggles.genre, book.genre.as_deref(), self.weights.genre),
            (toggles.description, book.description.as_deref(), self.weights.description),
        ];
        for (enabled, value, times) in fields {
            let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else { continue };
            if enabled && times > 0 {
                parts.push(vec![value; times].join(" "));
            }
        }
        parts.join(" ")
    }
}

/// Tags of `a` that also appear on `b`, compared case-insensitively, lower-cased.
pub fn common_tags(a: &Book, b: &Book) -> Vec<String> {
    let theirs: Vec<String> = b.tags.iter().map(|t| t.to_lowercase()).collect();
    let mut shared: Vec<String> = Vec::new();
    for tag in a.tags.iter().map(|t| t.to_lowercase()) {
        if theirs.contains(&tag) && !shared.contains(&tag) {
            shared.push(tag);
        }
    }
    shared
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_repeated_by_weight() {
        let book = Book::new("1", "Dune").with_author("Herbert").with_tags(["sci-fi"]);
        let text = FeatureExtractor::default().book_text(&book, &FieldToggles::default());
        assert_eq!(text, "Dune Dune Dune Dune Herbert Herbert Herbert sci-fi sci-fi");
    }

    #[test]
    fn disabled_and_missing_fields_are_skipped() {
        let book = Book::new("1", "Dune").with_author("Herbert");
        let toggles = FieldToggles::from_list("author,description");
        let text = FeatureExtractor::default().book_text(&book, &toggles);
        assert_eq!(text, "Herbert Herbert Herbert");
    }

    #[test]
    fn common_tags_ignore_case() {
        let a = Book::new("1", "a").with_tags(["Sci-Fi", "desert"]);
        let b = Book::new("2", "b").with_tags(["sci-fi", "ocean"]);
        assert_eq!(common_tags(&a, &b), vec!["sci-fi"]);
    }
}
