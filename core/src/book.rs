use serde::{Deserialize, Serialize};

/// A catalogued book as supplied by the library's persistence layer.
///
/// The recommender only ever reads books. Every field is defaulted on
/// deserialization so one sparse record never blocks a whole pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub publisher: Option<String>,
    pub pages: Option<u32>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// 1 to 5 stars; absent when the book was never rated.
    pub rating: Option<f64>,
    pub comment: Option<String>,
}

impl Book {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), ..Self::default() }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// Rating if it is a usable positive number.
    pub fn usable_rating(&self) -> Option<f64> {
        self.rating.filter(|r| r.is_finite() && *r > 0.0)
    }

    /// Case-insensitive author equality; false when either side is missing.
    pub fn same_author(&self, other: &Book) -> bool {
        match (self.author.as_deref(), other.author.as_deref()) {
            (Some(a), Some(b)) if !a.trim().is_empty() => a.to_lowercase() == b.to_lowercase(),
            _ => false,
        }
    }

    /// True when `other` is this book, by id or by exact title.
    pub fn is_same_book(&self, other: &Book) -> bool {
        (!self.id.is_empty() && self.id == other.id) || self.title == other.title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_json_deserializes() {
        let book: Book = serde_json::from_str(r#"{"title":"Dune"}"#).unwrap();
        assert_eq!(book.title, "Dune");
        assert!(book.tags.is_empty());
        assert!(book.author.is_none());
    }

    #[test]
    fn author_match_ignores_case() {
        let a = Book::new("1", "Dune").with_author("Frank Herbert");
        let b = Book::new("2", "Dune Messiah").with_author("FRANK HERBERT");
        let c = Book::new("3", "Other");
        assert!(a.same_author(&b));
        assert!(!a.same_author(&c));
    }

    #[test]
    fn zero_rating_is_unrated() {
        assert_eq!(Book::new("1", "x").with_rating(0.0).usable_rating(), None);
        assert_eq!(Book::new("1", "x").with_rating(4.0).usable_rating(), Some(4.0));
    }
}
