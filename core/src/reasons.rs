//! Human-readable justifications attached to each recommendation.

use crate::book::Book;
use crate::features::common_tags;

pub const MAX_REASONS: usize = 4;

/// Shared terms are only mentioned once the overlap is broader than this.
const MIN_TERMS_FOR_REASON: usize = 6;

fn similarity_tier(similarity: f64) -> Option<String> {
    let pct = similarity * 100.0;
    if similarity > 0.4 {
        Some(format!("Very high stylistic affinity ({pct:.1}%)"))
    } else if similarity > 0.25 {
        Some(format!("Good stylistic affinity ({pct:.1}%)"))
    } else if similarity > 0.1 {
        Some(format!("Similar style ({pct:.1}%)"))
    } else {
        None
    }
}

fn high_rating(book: &Book) -> Option<f64> {
    book.usable_rating().filter(|r| *r >= 4.0)
}

/// Reasons for a style-mode match, in fixed priority order, at most [`MAX_REASONS`].
pub fn style_reasons(
    book: &Book,
    selected: &Book,
    similarity: f64,
    common_terms: &[String],
    feedback: f64,
) -> Vec<String> {
    let mut reasons = Vec::new();
    reasons.extend(similarity_tier(similarity));

    let tags = common_tags(selected, book);
    if !tags.is_empty() {
        reasons.push(format!("Shared themes: {}", tags.iter().take(2).cloned().collect::<Vec<_>>().join(", ")));
    }
    if book.same_author(selected) {
        if let Some(author) = &book.author {
            reasons.push(format!("Same author: {author}"));
        }
    }
    if common_terms.len() >= MIN_TERMS_FOR_REASON {
        let key_terms: Vec<&str> = common_terms
            .iter()
            .take(3)
            .map(String::as_str)
            .filter(|t| t.chars().count() > 3)
            .collect();
        if !key_terms.is_empty() {
            reasons.push(format!("Key concepts: {}", key_terms.join(", ")));
        }
    }
    if let Some(rating) = high_rating(book) {
        reasons.push(format!("Highly rated ({rating}/5 stars)"));
    }
    if feedback > 0.5 {
        reasons.push("You liked it before".to_string());
    }
    reasons.truncate(MAX_REASONS);
    reasons
}

/// Reasons for a content-mode match: which bonuses fired.
pub fn content_reasons(book: &Book, selected: &Book, tags: &[String], feedback: f64) -> Vec<String> {
    let mut reasons = Vec::new();
    if !tags.is_empty() {
        reasons.push(format!("Shared tags: {}", tags.iter().take(3).cloned().collect::<Vec<_>>().join(", ")));
    }
    if book.same_author(selected) {
        if let Some(author) = &book.author {
            reasons.push(format!("Same author: {author}"));
        }
    }
    if let Some(rating) = high_rating(book) {
        reasons.push(format!("Well rated ({rating}/5)"));
    }
    if feedback > 0.0 {
        reasons.push("You liked it before".to_string());
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_reasons_follow_priority_and_cap() {
        let selected = Book::new("1", "Dune").with_author("Frank Herbert").with_tags(["sci-fi", "desert"]);
        let book = Book::new("2", "Dune Messiah")
            .with_author("Frank Herbert")
            .with_tags(["sci-fi", "desert"])
            .with_rating(5.0);
        let terms: Vec<String> = ["dune", "herbert", "frank", "desert", "spice", "messiah"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let reasons = style_reasons(&book, &selected, 0.5, &terms, 1.0);
        assert_eq!(reasons.len(), MAX_REASONS);
        assert!(reasons[0].starts_with("Very high stylistic affinity (50.0%)"));
        assert_eq!(reasons[1], "Shared themes: sci-fi, desert");
        assert_eq!(reasons[2], "Same author: Frank Herbert");
        assert_eq!(reasons[3], "Key concepts: dune, herbert, frank");
    }

    #[test]
    fn weak_similarity_has_no_tier() {
        let a = Book::new("1", "a");
        let b = Book::new("2", "b");
        assert!(style_reasons(&b, &a, 0.08, &[], 0.0).is_empty());
    }
}
