use regex::RegexBuilder;

/// Wrap case-insensitive occurrences of any of `terms` in `<em>…</em>`.
/// Longer terms win when terms overlap.
pub fn highlight_terms<S: AsRef<str>>(text: &str, terms: &[S]) -> String {
    let mut wanted: Vec<&str> = terms.iter().map(|t| t.as_ref().trim()).filter(|t| !t.is_empty()).collect();
    if wanted.is_empty() {
        return text.to_string();
    }
    wanted.sort_by(|a, b| b.len().cmp(&a.len()));
    let pattern = wanted.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).into_owned()
}

/// About `max_chars` of `text` around the first term occurrence (or from the
/// start when nothing matches), highlighted.
pub fn highlighted_excerpt<S: AsRef<str>>(text: &str, terms: &[S], max_chars: usize) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let lower = text.to_lowercase();
    let first_hit = terms
        .iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .filter_map(|t| lower.find(&t))
        .min();
    // Offsets in `lower` only map back to `text` when lower-casing kept byte lengths.
    let start_char = match first_hit {
        Some(byte) if lower.len() == text.len() => lower[..byte].chars().count().saturating_sub(max_chars / 3),
        _ => 0,
    };
    let excerpt: String = text.chars().skip(start_char).take(max_chars).collect();
    Some(highlight_terms(&excerpt, terms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlights_case_insensitively() {
        assert_eq!(highlight_terms("Spice and SPICE", &["spice"]), "<em>Spice</em> and <em>SPICE</em>");
    }

    #[test]
    fn no_terms_leaves_text_alone() {
        let empty: [&str; 0] = [];
        assert_eq!(highlight_terms("Spice", &empty), "Spice");
    }

    #[test]
    fn excerpt_centers_on_first_match() {
        let text = format!("{}desert planet", "x ".repeat(100));
        let excerpt = highlighted_excerpt(&text, &["desert"], 30).unwrap();
        assert!(excerpt.contains("<em>desert</em>"));
    }
}
