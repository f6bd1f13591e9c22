use bookrec_core::tokenizer::{Tokenizer, TokenizerConfig};

#[test]
fn it_strips_diacritics() {
    let words = Tokenizer::default().tokenize("Perché l'università è lontana");
    assert!(words.contains(&"universita".to_string()));
    assert!(words.contains(&"lontana".to_string()));
    // "perché" is a stopword once folded
    assert!(!words.contains(&"perche".to_string()));
}

#[test]
fn it_filters_short_numeric_and_stopwords() {
    let words = Tokenizer::default().tokenize("Il 1984 di Orwell, un romanzo: 42 anni");
    assert_eq!(words, vec!["orwell", "romanzo", "anni"]);
}

#[test]
fn it_replaces_punctuation_with_spaces() {
    let words = Tokenizer::default().tokenize("sci-fi/fantasy;horror");
    assert_eq!(words, vec!["sci", "fantasy", "horror"]);
}

#[test]
fn it_caps_token_count() {
    let text = "parola ".repeat(400);
    assert_eq!(Tokenizer::default().tokenize(&text).len(), 150);

    let config = TokenizerConfig { max_tokens: 5, ..TokenizerConfig::default() };
    assert_eq!(Tokenizer::new(config).tokenize(&text).len(), 5);
}

#[test]
fn it_degrades_to_empty() {
    let tokenizer = Tokenizer::default();
    assert!(tokenizer.tokenize("").is_empty());
    assert!(tokenizer.tokenize("   \n\t").is_empty());
    assert!(tokenizer.tokenize("!!! ?? 12 345").is_empty());
}

#[test]
fn custom_stopwords_are_injected() {
    let config = TokenizerConfig { stopwords: vec!["the".into(), "and".into()], ..TokenizerConfig::default() };
    let words = Tokenizer::new(config).tokenize("The quick brown fox and the lazy dog");
    assert_eq!(words, vec!["quick", "brown", "fox", "lazy", "dog"]);
}
