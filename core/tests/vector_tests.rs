use bookrec_core::tokenizer::Tokenizer;
use bookrec_core::vector::{cosine_similarity, IdfTable, TermVector};

fn corpus() -> Vec<String> {
    vec![
        "desert planet spice worm emperor".to_string(),
        "desert planet messiah emperor".to_string(),
        "romance ballroom letters desert".to_string(),
        "ocean whale captain".to_string(),
    ]
}

#[test]
fn vectorize_is_pure() {
    let tokenizer = Tokenizer::default();
    let texts = corpus();
    let idf = IdfTable::build(&tokenizer, &texts);
    let a = TermVector::from_text(&tokenizer, &texts[0], &idf);
    let b = TermVector::from_text(&tokenizer, &texts[0], &idf);
    assert_eq!(a, b);
}

#[test]
fn similarity_bounds_hold() {
    let tokenizer = Tokenizer::default();
    let texts = corpus();
    let idf = IdfTable::build(&tokenizer, &texts);
    let vectors: Vec<TermVector> = texts.iter().map(|t| TermVector::from_text(&tokenizer, t, &idf)).collect();
    for a in &vectors {
        assert!((cosine_similarity(a, a) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(a, &TermVector::default()), 0.0);
        assert_eq!(cosine_similarity(&TermVector::default(), a), 0.0);
        for b in &vectors {
            let s = cosine_similarity(a, b);
            assert!((0.0..=1.0).contains(&s));
            assert!((s - cosine_similarity(b, a)).abs() < 1e-12);
        }
    }
    assert!(cosine_similarity(&vectors[0], &vectors[1]) > cosine_similarity(&vectors[0], &vectors[2]));
    assert_eq!(cosine_similarity(&vectors[0], &vectors[3]), 0.0);
}

#[test]
fn idf_is_monotone_in_document_frequency() {
    let tokenizer = Tokenizer::default();
    let texts = vec!["common alpha".to_string(), "common beta".to_string(), "common gamma".to_string()];
    let idf = IdfTable::build(&tokenizer, &texts);
    let min = idf.iter().map(|(_, w)| w).fold(f64::INFINITY, f64::min);
    assert_eq!(idf.get("common"), Some(min));
    assert!(idf.get("alpha").unwrap() > idf.get("common").unwrap());
    assert_eq!(idf.num_docs(), 3);
}

#[test]
fn repeated_terms_count_once_per_document() {
    let tokenizer = Tokenizer::default();
    let repeated = IdfTable::build(&tokenizer, &["spice spice spice", "ocean"]);
    let single = IdfTable::build(&tokenizer, &["spice", "ocean"]);
    assert_eq!(repeated.get("spice"), single.get("spice"));
}

#[test]
fn stored_weights_exceed_pruning_threshold() {
    let tokenizer = Tokenizer::default();
    let texts = corpus();
    let idf = IdfTable::build(&tokenizer, &texts);
    for text in &texts {
        let v = TermVector::from_text(&tokenizer, text, &idf);
        assert!(v.iter().all(|(_, w)| w > 0.01));
    }
}
