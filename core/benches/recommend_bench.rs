use bookrec_core::{Book, RecommendOptions, RecommendationMode, Recommender, RecommenderConfig, SignalStore, Tokenizer, TokenizerConfig, UserId};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const WORDS: &[&str] = &[
    "deserto", "pianeta", "spezie", "impero", "viaggio", "mare", "balena", "capitano", "amore", "lettera",
    "guerra", "pace", "famiglia", "segreto", "città", "montagna", "fiume", "notte", "stelle", "memoria",
];

fn library(n: usize) -> Vec<Book> {
    (0..n)
        .map(|i| {
            let description: Vec<&str> = (0..40).map(|j| WORDS[(i * 7 + j * 3) % WORDS.len()]).collect();
            Book::new(format!("b{i}"), format!("Libro {i}"))
                .with_author(format!("Autore {}", i % 25))
                .with_tags([WORDS[i % WORDS.len()], WORDS[(i + 5) % WORDS.len()]])
                .with_rating((i % 5) as f64 + 1.0)
                .with_description(description.join(" "))
        })
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    let tokenizer = Tokenizer::new(TokenizerConfig::default());
    let text = library(1)[0].description.clone().unwrap_or_default();
    c.bench_function("tokenize_description", |b| b.iter(|| tokenizer.tokenize(black_box(&text))));
}

fn bench_recommend(c: &mut Criterion) {
    let books = library(500);
    for mode in [RecommendationMode::Content, RecommendationMode::Style, RecommendationMode::Hybrid] {
        let options = RecommendOptions { mode: Some(mode), ..RecommendOptions::default() };
        let mut rec = Recommender::new(RecommenderConfig::default(), SignalStore::new(UserId::new("bench")));
        c.bench_function(&format!("recommend_{mode}_500_warm"), |b| {
            b.iter(|| rec.recommend(black_box(&books[0]), black_box(&books), &options))
        });
    }
}

criterion_group!(benches, bench_tokenize, bench_recommend);
criterion_main!(benches);
