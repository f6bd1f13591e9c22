//! Loading book collections from `.json` (one book or an array) and `.jsonl`
//! files, or from a directory tree of them.

use crate::book::Book;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read every book under `path`. Books without an id get `book-<n>` in load
/// order; files are visited sorted by name so ids are stable.
pub fn load_library<P: AsRef<Path>>(path: P) -> Result<Vec<Book>> {
    let path = path.as_ref();
    let mut books = Vec::new();
    for file in library_files(path)? {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut books)?;
        } else {
            read_json(&file, &mut books)?;
        }
    }

    let mut seen: HashSet<String> = books.iter().filter(|b| !b.id.is_empty()).map(|b| b.id.clone()).collect();
    let mut next = 0usize;
    for book in books.iter_mut().filter(|b| b.id.is_empty()) {
        loop {
            next += 1;
            let candidate = format!("book-{next}");
            if seen.insert(candidate.clone()) {
                book.id = candidate;
                break;
            }
        }
    }
    tracing::info!(path = %path.display(), books = books.len(), "library loaded");
    Ok(books)
}

fn library_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        anyhow::bail!("library path {} does not exist", path.display());
    }
    let files = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file())
        .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")))
        .collect();
    Ok(files)
}

fn read_jsonl(file: &Path, books: &mut Vec<Book>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let book: Book = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid book", file.display(), n + 1))?;
        books.push(book);
    }
    Ok(())
}

fn read_json(file: &Path, books: &mut Vec<Book>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value =
        serde_json::from_reader(reader).with_context(|| format!("{}: invalid JSON", file.display()))?;
    match json {
        serde_json::Value::Array(items) => {
            for item in items {
                books.push(serde_json::from_value(item).with_context(|| format!("{}: invalid book", file.display()))?);
            }
        }
        serde_json::Value::Object(_) => books.push(serde_json::from_value(json)?),
        _ => tracing::warn!(file = %file.display(), "skipping JSON file that holds neither a book nor a list"),
    }
    Ok(())
}
