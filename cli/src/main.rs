use anyhow::{bail, Context, Result};
use bookrec_core::{
    load_library, open_data_dir, Book, DataPaths, FieldToggles, RankedResult, RecommendOptions, RecommendationMode,
    Recommender, RecommenderConfig, SaveStatus, SignalStore, UserId,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "bookrec")]
#[command(about = "Content-based book recommendations from a local library", long_about = None)]
struct Cli {
    /// Directory holding signals, user id and config
    #[arg(long, global = true, default_value = "./bookrec-data")]
    data_dir: PathBuf,
    /// Recommender config (JSON); defaults to <data-dir>/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend books similar to one in the library
    Recommend {
        /// Library file (.json/.jsonl) or directory of them
        #[arg(long)]
        library: PathBuf,
        /// Id or title of the selected book
        #[arg(long)]
        book: String,
        /// content, style or hybrid
        #[arg(long)]
        mode: Option<RecommendationMode>,
        #[arg(long)]
        top_n: Option<usize>,
        /// Comma-separated fields used for text similarity
        #[arg(long)]
        fields: Option<String>,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Rate a book between -1 and 1
    Feedback {
        /// Signal key (title, or id when signals are keyed by id)
        #[arg(long)]
        key: String,
        #[arg(long, allow_hyphen_values = true)]
        rating: f64,
    },
    /// Read, set or remove a stored preference
    Pref {
        #[command(subcommand)]
        action: PrefAction,
    },
    /// Write all signals as JSON to a file or stdout
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replace all signals with a previously exported snapshot
    Import {
        #[arg(long)]
        input: PathBuf,
    },
    /// Delete every stored signal
    Reset,
    /// Signal and cache counters
    Stats,
    /// Summarize liked genres, authors, lengths and years
    Analyze {
        #[arg(long)]
        library: PathBuf,
    },
}

#[derive(Subcommand)]
enum PrefAction {
    Get { key: String },
    /// Value is parsed as JSON, falling back to a plain string
    Set { key: String, value: String },
    Remove { key: String },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    let mut rec = open_recommender(&cli.data_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Recommend { library, book, mode, top_n, fields, json } => {
            let books = load_library(&library)?;
            let selected = find_book(&books, &book)?;
            let options = RecommendOptions {
                mode,
                fields: fields.as_deref().map(FieldToggles::from_list).unwrap_or_default(),
                top_n,
            };
            let results = rec.recommend(&selected, &books, &options);
            if json {
                print_json(&results)?;
            } else {
                print_results(&selected, &results);
            }
        }
        Commands::Feedback { key, rating } => {
            let status = rec.submit_feedback(&key, rating)?;
            report(&status);
            println!("{key}: {:.3}", rec.signals().feedback(&key));
        }
        Commands::Pref { action } => match action {
            PrefAction::Get { key } => match rec.signals().preference(&key) {
                Some(value) => print_json(value)?,
                None => bail!("no preference {key:?}"),
            },
            PrefAction::Set { key, value } => {
                let value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
                report(&rec.signals_mut().set_preference(&key, value)?);
            }
            PrefAction::Remove { key } => report(&rec.signals_mut().remove_preference(&key)),
        },
        Commands::Export { output } => {
            let json = serde_json::to_string_pretty(&rec.signals().export_all())?;
            match output {
                Some(path) => {
                    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!(path = %path.display(), "signals exported");
                }
                None => println!("{json}"),
            }
        }
        Commands::Import { input } => {
            let json = fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
            report(&rec.import_json(&json)?);
            let stats = rec.signals().stats();
            println!("imported {} feedback entries, {} viewed books", stats.feedback_entries, stats.view_history);
        }
        Commands::Reset => {
            report(&rec.reset());
            println!("signals cleared");
        }
        Commands::Stats => print_json(&rec.stats())?,
        Commands::Analyze { library } => {
            let books = load_library(&library)?;
            print_json(&rec.analyze(&books)?)?;
        }
    }
    Ok(())
}

fn open_recommender(data_dir: &Path, config: Option<&Path>) -> Result<Recommender> {
    let paths = DataPaths::new(data_dir);
    let config_path = config.map(Path::to_path_buf).unwrap_or_else(|| paths.config());
    let config = RecommenderConfig::from_file_or_default(&config_path)?;
    let user_id = UserId::load_or_create(&paths.user_id())?;
    let mut signals = SignalStore::with_backend(user_id, Box::new(open_data_dir(&paths)?));
    if let Err(err) = signals.load() {
        tracing::warn!(error = %err, "starting with empty signals");
    }
    Ok(Recommender::new(config, signals))
}

/// Exact id match first, then case-insensitive title.
fn find_book(books: &[Book], needle: &str) -> Result<Book> {
    books
        .iter()
        .find(|b| b.id == needle)
        .or_else(|| books.iter().find(|b| b.title.eq_ignore_ascii_case(needle.trim())))
        .cloned()
        .with_context(|| format!("no book with id or title {needle:?}"))
}

fn report(status: &SaveStatus) {
    if let Some(warning) = status.warning() {
        tracing::warn!(warning, "change kept in memory only");
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_results(selected: &Book, results: &[RankedResult]) {
    if results.is_empty() {
        println!("No recommendations for \"{}\"", selected.title);
        return;
    }
    println!("Because you picked \"{}\":", selected.title);
    for (rank, r) in results.iter().enumerate() {
        let author = r.book.author.as_deref().unwrap_or("unknown author");
        println!("{:>2}. {} by {} [{:.3}]", rank + 1, r.book.title, author, r.score);
        for reason in &r.reasons {
            println!("      - {reason}");
        }
    }
}
